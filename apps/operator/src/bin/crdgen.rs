//! Prints the CustomResourceDefinitions for the mailops.dev API group.
//!
//! Usage: `crdgen | kubectl apply -f -`

use domain_delivery::{Email, EmailSenderConfig};
use kube::CustomResourceExt;

fn main() -> eyre::Result<()> {
    let list = serde_json::json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": [Email::crd(), EmailSenderConfig::crd()],
    });
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
