//! Mail Operator - Entry Point
//!
//! Kubernetes operator that reconciles Email resources into delivered mail.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mailops_operator::run().await
}
