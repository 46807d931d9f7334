use crate::{ConfigError, FromEnv};
use std::env;

/// Controller scoping configuration.
#[derive(Clone, Debug, Default)]
pub struct OperatorConfig {
    /// Namespace the controllers watch. `None` watches the whole cluster.
    pub watch_namespace: Option<String>,
}

impl FromEnv for OperatorConfig {
    /// Reads `WATCH_NAMESPACE`; unset or empty means cluster-wide.
    fn from_env() -> Result<Self, ConfigError> {
        let watch_namespace = env::var("WATCH_NAMESPACE")
            .ok()
            .filter(|ns| !ns.trim().is_empty());

        Ok(Self { watch_namespace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_cluster_wide() {
        temp_env::with_var_unset("WATCH_NAMESPACE", || {
            let config = OperatorConfig::from_env().unwrap();
            assert!(config.watch_namespace.is_none());
        });
    }

    #[test]
    fn test_scoped_to_namespace() {
        temp_env::with_var("WATCH_NAMESPACE", Some("mail"), || {
            let config = OperatorConfig::from_env().unwrap();
            assert_eq!(config.watch_namespace.as_deref(), Some("mail"));
        });
    }

    #[test]
    fn test_empty_namespace_means_cluster_wide() {
        temp_env::with_var("WATCH_NAMESPACE", Some(""), || {
            let config = OperatorConfig::from_env().unwrap();
            assert!(config.watch_namespace.is_none());
        });
    }
}
