//! Enclave registry for one environment.

use crate::error::{Result, Subject, SwizError};
use crate::model::{Enclave, EnvironmentConfig};

/// Enclaves an environment may deploy into.
#[derive(Debug, Clone, Default)]
pub struct EnclaveRegistry {
    enclaves: Vec<Enclave>,
    default_enclave: String,
}

impl EnclaveRegistry {
    pub fn new(enclaves: Vec<Enclave>, default_enclave: impl Into<String>) -> Self {
        Self {
            enclaves,
            default_enclave: default_enclave.into(),
        }
    }

    /// Build the registry for `env`.
    ///
    /// The environment's own enclaves come first; application-wide enclaves
    /// are appended unless the environment already declares one by that name.
    /// The default is the environment's `default_enclave`, else `app_default`.
    pub fn for_environment(env: &EnvironmentConfig, app_enclaves: &[Enclave], app_default: &str) -> Self {
        let mut enclaves = env.enclaves.clone();
        for enclave in app_enclaves {
            if !enclaves.iter().any(|e| e.name == enclave.name) {
                enclaves.push(enclave.clone());
            }
        }
        let default_enclave = if env.default_enclave.is_empty() {
            app_default
        } else {
            env.default_enclave.as_str()
        };
        Self::new(enclaves, default_enclave)
    }

    /// Look up an enclave by exact name; empty means the default enclave.
    pub fn get_enclave(&self, name: &str) -> Result<&Enclave> {
        let name = if name.is_empty() {
            self.default_enclave.as_str()
        } else {
            name
        };
        self.enclaves
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| SwizError::not_found(Subject::Enclave, name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.enclaves.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enclave(name: &str, domain: &str) -> Enclave {
        Enclave {
            name: name.to_string(),
            domain_name: domain.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_name_uses_default() {
        let registry = EnclaveRegistry::new(vec![enclave("dev", ""), enclave("prod", "")], "prod");
        assert_eq!(registry.get_enclave("").unwrap().name, "prod");
        assert_eq!(registry.get_enclave("dev").unwrap().name, "dev");
    }

    #[test]
    fn test_unknown_enclave() {
        let registry = EnclaveRegistry::new(vec![enclave("dev", "")], "dev");
        let err = registry.get_enclave("qa").unwrap_err();
        assert!(err.is_not_found(Subject::Enclave));
        assert!(err.to_string().contains("qa"));
    }

    #[test]
    fn test_missing_default() {
        let registry = EnclaveRegistry::new(vec![enclave("dev", "")], "");
        assert!(registry.get_enclave("").is_err());
    }

    #[test]
    fn test_environment_enclaves_shadow_app_enclaves() {
        let env = EnvironmentConfig {
            enclaves: vec![enclave("dev", "env.example.com")],
            ..Default::default()
        };
        let app = vec![enclave("dev", "app.example.com"), enclave("prod", "prod.example.com")];
        let registry = EnclaveRegistry::for_environment(&env, &app, "prod");

        assert_eq!(registry.get_enclave("dev").unwrap().domain_name, "env.example.com");
        assert_eq!(registry.get_enclave("").unwrap().name, "prod");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["dev", "prod"]);
    }

    #[test]
    fn test_environment_default_wins() {
        let env = EnvironmentConfig {
            default_enclave: "dev".to_string(),
            enclaves: vec![enclave("dev", "")],
            ..Default::default()
        };
        let registry = EnclaveRegistry::for_environment(&env, &[enclave("prod", "")], "prod");
        assert_eq!(registry.get_enclave("").unwrap().name, "dev");
    }
}
