//! Deployer registry.
//!
//! Maps an IaC technology id to a builder and caches one built deployer per
//! (enclave, provider, technology) for the life of the registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use swiz_iac::{IacDeployer, MemoryDeployer};
use tracing::debug;

use crate::error::{Result, Subject, SwizError};
use crate::model::{Enclave, Provider};

/// Technology id of the in-memory backend.
pub const IAC_DUMMY: &str = "Dummy";

/// Builds a deployer for one enclave/provider pair.
pub type DeployerBuilder =
    Arc<dyn Fn(&Enclave, &Provider) -> Result<Arc<dyn IacDeployer>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    enclave: String,
    provider: String,
    technology: String,
}

pub struct DeployerRegistry {
    builders: BTreeMap<String, DeployerBuilder>,
    default_technology: String,
    cache: Mutex<HashMap<CacheKey, Arc<dyn IacDeployer>>>,
}

impl fmt::Debug for DeployerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployerRegistry")
            .field("technologies", &self.technologies())
            .field("default_technology", &self.default_technology)
            .finish()
    }
}

impl Default for DeployerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployerRegistry {
    /// Registry with the `Dummy` technology registered and selected as default.
    pub fn new() -> Self {
        let mut registry = Self {
            builders: BTreeMap::new(),
            default_technology: IAC_DUMMY.to_string(),
            cache: Mutex::new(HashMap::new()),
        };
        registry.register(IAC_DUMMY, |_, _| {
            Ok(Arc::new(MemoryDeployer::new()) as Arc<dyn IacDeployer>)
        });
        registry
    }

    pub fn register<F>(&mut self, technology: impl Into<String>, builder: F)
    where
        F: Fn(&Enclave, &Provider) -> Result<Arc<dyn IacDeployer>> + Send + Sync + 'static,
    {
        self.builders.insert(technology.into(), Arc::new(builder));
    }

    /// Technology used when neither the caller nor the enclave names one.
    pub fn with_default_technology(mut self, technology: impl Into<String>) -> Self {
        self.default_technology = technology.into();
        self
    }

    pub fn technologies(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<dyn IacDeployer>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve (and build on first use) the deployer for `enclave`.
    ///
    /// An empty `provider_name` selects the enclave's default provider; an
    /// empty `technology` falls back to the enclave's `default_iac`, then to
    /// the registry default.
    pub fn get_deployer(
        &self,
        enclave: &Enclave,
        provider_name: &str,
        technology: &str,
    ) -> Result<Arc<dyn IacDeployer>> {
        let provider = enclave.get_provider(provider_name).ok_or_else(|| {
            let requested = if provider_name.is_empty() {
                enclave.default_provider.as_str()
            } else {
                provider_name
            };
            SwizError::not_found(Subject::Provider, requested)
        })?;

        let technology = [technology, enclave.default_iac.as_str()]
            .into_iter()
            .find(|t| !t.is_empty())
            .unwrap_or(self.default_technology.as_str());

        let key = CacheKey {
            enclave: enclave.name.clone(),
            provider: provider.name.clone(),
            technology: technology.to_string(),
        };
        if let Some(deployer) = self.cache().get(&key) {
            return Ok(Arc::clone(deployer));
        }

        let builder = self
            .builders
            .get(technology)
            .ok_or_else(|| SwizError::not_found(Subject::IacTechnology, technology))?;
        debug!(
            enclave = %enclave.name,
            provider = %provider.name,
            technology = %technology,
            "building deployer"
        );
        let deployer = builder(enclave, &provider)?;

        Ok(Arc::clone(self.cache().entry(key).or_insert(deployer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enclave(default_iac: &str) -> Enclave {
        Enclave {
            name: "dev".to_string(),
            default_provider: "main".to_string(),
            default_iac: default_iac.to_string(),
            providers: vec![
                Provider {
                    name: "main".to_string(),
                    provider_id: "DUMMY".to_string(),
                    ..Default::default()
                },
                Provider {
                    name: "other".to_string(),
                    provider_id: "DUMMY".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_same_pair_is_cached() {
        let registry = DeployerRegistry::new();
        let enc = enclave("");
        let a = registry.get_deployer(&enc, "", "").unwrap();
        let b = registry.get_deployer(&enc, "main", IAC_DUMMY).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_provider_gets_own_deployer() {
        let registry = DeployerRegistry::new();
        let enc = enclave("");
        let a = registry.get_deployer(&enc, "main", "").unwrap();
        let b = registry.get_deployer(&enc, "other", "").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = DeployerRegistry::new();
        let err = registry
            .get_deployer(&enclave(""), "nope", "")
            .err()
            .expect("unknown provider should fail");
        assert!(err.is_not_found(Subject::Provider));
    }

    #[test]
    fn test_unknown_technology_from_enclave_default() {
        let registry = DeployerRegistry::new();
        let err = registry
            .get_deployer(&enclave("Cloudformation"), "", "")
            .err()
            .expect("unregistered technology should fail");
        assert!(err.is_not_found(Subject::IacTechnology));
        assert!(err.to_string().contains("Cloudformation"));
    }

    #[test]
    fn test_registered_technology_is_used() {
        let mut registry = DeployerRegistry::new();
        let shared: Arc<dyn IacDeployer> = Arc::new(MemoryDeployer::new());
        let handed_out = Arc::clone(&shared);
        registry.register("Custom", move |_, _| Ok(Arc::clone(&handed_out)));
        let registry = registry.with_default_technology("Custom");

        let got = registry.get_deployer(&enclave(""), "", "").unwrap();
        assert!(Arc::ptr_eq(&got, &shared));
        assert_eq!(registry.technologies(), vec!["Custom", IAC_DUMMY]);
    }
}
