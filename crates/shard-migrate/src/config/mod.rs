//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl JobConfiguration {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: JobConfiguration = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
job_id: j1
sharding_count: 2
source:
  type: postgres
  host: src
  database: shop
  user: app
  password: pw
target:
  type: postgres
  host: dst
  database: shop
  user: app
tables:
  - actual: T_Order_0
    logic: t_order
  - actual: t_order_1
    logic: t_order
unique_key:
  name: order_id
process:
  sharding_size: 5000
  read_qps: 50
"#;

    #[test]
    fn test_from_yaml() {
        let config = JobConfiguration::from_yaml(YAML).unwrap();
        assert_eq!(config.job_id, "j1");
        assert_eq!(config.sharding_count, 2);
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.source.schema, "public");
        assert_eq!(config.tables[0].actual.original(), "T_Order_0");
        assert!(config.unique_key.data_type.is_none());
        assert_eq!(config.process.get_sharding_size(), 5000);
        assert_eq!(config.process.read_qps, Some(50));
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = YAML.replace("sharding_count: 2", "sharding_count: 3");
        assert!(JobConfiguration::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = JobConfiguration::from_yaml(YAML).unwrap();
        let b = JobConfiguration::from_yaml(YAML).unwrap();
        assert_eq!(a.hash(), b.hash());

        let c = JobConfiguration::from_yaml(&YAML.replace("sharding_size: 5000", "sharding_size: 6000"))
            .unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = JobConfiguration::load(&path).unwrap();
        assert_eq!(config.tables.len(), 2);
    }
}
