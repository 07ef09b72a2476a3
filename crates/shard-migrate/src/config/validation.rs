//! Configuration validation.

use super::{DataSourceConfig, JobConfiguration};
use crate::drivers::DialectImpl;
use crate::error::{MigrateError, Result};

/// Validate the job configuration.
pub fn validate(config: &JobConfiguration) -> Result<()> {
    if config.job_id.trim().is_empty() {
        return Err(MigrateError::Config("job_id is required".into()));
    }

    validate_data_source("source", &config.source)?;
    validate_data_source("target", &config.target)?;

    if config.tables.is_empty() {
        return Err(MigrateError::Config(
            "tables must contain at least one table mapping".into(),
        ));
    }
    if config.unique_key.name.trim().is_empty() {
        return Err(MigrateError::Config("unique_key.name is required".into()));
    }

    if config.sharding_count == 0 {
        return Err(MigrateError::Config(
            "sharding_count must be at least 1".into(),
        ));
    }
    if config.sharding_count as usize > config.tables.len() {
        return Err(MigrateError::Config(format!(
            "sharding_count ({}) cannot exceed the number of tables ({})",
            config.sharding_count,
            config.tables.len()
        )));
    }

    // Process config validation - only check if explicitly set
    let process = &config.process;
    if let Some(0) = process.read_batch_size {
        return Err(MigrateError::Config(
            "process.read_batch_size must be at least 1".into(),
        ));
    }
    if let Some(size) = process.sharding_size {
        if size < 1 {
            return Err(MigrateError::Config(
                "process.sharding_size must be at least 1".into(),
            ));
        }
    }
    if let Some(0) = process.read_qps {
        return Err(MigrateError::Config(
            "process.read_qps must be at least 1 when set".into(),
        ));
    }
    if let Some(0) = process.channel_capacity {
        return Err(MigrateError::Config(
            "process.channel_capacity must be at least 1".into(),
        ));
    }
    if let Some(0) = process.read_workers {
        return Err(MigrateError::Config(
            "process.read_workers must be at least 1".into(),
        ));
    }
    if let Some(0) = process.write_workers {
        return Err(MigrateError::Config(
            "process.write_workers must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_data_source(side: &str, ds: &DataSourceConfig) -> Result<()> {
    if ds.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", side)));
    }
    if ds.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", side)));
    }
    if ds.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", side)));
    }
    DialectImpl::from_db_type(&ds.r#type)
        .map_err(|e| MigrateError::Config(format!("{}.type: {}", side, e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessConfig;
    use crate::core::schema::{TableMapping, UniqueKeyColumn};

    fn valid_config() -> JobConfiguration {
        JobConfiguration {
            job_id: "j1".to_string(),
            sharding_count: 1,
            source: DataSourceConfig {
                r#type: "mysql".to_string(),
                host: "mysql-src".to_string(),
                port: 3306,
                database: "orders".to_string(),
                user: "root".to_string(),
                password: "password".to_string(),
                schema: "orders".to_string(),
                ssl_mode: "disable".to_string(),
            },
            target: DataSourceConfig {
                r#type: "postgres".to_string(),
                host: "pg-dst".to_string(),
                port: 5432,
                database: "orders".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            tables: vec![TableMapping::new("t_order_0", "t_order")],
            unique_key: UniqueKeyColumn::new("order_id", "bigint"),
            process: ProcessConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_job_id() {
        let mut config = valid_config();
        config.job_id = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_source_type() {
        let mut config = valid_config();
        config.source.r#type = "oracle".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("source.type"));
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_no_tables() {
        let mut config = valid_config();
        config.tables.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_sharding_count_bounds() {
        let mut config = valid_config();
        config.sharding_count = 0;
        assert!(validate(&config).is_err());
        config.sharding_count = 2;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_sharding_size_rejected() {
        let mut config = valid_config();
        config.process.sharding_size = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_qps_rejected() {
        let mut config = valid_config();
        config.process.read_qps = Some(0);
        assert!(validate(&config).is_err());
    }
}
