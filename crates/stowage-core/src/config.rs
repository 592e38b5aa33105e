//! Configuration module
//!
//! Settings are read from the process environment (a `.env` file is honored).
//! `Config::from_lookup` takes any key lookup so tests can build configs from
//! plain maps without touching process state.

use std::env;
use std::fmt;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const OBJECT_STORE_REGION: &str = "us-east-1";
const OBJECT_STORE_TIMEOUT_SECS: u64 = 30;
const OBJECT_STORE_MAX_ATTEMPTS: u32 = 3;
const RECONCILE_GRACE_SECS: u64 = 3600;

/// Log output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Base configuration for the HTTP server process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_format: LogFormat,
}

/// Connection settings for the object-store backend.
#[derive(Clone)]
pub struct ObjectStoreSettings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...)
    pub endpoint: Option<String>,
    /// Base URL returned by `locate`; overrides the bucket/endpoint template.
    pub public_url: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl fmt::Debug for ObjectStoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("public_url", &self.public_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct StowageConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_public_base_url: String,
    pub object_store_bucket: Option<String>,
    pub object_store_region: String,
    pub object_store_endpoint: Option<String>,
    pub object_store_public_url: Option<String>,
    pub object_store_access_key: Option<String>,
    pub object_store_secret_key: Option<String>,
    pub object_store_timeout_secs: u64,
    pub object_store_max_attempts: u32,
    pub max_upload_size_bytes: usize,
    /// Seconds between background reconciliation sweeps. 0 = disabled.
    pub reconcile_interval_secs: u64,
    /// Orphaned blobs younger than this are left alone (upload may be in flight).
    pub reconcile_grace_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StowageConfig>);

impl Config {
    fn inner(&self) -> &StowageConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = StowageConfig::from_lookup(lookup)?;
        config.validate()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn log_format(&self) -> LogFormat {
        self.inner().base.log_format
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_public_base_url(&self) -> &str {
        &self.inner().local_public_base_url
    }

    /// Object-store settings, when the bucket is configured.
    pub fn object_store(&self) -> Option<ObjectStoreSettings> {
        let c = self.inner();
        c.object_store_bucket
            .as_ref()
            .map(|bucket| ObjectStoreSettings {
                bucket: bucket.clone(),
                region: c.object_store_region.clone(),
                endpoint: c.object_store_endpoint.clone(),
                public_url: c.object_store_public_url.clone(),
                access_key: c.object_store_access_key.clone(),
                secret_key: c.object_store_secret_key.clone(),
                timeout_secs: c.object_store_timeout_secs,
                max_attempts: c.object_store_max_attempts,
            })
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().max_upload_size_bytes
    }

    pub fn reconcile_interval_secs(&self) -> u64 {
        self.inner().reconcile_interval_secs
    }

    pub fn reconcile_grace_secs(&self) -> u64 {
        self.inner().reconcile_grace_secs
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl StowageConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let log_format = match var("LOG_FORMAT").map(|s| s.to_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
            log_format,
        };

        let database_url =
            var("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = var("STORAGE_BACKEND")
            .ok_or_else(|| {
                anyhow::anyhow!("STORAGE_BACKEND must be set to either 'local' or 'object_store'")
            })?
            .parse::<StorageBackend>()?;

        let max_upload_size_mb = var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        Ok(StowageConfig {
            base,
            database_url,
            storage_backend,
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_public_base_url: var("LOCAL_PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            object_store_bucket: var("OBJECT_STORE_BUCKET"),
            object_store_region: var("OBJECT_STORE_REGION")
                .unwrap_or_else(|| OBJECT_STORE_REGION.to_string()),
            object_store_endpoint: var("OBJECT_STORE_ENDPOINT"),
            object_store_public_url: var("OBJECT_STORE_PUBLIC_URL"),
            object_store_access_key: var("OBJECT_STORE_ACCESS_KEY"),
            object_store_secret_key: var("OBJECT_STORE_SECRET_KEY"),
            object_store_timeout_secs: var("OBJECT_STORE_TIMEOUT_SECS")
                .unwrap_or_else(|| OBJECT_STORE_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(OBJECT_STORE_TIMEOUT_SECS),
            object_store_max_attempts: var("OBJECT_STORE_MAX_ATTEMPTS")
                .unwrap_or_else(|| OBJECT_STORE_MAX_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(OBJECT_STORE_MAX_ATTEMPTS),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            reconcile_interval_secs: var("RECONCILE_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            reconcile_grace_secs: var("RECONCILE_GRACE_SECS")
                .unwrap_or_else(|| RECONCILE_GRACE_SECS.to_string())
                .parse()
                .unwrap_or(RECONCILE_GRACE_SECS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.base.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.base.db_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("DB_TIMEOUT_SECONDS must be greater than 0"));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        match self.storage_backend {
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH is required when STORAGE_BACKEND=local"
                    ));
                }
            }
            StorageBackend::ObjectStore => {
                if self.object_store_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "OBJECT_STORE_BUCKET is required when STORAGE_BACKEND=object_store"
                    ));
                }
                if self.object_store_access_key.is_some() != self.object_store_secret_key.is_some()
                {
                    return Err(anyhow::anyhow!(
                        "OBJECT_STORE_ACCESS_KEY and OBJECT_STORE_SECRET_KEY must be set together"
                    ));
                }
                if self.object_store_timeout_secs == 0 {
                    return Err(anyhow::anyhow!(
                        "OBJECT_STORE_TIMEOUT_SECS must be greater than 0"
                    ));
                }
                if self.object_store_max_attempts == 0 {
                    return Err(anyhow::anyhow!(
                        "OBJECT_STORE_MAX_ATTEMPTS must be at least 1"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const DB: (&str, &str) = ("DATABASE_URL", "postgresql://localhost/stowage");

    #[test]
    fn test_local_backend_defaults() {
        let config = config_from(&[
            DB,
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/uploads"),
        ])
        .unwrap();

        assert_eq!(config.storage_backend(), StorageBackend::Local);
        assert_eq!(config.local_storage_path(), Some("/tmp/uploads"));
        assert_eq!(config.local_public_base_url(), "");
        assert_eq!(config.server_port(), 4000);
        assert_eq!(config.max_upload_size_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.reconcile_interval_secs(), 0);
        assert_eq!(config.reconcile_grace_secs(), 3600);
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert!(config.object_store().is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_backend_is_required() {
        let err = config_from(&[DB, ("LOCAL_STORAGE_PATH", "/tmp/uploads")]).unwrap_err();
        assert!(err.to_string().contains("STORAGE_BACKEND"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(config_from(&[DB, ("STORAGE_BACKEND", "ftp")]).is_err());
    }

    #[test]
    fn test_local_backend_requires_path() {
        let err = config_from(&[DB, ("STORAGE_BACKEND", "local")]).unwrap_err();
        assert!(err.to_string().contains("LOCAL_STORAGE_PATH"));
    }

    #[test]
    fn test_object_store_requires_bucket() {
        let err = config_from(&[DB, ("STORAGE_BACKEND", "object_store")]).unwrap_err();
        assert!(err.to_string().contains("OBJECT_STORE_BUCKET"));
    }

    #[test]
    fn test_object_store_credentials_must_be_paired() {
        let err = config_from(&[
            DB,
            ("STORAGE_BACKEND", "object_store"),
            ("OBJECT_STORE_BUCKET", "uploads"),
            ("OBJECT_STORE_ACCESS_KEY", "AKIA"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("OBJECT_STORE_SECRET_KEY"));
    }

    #[test]
    fn test_object_store_settings() {
        let config = config_from(&[
            DB,
            ("STORAGE_BACKEND", "objectStore"),
            ("OBJECT_STORE_BUCKET", "uploads"),
            ("OBJECT_STORE_ENDPOINT", "http://localhost:9000"),
            ("OBJECT_STORE_ACCESS_KEY", "minio"),
            ("OBJECT_STORE_SECRET_KEY", "minio-secret"),
            ("OBJECT_STORE_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();

        let settings = config.object_store().unwrap();
        assert_eq!(settings.bucket, "uploads");
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.timeout_secs, 30);

        let debug = format!("{:?}", settings);
        assert!(!debug.contains("minio-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let err = config_from(&[
            DB,
            ("ENVIRONMENT", "production"),
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/uploads"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let err = config_from(&[
            ("DATABASE_URL", "sqlite://stowage.db"),
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/uploads"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PostgreSQL"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[
            DB,
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/uploads"),
            ("PORT", "  "),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.server_port(), 4000);
        assert_eq!(config.log_format(), LogFormat::Json);
    }
}
