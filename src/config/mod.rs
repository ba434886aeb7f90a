use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub pagination: PaginationConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Base URL prepended to `/files/{key}` when building public image URLs
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// When unset, development falls back to the in-memory store
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the filesystem blob store. `None` keeps blobs in memory.
    pub root: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub album_page_size: u32,
    pub image_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// bcrypt work factor for new password hashes
    pub password_hash_cost: u32,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024; // 16MB

/// bcrypt's accepted cost range (the crate keeps these constants private)
pub(crate) const BCRYPT_MIN_COST: u32 = 4;
pub(crate) const BCRYPT_MAX_COST: u32 = 31;

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("PIXXOR_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.server.port = port;
            if env::var("PUBLIC_BASE_URL").is_err() && self.environment == Environment::Development {
                self.server.public_base_url = format!("http://localhost:{}", port);
            }
        }
        if let Ok(v) = env::var("PUBLIC_BASE_URL") {
            self.server.public_base_url = v.trim_end_matches('/').to_string();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_ROOT") {
            self.storage.root = if v.trim().is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Ok(v) = env::var("STORAGE_MAX_UPLOAD_BYTES") {
            self.storage.max_upload_bytes = v.parse().unwrap_or(self.storage.max_upload_bytes);
        }

        // Pagination overrides
        if let Ok(v) = env::var("PAGINATION_ALBUM_PAGE_SIZE") {
            self.pagination.album_page_size = v.parse().unwrap_or(self.pagination.album_page_size);
        }
        if let Ok(v) = env::var("PAGINATION_IMAGE_PAGE_SIZE") {
            self.pagination.image_page_size = v.parse().unwrap_or(self.pagination.image_page_size);
        }
        if let Ok(v) = env::var("PAGINATION_MAX_PAGE_SIZE") {
            self.pagination.max_page_size = v.parse().unwrap_or(self.pagination.max_page_size);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_PASSWORD_HASH_COST") {
            self.security.password_hash_cost = v
                .parse::<u32>()
                .map(|cost| cost.clamp(BCRYPT_MIN_COST, BCRYPT_MAX_COST))
                .unwrap_or(self.security.password_hash_cost);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                public_base_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            storage: StorageConfig {
                root: None,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            pagination: PaginationConfig {
                album_page_size: 12,
                image_page_size: 20,
                max_page_size: 100,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "pixxor-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                password_hash_cost: BCRYPT_MIN_COST,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                public_base_url: "https://staging.pixxor.app".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            storage: StorageConfig {
                root: Some(PathBuf::from("/var/lib/pixxor/uploads")),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            pagination: PaginationConfig {
                album_page_size: 12,
                image_page_size: 20,
                max_page_size: 100,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.pixxor.app".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                public_base_url: "https://pixxor.app".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            storage: StorageConfig {
                root: Some(PathBuf::from("/var/lib/pixxor/uploads")),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            pagination: PaginationConfig {
                album_page_size: 12,
                image_page_size: 20,
                max_page_size: 50,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://pixxor.app".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
        }
    }

    /// Public URL of a stored blob
    pub fn file_url(&self, key: &str) -> String {
        format!("{}/files/{}", self.server.public_base_url, key)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.database.url.is_none());
        assert!(config.storage.root.is_none());
        assert_eq!(config.pagination.album_page_size, 12);
        assert_eq!(config.pagination.image_page_size, 20);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.storage.max_upload_bytes, 16 * 1024 * 1024);
        assert!(config.storage.root.is_some());
        assert_eq!(config.security.password_hash_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn file_url_joins_base_and_key() {
        let config = AppConfig::development();
        assert_eq!(config.file_url("abc.png"), "http://localhost:3000/files/abc.png");
    }
}
