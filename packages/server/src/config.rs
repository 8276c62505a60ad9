//! Server configuration from environment variables
//!
//! | Variable                    | Default                    |
//! |-----------------------------|----------------------------|
//! | `GUILDSCOPE_HOST`           | `127.0.0.1`                |
//! | `GUILDSCOPE_PORT`           | `3001`                     |
//! | `GUILDSCOPE_DB_PATH`        | `./data/guildscope.db`     |
//! | `GUILDSCOPE_DATASET_PATH`   | `./data/funguild.sqlite`   |
//! | `GUILDSCOPE_DATASET_TABLE`  | `funguild`                 |
//! | `GUILDSCOPE_DATASET_KEY`    | `guid` (`taxon` for NEMAGuild) |
//! | `GUILDSCOPE_ADMIN_TOKEN`    | unset (approval disabled)  |
//! | `CORS_ALLOW_ORIGIN`         | local dev origins          |

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Application database (overrides, comments, accounts)
    pub db_path: PathBuf,
    /// Read-only dataset produced by `guildscope-ingest`
    pub dataset_path: PathBuf,
    pub dataset_table: String,
    /// Column holding each dataset row's id
    pub dataset_key: String,
    /// Bearer token accepted for account administration
    pub admin_token: Option<String>,
    /// Single allowed CORS origin; local dev origins when unset
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from("./data/guildscope.db"),
            dataset_path: PathBuf::from("./data/funguild.sqlite"),
            dataset_table: "funguild".to_string(),
            dataset_key: "guid".to_string(),
            admin_token: None,
            cors_origin: None,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("GUILDSCOPE_HOST").unwrap_or(defaults.host),
            port: non_empty("GUILDSCOPE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            db_path: non_empty("GUILDSCOPE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            dataset_path: non_empty("GUILDSCOPE_DATASET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_path),
            dataset_table: non_empty("GUILDSCOPE_DATASET_TABLE").unwrap_or(defaults.dataset_table),
            dataset_key: non_empty("GUILDSCOPE_DATASET_KEY").unwrap_or(defaults.dataset_key),
            admin_token: non_empty("GUILDSCOPE_ADMIN_TOKEN"),
            cors_origin: non_empty("CORS_ALLOW_ORIGIN"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(ServerConfig::from_lookup(|_| None), ServerConfig::default());
    }

    #[test]
    fn test_overrides_and_bad_port() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GUILDSCOPE_PORT", "not-a-port"),
            ("GUILDSCOPE_DATASET_TABLE", "nemaguild"),
            ("GUILDSCOPE_ADMIN_TOKEN", "  "),
            ("CORS_ALLOW_ORIGIN", "http://localhost:8080"),
        ]);
        let config = ServerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.dataset_table, "nemaguild");
        assert_eq!(config.admin_token, None);
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.bind_addr(), "127.0.0.1:3001");
    }
}
