//! Runtime configuration loaded from environment variables

use crate::catalog::Catalog;
use crate::error::GamificationError;
use crate::Result;
use chrono::FixedOffset;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    /// JSON catalog to load instead of the built-in one
    pub catalog_path: Option<PathBuf>,
    /// Optimistic write retries per request
    pub max_write_attempts: u32,
    /// Offset for the server clock; host local time when unset
    pub utc_offset: Option<FixedOffset>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            catalog_path: None,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            utc_offset: None,
        }
    }
}

impl AppConfig {
    /// Reads `PORT` (or `API_PORT`), `GAMIFICATION_CATALOG`,
    /// `MAX_WRITE_ATTEMPTS` and `UTC_OFFSET_MINUTES`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT").or_else(|| var("API_PORT")) {
            Some(raw) => parse(&raw, "PORT")?,
            None => DEFAULT_PORT,
        };

        let max_write_attempts = match var("MAX_WRITE_ATTEMPTS") {
            Some(raw) => parse(&raw, "MAX_WRITE_ATTEMPTS")?,
            None => DEFAULT_MAX_WRITE_ATTEMPTS,
        };
        if max_write_attempts == 0 {
            return Err(GamificationError::Config(
                "MAX_WRITE_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let utc_offset = match var("UTC_OFFSET_MINUTES") {
            Some(raw) => {
                let minutes: i32 = parse(&raw, "UTC_OFFSET_MINUTES")?;
                let offset = minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| {
                        GamificationError::Config(format!(
                            "UTC_OFFSET_MINUTES out of range: {}",
                            minutes
                        ))
                    })?;
                Some(offset)
            }
            None => None,
        };

        Ok(Self {
            port,
            catalog_path: var("GAMIFICATION_CATALOG").map(PathBuf::from),
            max_write_attempts,
            utc_offset,
        })
    }

    /// Catalog from `catalog_path`, or the built-in one
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::from_json_file(path),
            None => {
                info!("Using built-in catalog");
                Ok(Catalog::builtin())
            }
        }
    }
}

fn parse<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| GamificationError::Config(format!("{} is not a valid number: {}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_port_falls_back_to_api_port() {
        let config = config_from(&[("API_PORT", "9000")]).unwrap();
        assert_eq!(config.port, 9000);

        let config = config_from(&[("PORT", "7000"), ("API_PORT", "9000")]).unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_offset_and_attempts() {
        let config = config_from(&[
            ("UTC_OFFSET_MINUTES", "-300"),
            ("MAX_WRITE_ATTEMPTS", "5"),
            ("GAMIFICATION_CATALOG", "catalog.json"),
        ])
        .unwrap();

        assert_eq!(config.utc_offset, FixedOffset::west_opt(5 * 3600));
        assert_eq!(config.max_write_attempts, 5);
        assert_eq!(config.catalog_path, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for pairs in [
            vec![("PORT", "eighty")],
            vec![("MAX_WRITE_ATTEMPTS", "0")],
            vec![("UTC_OFFSET_MINUTES", "100000")],
        ] {
            let err = config_from(&pairs).unwrap_err();
            assert!(matches!(err, GamificationError::Config(_)));
        }
    }

    #[test]
    fn test_builtin_catalog_when_unset() {
        let catalog = AppConfig::default().load_catalog().unwrap();
        assert_eq!(catalog, Catalog::builtin());
    }
}
