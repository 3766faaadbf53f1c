//! Process configuration read from the environment.

use tracing::warn;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8088";
pub const DEFAULT_POOL_SIZE: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: String,
    pub listen_addr: String,
    pub pool_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Trimmed environment variable; empty counts as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pool_size = match lookup("FIELDOPS_POOL_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    warn!("Ignoring invalid FIELDOPS_POOL_SIZE '{}'", raw);
                    DEFAULT_POOL_SIZE
                }
            },
            None => DEFAULT_POOL_SIZE,
        };
        Self {
            data_dir: lookup("FIELDOPS_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            listen_addr: lookup("FIELDOPS_LISTEN_ADDR")
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            pool_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn overrides_are_read_and_bad_pool_sizes_ignored() {
        let config = config_from(&[
            ("FIELDOPS_DATA_DIR", "/var/lib/fieldops"),
            ("FIELDOPS_LISTEN_ADDR", "127.0.0.1:9000"),
            ("FIELDOPS_POOL_SIZE", "0"),
        ]);
        assert_eq!(config.data_dir, "/var/lib/fieldops");
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }
}
