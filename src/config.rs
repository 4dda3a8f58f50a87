//! Ambient configuration surface: parses a pool's key table out of a simple
//! properties format, the way a caller of this crate is expected to load
//! pool settings before constructing a [`crate::db::ConnectionPool`].
//!
//! Deliberately just a properties-block parser plus validation: no
//! directory-service or managed-bean integration, since nothing in this
//! crate depends on either.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::strategy::SelectionStrategy;

/// Validated settings for one named pool, after legacy-alias resolution and
/// bound checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    pub name: String,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub min_pool: usize,
    pub max_pool: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    pub validation_query: Option<String>,
    pub cache_statements: bool,
    pub strategy: SelectionStrategy,
    pub async_destroy: bool,
    pub recycle_after_delegate_use: bool,
    /// `prop.<X>` passthrough values for the underlying driver.
    pub driver_props: HashMap<String, String>,
}

/// Raw key/value view of one `<poolname>.`-prefixed block, as read from a
/// properties file or a `[pools.<name>]` TOML table, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPoolProperties {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub minpool: Option<String>,
    pub maxpool: Option<String>,
    pub maxsize: Option<String>,
    pub idletimeout: Option<String>,
    pub validationquery: Option<String>,
    pub cache: Option<String>,
    pub access: Option<String>,
    #[serde(rename = "async")]
    pub async_: Option<String>,
    pub recycleafterdelegateuse: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,

    // Legacy aliases: retained and logged as deprecated on read.
    pub maxconn: Option<String>,
    pub expiry: Option<String>,
    pub poolsize: Option<String>,
}

/// The `[pools.<name>]` tables of a TOML configuration document, the
/// alternate shape `RawPoolProperties` can be loaded from besides the flat
/// properties format.
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlConfigFile {
    #[serde(default)]
    pools: HashMap<String, RawPoolProperties>,
}

impl RawPoolProperties {
    /// Parse a flat `key=value` properties block already stripped of its
    /// `<poolname>.` prefix, one entry per line, `#`-comments allowed.
    pub fn from_properties_block(text: &str) -> Self {
        let mut raw = RawPoolProperties::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().to_string();
            raw.set(key, value);
        }
        raw
    }

    /// Parse a TOML document's `[pools.<name>]` table into a
    /// `RawPoolProperties`, the alternate configuration shape to the flat
    /// properties format of [`RawPoolProperties::from_properties_block`].
    pub fn from_toml(text: &str, name: &str) -> Result<Self> {
        let file: TomlConfigFile = toml::from_str(text)
            .map_err(|e| PoolError::ConfigInvalid(format!("invalid TOML: {e}")))?;
        file.pools
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::ConfigInvalid(format!("no [pools.{name}] table in config")))
    }

    fn set(&mut self, key: &str, value: String) {
        match key {
            "url" => self.url = Some(value),
            "user" => self.user = Some(value),
            "password" => self.password = Some(value),
            "minpool" => self.minpool = Some(value),
            "maxpool" => self.maxpool = Some(value),
            "maxsize" => self.maxsize = Some(value),
            "idletimeout" => self.idletimeout = Some(value),
            "validationquery" => self.validationquery = Some(value),
            "cache" => self.cache = Some(value),
            "access" => self.access = Some(value),
            "async" => self.async_ = Some(value),
            "recycleafterdelegateuse" => self.recycleafterdelegateuse = Some(value),
            "maxconn" => self.maxconn = Some(value),
            "expiry" => self.expiry = Some(value),
            "poolsize" => self.poolsize = Some(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Resolve legacy aliases, apply defaults, validate bounds, and produce
    /// a [`PoolSettings`]. `name` is the `<poolname>` the block was read
    /// under.
    pub fn validate(mut self, name: &str) -> Result<PoolSettings> {
        if let Some(legacy) = self.maxconn.take() {
            tracing::warn!(pool = name, "config key 'maxconn' is deprecated, use 'maxsize'");
            self.maxsize.get_or_insert(legacy);
        }
        if let Some(legacy) = self.expiry.take() {
            tracing::warn!(pool = name, "config key 'expiry' is deprecated, use 'idletimeout'");
            self.idletimeout.get_or_insert(legacy);
        }
        if let Some(legacy) = self.poolsize.take() {
            tracing::warn!(pool = name, "config key 'poolsize' is deprecated, use 'maxpool'");
            self.maxpool.get_or_insert(legacy);
        }

        let url = self
            .url
            .ok_or_else(|| PoolError::ConfigInvalid(format!("pool '{name}': 'url' is required")))?;

        let min_pool = parse_usize(name, "minpool", self.minpool.as_deref(), 0)?;
        let max_pool = parse_usize(name, "maxpool", self.maxpool.as_deref(), 0)?;
        let mut max_size = parse_usize(name, "maxsize", self.maxsize.as_deref(), 0)?;
        let idle_timeout_secs = parse_usize(name, "idletimeout", self.idletimeout.as_deref(), 0)?;

        if min_pool > max_pool {
            return Err(PoolError::ConfigInvalid(format!(
                "pool '{name}': minpool ({min_pool}) > maxpool ({max_pool})"
            )));
        }
        if max_size > 0 && max_size < max_pool {
            // A hard cap smaller than the steady-state target is raised to
            // match rather than rejected outright.
            max_size = max_pool;
        }

        let strategy = match self.access.as_deref() {
            None => SelectionStrategy::Lifo,
            Some(s) => SelectionStrategy::parse(s).ok_or_else(|| {
                PoolError::ConfigInvalid(format!("pool '{name}': invalid 'access' value '{s}'"))
            })?,
        };

        let cache_statements = parse_bool(self.cache.as_deref(), true);
        let async_destroy = parse_bool(self.async_.as_deref(), false);
        let recycle_after_delegate_use = parse_bool(self.recycleafterdelegateuse.as_deref(), false);

        let mut driver_props = HashMap::new();
        for (key, value) in self.extra {
            if let Some(prop_name) = key.strip_prefix("prop.") {
                driver_props.insert(prop_name.to_string(), value);
            }
        }

        Ok(PoolSettings {
            name: name.to_string(),
            url,
            user: self.user,
            password: self.password,
            min_pool,
            max_pool,
            max_size,
            idle_timeout: Duration::from_secs(idle_timeout_secs as u64),
            validation_query: self.validationquery,
            cache_statements,
            strategy,
            async_destroy,
            recycle_after_delegate_use,
            driver_props,
        })
    }
}

fn parse_usize(pool: &str, key: &str, value: Option<&str>, default: usize) -> Result<usize> {
    match value {
        None => Ok(default),
        Some(s) => s.parse::<i64>().map_err(|_| {
            PoolError::ConfigInvalid(format!("pool '{pool}': '{key}' is not a number: '{s}'"))
        }).and_then(|n| {
            if n < 0 {
                Err(PoolError::ConfigInvalid(format!(
                    "pool '{pool}': '{key}' must not be negative, got {n}"
                )))
            } else {
                Ok(n as usize)
            }
        }),
    }
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("true") | Some("1") | Some("yes") => true,
        Some("false") | Some("0") | Some("no") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_aliases_resolve_and_warn() {
        let raw = RawPoolProperties::from_properties_block(
            "url=jdbc:fake://localhost\nmaxconn=50\nexpiry=30\npoolsize=10\n",
        );
        let settings = raw.validate("main").unwrap();
        assert_eq!(settings.max_size, 50);
        assert_eq!(settings.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_pool, 10);
    }

    #[test]
    fn maxsize_below_maxpool_is_raised() {
        let raw = RawPoolProperties::from_properties_block(
            "url=jdbc:fake://localhost\nmaxpool=20\nmaxsize=5\n",
        );
        let settings = raw.validate("main").unwrap();
        assert_eq!(settings.max_size, 20);
    }

    #[test]
    fn minpool_greater_than_maxpool_rejected() {
        let raw = RawPoolProperties::from_properties_block(
            "url=jdbc:fake://localhost\nminpool=10\nmaxpool=5\n",
        );
        assert!(raw.validate("main").is_err());
    }

    #[test]
    fn missing_url_rejected() {
        let raw = RawPoolProperties::from_properties_block("minpool=1\n");
        assert!(raw.validate("main").is_err());
    }

    #[test]
    fn toml_table_loads_the_same_as_a_properties_block() {
        let toml_text = r#"
            [pools.main]
            url = "jdbc:fake://localhost"
            maxpool = "10"
            maxsize = "10"
            access = "FIFO"
        "#;
        let raw = RawPoolProperties::from_toml(toml_text, "main").unwrap();
        let settings = raw.validate("main").unwrap();
        assert_eq!(settings.max_pool, 10);
        assert_eq!(settings.max_size, 10);
        assert_eq!(settings.strategy, SelectionStrategy::Fifo);
    }

    #[test]
    fn toml_missing_pool_table_is_config_invalid() {
        let err = RawPoolProperties::from_toml("[pools.other]\nurl = \"x\"\n", "main").unwrap_err();
        assert!(matches!(err, PoolError::ConfigInvalid(_)));
    }

    #[test]
    fn driver_props_are_collected() {
        let raw = RawPoolProperties::from_properties_block(
            "url=jdbc:fake://localhost\nprop.ssl=true\nprop.timeout=30\n",
        );
        let settings = raw.validate("main").unwrap();
        assert_eq!(settings.driver_props.get("ssl").map(String::as_str), Some("true"));
        assert_eq!(settings.driver_props.get("timeout").map(String::as_str), Some("30"));
    }
}
