use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    hash::{BuildHasher, Hash},
    path::Path,
};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Property holding the comma-separated IPv4 allow-list.
pub const IP_ALLOW_LIST_KEY: &str = "ipWhiteList";

/// Read access to flat string properties, the way a properties file exposes them.
pub trait PropertySource {
    fn property(&self, key: &str) -> Option<String>;
}

impl<K, S> PropertySource for HashMap<K, String, S>
where
    K: std::borrow::Borrow<str> + Eq + Hash,
    S: BuildHasher,
{
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Deserialize)]
pub struct Config {
    pub listen: ListenConfig,
    #[serde(flatten)]
    pub properties: HashMap<String, toml::Value>,
}

#[derive(Deserialize)]
pub struct ListenConfig {
    pub ip: String,
    pub port: u16,
}

impl PropertySource for Config {
    fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            toml::Value::String(value) => Some(value.clone()),
            toml::Value::Integer(value) => Some(value.to_string()),
            toml::Value::Float(value) => Some(value.to_string()),
            toml::Value::Boolean(value) => Some(value.to_string()),
            toml::Value::Datetime(value) => Some(value.to_string()),
            toml::Value::Array(_) | toml::Value::Table(_) => None,
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to load {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse configuration as valid TOML")
}
