//! Load configuration
//!
//! Metadata keys describe a cartridge loaded from the source-archive form,
//! which carries no header of its own. `env-*` keys build the environment
//! table handed to the script host for every form.
//!
//! Configuration is either assembled from key/value pairs or read from a RON
//! map such as:
//!
//! ```ron
//! {
//!     "name": "Harbour Walk",
//!     "latitude": 52.1,
//!     "env-Downloaded": 3,
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use waypost_core::{CartridgeMeta, Value, ValueMap, ZonePoint};

/// A configuration value as written in a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Flag(b) => write!(f, "{}", b),
            ConfigValue::Number(n) => write!(f, "{}", n),
            ConfigValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Text(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Text(s)
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Number(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Flag(b)
    }
}

/// Environment passed to the script host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub platform: String,
    pub cart_folder: String,
    pub sync_folder: String,
    pub log_folder: String,
    pub path_sep: String,
    pub device_id: String,
    pub version: String,
    /// Number of times the cartridge was downloaded
    pub downloaded: i64,
    /// Defaults to the source name without extension
    pub cart_filename: Option<String>,
    /// Defaults to the cartridge's target device
    pub device: Option<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            platform: "Waypost".to_string(),
            cart_folder: String::new(),
            sync_folder: String::new(),
            log_folder: String::new(),
            path_sep: std::path::MAIN_SEPARATOR.to_string(),
            device_id: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            downloaded: 0,
            cart_filename: None,
            device: None,
        }
    }
}

impl Environment {
    /// Build the script-visible table, filling the defaults
    pub fn to_value_map(&self, source_name: &str, device: &str) -> ValueMap {
        let cart_filename = self.cart_filename.clone().unwrap_or_else(|| {
            Path::new(source_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let device = self.device.clone().unwrap_or_else(|| device.to_string());

        let mut env = ValueMap::new();
        env.insert("Platform".to_string(), Value::from(self.platform.as_str()));
        env.insert("CartFolder".to_string(), Value::from(self.cart_folder.as_str()));
        env.insert("SyncFolder".to_string(), Value::from(self.sync_folder.as_str()));
        env.insert("LogFolder".to_string(), Value::from(self.log_folder.as_str()));
        env.insert("PathSep".to_string(), Value::from(self.path_sep.as_str()));
        env.insert("DeviceID".to_string(), Value::from(self.device_id.as_str()));
        env.insert("Version".to_string(), Value::from(self.version.as_str()));
        env.insert("Downloaded".to_string(), Value::Int(self.downloaded));
        env.insert("CartFilename".to_string(), Value::String(cart_filename));
        env.insert("Device".to_string(), Value::String(device));
        env
    }
}

/// Configuration for loading a cartridge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    pub gametype: String,
    pub author: String,
    pub description: String,
    pub guid: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub startdesc: String,
    pub url: String,
    pub device: String,
    pub version: String,
    pub user: String,
    pub completion_code: String,
    /// Archive file used as icon
    pub icon: Option<String>,
    /// Archive file shown on the start screen
    pub splash: Option<String>,
    pub env: Environment,
}

fn invalid(key: &str, reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn number(key: &str, value: &ConfigValue) -> Result<f64> {
    match value {
        ConfigValue::Number(n) => Ok(*n),
        ConfigValue::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(key, format!("'{}' is not a number", s))),
        ConfigValue::Flag(_) => Err(invalid(key, "expected a number")),
    }
}

fn non_empty(value: &ConfigValue) -> Option<String> {
    Some(value.to_string()).filter(|s| !s.is_empty())
}

fn integer(key: &str, value: &ConfigValue) -> Result<i64> {
    match value {
        ConfigValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        ConfigValue::Number(n) => Err(invalid(key, format!("{} is not an integer", n))),
        ConfigValue::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(key, format!("'{}' is not an integer", s))),
        ConfigValue::Flag(_) => Err(invalid(key, "expected an integer")),
    }
}

impl LoadConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from key/value pairs
    ///
    /// # Example
    ///
    /// ```
    /// use waypost_format::LoadConfig;
    ///
    /// let pairs = [("name", "Harbour Walk"), ("env-Downloaded", "3")];
    /// let config = LoadConfig::from_pairs(pairs).unwrap();
    /// assert_eq!(config.name, "Harbour Walk");
    /// assert_eq!(config.env.downloaded, 3);
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ConfigValue>,
    {
        let mut config = Self::new();
        for (key, value) in pairs {
            config.set(key.as_ref(), value.into())?;
        }
        Ok(config)
    }

    /// Parse a RON map of keys to values
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let map: indexmap::IndexMap<String, ConfigValue> = ron::from_str(content)?;
        Self::from_pairs(map)
    }

    /// Read a RON configuration file
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Set one key; unknown keys are logged and ignored
    pub fn set(&mut self, key: &str, value: ConfigValue) -> Result<()> {
        match key {
            "gametype" => self.gametype = value.to_string(),
            "author" => self.author = value.to_string(),
            "description" => self.description = value.to_string(),
            "guid" => self.guid = value.to_string(),
            "name" => self.name = value.to_string(),
            "latitude" => self.latitude = number(key, &value)?,
            "longitude" => self.longitude = number(key, &value)?,
            "altitude" => self.altitude = number(key, &value)?,
            "startdesc" => self.startdesc = value.to_string(),
            "url" => self.url = value.to_string(),
            "device" => self.device = value.to_string(),
            "version" => self.version = value.to_string(),
            "user" => self.user = value.to_string(),
            "completion_code" => self.completion_code = value.to_string(),
            "icon" => self.icon = Some(value.to_string().to_lowercase()),
            "splash" => self.splash = Some(value.to_string().to_lowercase()),
            "env-Platform" => self.env.platform = value.to_string(),
            "env-CartFolder" => self.env.cart_folder = value.to_string(),
            "env-SyncFolder" => self.env.sync_folder = value.to_string(),
            "env-LogFolder" => self.env.log_folder = value.to_string(),
            "env-PathSep" => self.env.path_sep = value.to_string(),
            "env-DeviceID" => self.env.device_id = value.to_string(),
            "env-Version" => self.env.version = value.to_string(),
            "env-Downloaded" => self.env.downloaded = integer(key, &value)?,
            "env-CartFilename" => self.env.cart_filename = non_empty(&value),
            "env-Device" => self.env.device = non_empty(&value),
            _ => tracing::warn!(key, "ignoring unknown configuration key"),
        }
        Ok(())
    }

    /// Cartridge metadata for the source-archive form
    pub fn meta(&self) -> CartridgeMeta {
        CartridgeMeta {
            activity: self.gametype.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            guid: self.guid.clone(),
            name: self.name.clone(),
            starting_location: ZonePoint::new(self.latitude, self.longitude, self.altitude),
            starting_description: self.startdesc.clone(),
            url: self.url.clone(),
            device: self.device.clone(),
            version: self.version.clone(),
            user: self.user.clone(),
            completion_code: self.completion_code.clone(),
            created: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs() {
        let config = LoadConfig::from_pairs([
            ("name", "Harbour Walk"),
            ("latitude", "52.5"),
            ("icon", "Logo.PNG"),
            ("no-such-key", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.name, "Harbour Walk");
        assert_eq!(config.latitude, 52.5);
        assert_eq!(config.icon.as_deref(), Some("logo.png"));
    }

    #[test]
    fn test_invalid_number() {
        let err = LoadConfig::from_pairs([("latitude", "north")]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "latitude"));
        assert!(LoadConfig::from_pairs([("env-Downloaded", "2.5")]).is_err());
    }

    #[test]
    fn test_from_ron() {
        let config = LoadConfig::from_ron_str(
            r#"{
                "name": "Harbour Walk",
                "latitude": 52.1,
                "env-Downloaded": 3,
                "env-Device": "Garmin",
            }"#,
        )
        .unwrap();
        assert_eq!(config.name, "Harbour Walk");
        assert_eq!(config.latitude, 52.1);
        assert_eq!(config.env.downloaded, 3);
        assert_eq!(config.env.device.as_deref(), Some("Garmin"));
    }

    #[test]
    fn test_environment_defaults() {
        let config = LoadConfig::new();
        let env = config.env.to_value_map("/cartridges/harbour.gwc", "PocketPC");
        assert_eq!(env["CartFilename"], Value::from("harbour"));
        assert_eq!(env["Device"], Value::from("PocketPC"));
        assert_eq!(env["Downloaded"], Value::Int(0));
        assert_eq!(env.len(), 10);
    }

    #[test]
    fn test_environment_overrides() {
        let config =
            LoadConfig::from_pairs([("env-CartFilename", "custom"), ("env-Device", "Oregon")])
                .unwrap();
        let env = config.env.to_value_map("harbour.gwc", "PocketPC");
        assert_eq!(env["CartFilename"], Value::from("custom"));
        assert_eq!(env["Device"], Value::from("Oregon"));
    }

    #[test]
    fn test_meta() {
        let pairs = [("name", "Walk"), ("gametype", "Fiction"), ("altitude", "3")];
        let config = LoadConfig::from_pairs(pairs).unwrap();
        let meta = config.meta();
        assert_eq!(meta.name, "Walk");
        assert_eq!(meta.activity, "Fiction");
        assert_eq!(meta.starting_location.altitude, 3.0);
    }
}
