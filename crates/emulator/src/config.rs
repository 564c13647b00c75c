//! Emulator configuration management

use crate::class::{DeviceClass, parse_field};
use crate::descriptor::{ConfigurationDescriptor, DeviceDescriptor, MAX_STRING_UNITS};
use crate::identity::{
    DEFAULT_MANUFACTURER, DEFAULT_PRODUCT, DEFAULT_PRODUCT_ID, DEFAULT_SERIAL_NUMBER,
    DEFAULT_VENDOR_ID, DeviceIdentity,
};
use anyhow::{Context, Result, anyhow};
use protocol::DeviceSpeed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmulatorConfig {
    #[serde(default)]
    pub emulator: EmulatorSettings,
    #[serde(default)]
    pub device: DeviceSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorSettings {
    #[serde(default = "EmulatorSettings::default_log_level")]
    pub log_level: String,
    /// Interval between device ticks in milliseconds
    #[serde(default = "EmulatorSettings::default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Address the host link listens on
    #[serde(default = "EmulatorSettings::default_listen_addr")]
    pub listen_addr: String,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            tick_interval_ms: Self::default_tick_interval(),
            listen_addr: Self::default_listen_addr(),
        }
    }
}

impl EmulatorSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_tick_interval() -> u64 {
        10
    }

    fn default_listen_addr() -> String {
        "127.0.0.1:3240".to_string()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// A class field as written in the file: `8`, `"8"` or `"0x08"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassField {
    Number(i64),
    Text(String),
}

impl fmt::Display for ClassField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ClassField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "DeviceSettings::default_class")]
    pub class: ClassField,
    #[serde(default = "DeviceSettings::default_zero")]
    pub subclass: ClassField,
    #[serde(default = "DeviceSettings::default_zero")]
    pub protocol: ClassField,
    #[serde(default = "DeviceSettings::default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "DeviceSettings::default_product_id")]
    pub product_id: u16,
    #[serde(default)]
    pub speed: DeviceSpeed,
    #[serde(default = "DeviceSettings::default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "DeviceSettings::default_product")]
    pub product: String,
    #[serde(default = "DeviceSettings::default_serial_number")]
    pub serial_number: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            class: Self::default_class(),
            subclass: Self::default_zero(),
            protocol: Self::default_zero(),
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            speed: DeviceSpeed::default(),
            manufacturer: Self::default_manufacturer(),
            product: Self::default_product(),
            serial_number: Self::default_serial_number(),
        }
    }
}

impl DeviceSettings {
    fn default_class() -> ClassField {
        ClassField::from("0xff")
    }

    fn default_zero() -> ClassField {
        ClassField::from("0x00")
    }

    fn default_vendor_id() -> u16 {
        DEFAULT_VENDOR_ID
    }

    fn default_product_id() -> u16 {
        DEFAULT_PRODUCT_ID
    }

    fn default_manufacturer() -> String {
        DEFAULT_MANUFACTURER.to_string()
    }

    fn default_product() -> String {
        DEFAULT_PRODUCT.to_string()
    }

    fn default_serial_number() -> String {
        DEFAULT_SERIAL_NUMBER.to_string()
    }

    /// Class triple, with the same rules as [`DeviceClass::parse`]
    pub fn class(&self) -> crate::Result<DeviceClass> {
        Ok(DeviceClass::new(
            parse_field("class", &self.class.to_string())?,
            parse_field("subclass", &self.subclass.to_string())?,
            parse_field("protocol", &self.protocol.to_string())?,
        ))
    }

    /// Descriptor identity described by these settings
    pub fn identity(&self) -> crate::Result<DeviceIdentity> {
        let class = self.class()?;
        let mut device = DeviceDescriptor::new(class, self.speed);
        device.vendor_id = self.vendor_id;
        device.product_id = self.product_id;
        device.manufacturer_index = 1;
        device.product_index = 2;
        device.serial_number_index = 3;

        Ok(DeviceIdentity::builder(device)
            .speed(self.speed)
            .configuration(ConfigurationDescriptor::single_interface(class))
            .string(1, self.manufacturer.as_str())
            .string(2, self.product.as_str())
            .string(3, self.serial_number.as_str())
            .build())
    }
}

impl EmulatorConfig {
    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Some(Self::default_path())
                .filter(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?,
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: EmulatorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-emulator").join("emulator.toml")
        } else {
            PathBuf::from(".config/usb-emulator/emulator.toml")
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.emulator.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.emulator.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.emulator.tick_interval_ms == 0 {
            return Err(anyhow!("tick_interval_ms must be greater than zero"));
        }

        self.emulator
            .listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address '{}'", self.emulator.listen_addr))?;

        self.device.class()?;

        for (name, text) in [
            ("manufacturer", &self.device.manufacturer),
            ("product", &self.device.product),
            ("serial_number", &self.device.serial_number),
        ] {
            let units = text.encode_utf16().count();
            if units > MAX_STRING_UNITS {
                return Err(anyhow!(
                    "{} is {} UTF-16 units long, at most {} fit in a string descriptor",
                    name,
                    units,
                    MAX_STRING_UNITS
                ));
            }
        }

        Ok(())
    }
}
