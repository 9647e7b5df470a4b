use chrono_tz::Tz;
use config::{Config, ConfigError};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};

pub mod application;
pub mod domain;
pub mod infrastructure;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NatursurConfig {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub studio: Studio,
    #[serde(default)]
    pub mail: Mail,
    #[serde(default)]
    pub admin: Admin,
    #[serde(default)]
    pub logger: Logger,
}

impl NatursurConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("natursur.toml").required(false))
            .add_source(
                config::Environment::with_prefix("NATURSUR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<NatursurConfig>()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub address: String,
    pub debug: bool,
    /// カンマ区切り、`*` は全て許可
    pub allowed_hosts: String,
    pub tls: Option<Tls>,
}

impl Server {
    pub fn allowed_hosts(&self) -> Vec<String> {
        self.allowed_hosts
            .split(',')
            .map(|host| host.trim().to_lowercase())
            .filter(|host| !host.is_empty())
            .collect()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8000".to_owned(),
            debug: true,
            allowed_hosts: "127.0.0.1,localhost".to_owned(),
            tls: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Tls {
    pub cert: String,
    pub key: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub backend: Backend,
    pub url: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            url: "esdb://localhost:2113?tls=false".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    EventStore,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Studio {
    pub name: String,
    #[serde_as(as = "DisplayFromStr")]
    pub timezone: Tz,
    pub shop_url: String,
    pub contact_email: String,
    pub youtube_channel_id: String,
    pub instagram_username: String,
    pub facebook_url: String,
}

impl Default for Studio {
    fn default() -> Self {
        Self {
            name: "Natursur".to_owned(),
            timezone: Tz::Europe__Madrid,
            shop_url: "https://natursur.herbalife.com/es-es/u".to_owned(),
            contact_email: "info@natursur.com".to_owned(),
            youtube_channel_id: "UCryL5eZosDAQ4fDHuXK8pvw".to_owned(),
            instagram_username: "yosoyescalona".to_owned(),
            facebook_url: "https://www.facebook.com/natursur".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Mail {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

impl Default for Mail {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_owned(),
            api_key: None,
            from: "noreply@natursur.com".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Admin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for Admin {
    fn default() -> Self {
        Self {
            username: "admin".to_owned(),
            email: "admin@example.com".to_owned(),
            password: "adminpass".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Logger {
    #[serde(default)]
    pub level: Level,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub enum Level {
    TRACE,
    DEBUG,
    #[default]
    INFO,
    WARN,
    ERROR,
}

impl From<&Level> for tracing::Level {
    fn from(value: &Level) -> Self {
        match value {
            Level::TRACE => tracing::Level::TRACE,
            Level::DEBUG => tracing::Level::DEBUG,
            Level::INFO => tracing::Level::INFO,
            Level::WARN => tracing::Level::WARN,
            Level::ERROR => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_hosts() {
        let server = Server {
            allowed_hosts: " Example.com, localhost ,,".to_owned(),
            ..Server::default()
        };
        assert_eq!(server.allowed_hosts(), vec!["example.com", "localhost"]);
    }

    #[test]
    fn test_defaults() {
        let config = NatursurConfig::default();
        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.studio.timezone, Tz::Europe__Madrid);
        assert!(config.mail.api_key.is_none());
        assert!(config.server.debug);
    }

    #[test]
    fn test_override_sections() {
        let config = Config::builder()
            .set_override("studio.timezone", "Atlantic/Canary")
            .unwrap()
            .set_override("storage.backend", "eventstore")
            .unwrap()
            .set_override("logger.level", "DEBUG")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<NatursurConfig>()
            .unwrap();
        assert_eq!(config.studio.timezone, Tz::Atlantic__Canary);
        assert_eq!(config.storage.backend, Backend::EventStore);
        assert_eq!(config.studio.name, "Natursur");
        assert!(matches!(config.logger.level, Level::DEBUG));
    }
}
