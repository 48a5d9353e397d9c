use config::{Config, ConfigError, Environment, File, Source};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::health::{ManagerConfig, ServiceInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_delay_seconds: u64,
    pub check_timeout_seconds: Option<u64>,
    pub health_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service_id: String,
    pub version: String,
    pub release_id: String,
    pub description: Option<String>,
    /// A list in the file, a comma separated string in the environment.
    #[serde(deserialize_with = "string_or_list")]
    pub notes: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_delay_seconds: 10,
            check_timeout_seconds: None,
            health_endpoint: "/health".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_id: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION_MAJOR").to_string(),
            release_id: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            notes: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `health_monitor.toml` if present, then `HEALTH_*`
    /// environment variables (`__` separates nested keys).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(File::with_name("health_monitor").required(false))
    }

    /// Same layering as [`AppConfig::load`] with an explicit, optional file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(File::from(path.as_ref()).required(false))
    }

    fn load_with<S>(file: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("HEALTH")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.monitor.check_delay_seconds == 0 {
            return Err(ConfigError::Message(
                "Health check delay must be greater than 0".to_string(),
            ));
        }

        if self.monitor.check_timeout_seconds == Some(0) {
            return Err(ConfigError::Message(
                "Health check timeout must be greater than 0 when set".to_string(),
            ));
        }

        if !self.monitor.health_endpoint.starts_with('/') {
            return Err(ConfigError::Message(
                "Health endpoint must start with '/'".to_string(),
            ));
        }

        if self.service.service_id.is_empty() {
            return Err(ConfigError::Message(
                "Service id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl MonitorConfig {
    pub fn check_delay(&self) -> Duration {
        Duration::from_secs(self.check_delay_seconds)
    }

    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_seconds.map(Duration::from_secs)
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            check_delay: self.check_delay(),
            check_timeout: self.check_timeout(),
        }
    }
}

impl ServiceConfig {
    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            service_id: self.service_id.clone(),
            version: self.version.clone(),
            release_id: self.release_id.clone(),
            description: self.description.clone(),
            notes: self.notes.clone(),
        }
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrList;

    impl<'de> de::Visitor<'de> for StringOrList {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of strings or a comma separated string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value
                .split(',')
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut notes = Vec::new();
            while let Some(note) = seq.next_element::<String>()? {
                notes.push(note);
            }
            Ok(notes)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrList)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.monitor.check_delay_seconds, 10);
        assert_eq!(config.monitor.health_endpoint, "/health");
        assert!(config.monitor.check_timeout_seconds.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.monitor.check_delay_seconds = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.monitor.check_timeout_seconds = Some(0);
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.monitor.health_endpoint = "health".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.service.service_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");

        let mut config = AppConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 8080;
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_manager_config_conversion() {
        let mut monitor = MonitorConfig::default();
        assert_eq!(monitor.manager_config().check_delay, Duration::from_secs(10));
        assert!(monitor.manager_config().check_timeout.is_none());

        monitor.check_delay_seconds = 1;
        monitor.check_timeout_seconds = Some(5);
        let manager_config = monitor.manager_config();
        assert_eq!(manager_config.check_delay, Duration::from_secs(1));
        assert_eq!(manager_config.check_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_service_info_conversion() {
        let mut service = ServiceConfig::default();
        service.service_id = "dadjokes".to_string();
        service.notes = vec!["environment=test".to_string()];

        let info = service.service_info();
        assert_eq!(info.service_id, "dadjokes");
        assert_eq!(info.release_id, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.notes, vec!["environment=test".to_string()]);
    }

    struct EnvGuard {
        keys: Vec<&'static str>,
    }

    impl EnvGuard {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self {
                keys: vars.iter().map(|(key, _)| *key).collect(),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.keys {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_loading() {
        let config = AppConfig::load().expect("Should load default configuration");

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.monitor.check_delay_seconds, 10);
        assert_eq!(config.monitor.health_endpoint, "/health");
        assert_eq!(config.service.release_id, env!("CARGO_PKG_VERSION"));
        assert!(config.service.notes.is_empty());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let _env = EnvGuard::set(&[
            ("HEALTH_MONITOR__CHECK_DELAY_SECONDS", "3"),
            ("HEALTH_MONITOR__CHECK_TIMEOUT_SECONDS", "2"),
            ("HEALTH_SERVER__PORT", "8081"),
            ("HEALTH_SERVICE__VERSION", "1.0"),
            ("HEALTH_SERVICE__RELEASE_ID", "2.10"),
            ("HEALTH_SERVICE__NOTES", "region=eu, 1.50"),
        ]);

        let config = AppConfig::load().expect("Should load configuration from environment");

        assert_eq!(config.monitor.check_delay_seconds, 3);
        assert_eq!(config.monitor.check_timeout_seconds, Some(2));
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.service.version, "1.0");
        assert_eq!(config.service.release_id, "2.10");
        assert_eq!(config.service.notes, vec!["region=eu".to_string(), "1.50".to_string()]);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_rejected() {
        let _env = EnvGuard::set(&[("HEALTH_MONITOR__CHECK_DELAY_SECONDS", "0")]);
        assert!(AppConfig::load().is_err());
    }

    #[test]
    #[serial]
    fn test_file_layering() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("health_monitor.toml");
        std::fs::write(
            &path,
            r#"
[monitor]
check_delay_seconds = 5
health_endpoint = "/status"

[service]
service_id = "dadjokes"
release_id = "2.10"
notes = ["environment=staging", "owner=platform"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).expect("Should load configuration file");
        assert_eq!(config.monitor.check_delay_seconds, 5);
        assert_eq!(config.monitor.health_endpoint, "/status");
        assert_eq!(config.service.service_id, "dadjokes");
        assert_eq!(config.service.release_id, "2.10");
        assert_eq!(
            config.service.notes,
            vec!["environment=staging".to_string(), "owner=platform".to_string()]
        );
        assert_eq!(config.server.port, 3000);

        let _env = EnvGuard::set(&[("HEALTH_MONITOR__CHECK_DELAY_SECONDS", "7")]);
        let config = AppConfig::load_from(&path).expect("Should layer environment over file");
        assert_eq!(config.monitor.check_delay_seconds, 7);
        assert_eq!(config.service.service_id, "dadjokes");
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.toml"))
            .expect("Missing file should be optional");
        assert_eq!(config.monitor.check_delay_seconds, 10);
    }
}
