use anyhow::{Context, Result};
use courier_server::ServerConfig;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

const DEFAULT_PORT: u64 = 9000;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5000;

// Broker service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    // Broker listen port, validated into a ServerConfig before construction.
    pub port: u64,
    // Max time to wait for graceful shutdown before forcing termination.
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Deserialize)]
struct BrokerConfigOverride {
    port: Option<u64>,
    shutdown_grace_ms: Option<u64>,
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self> {
        // Environment variables provide defaults for local development.
        let port = match std::env::var("COURIER_BROKER_PORT") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| "parse COURIER_BROKER_PORT")?,
            Err(_) => DEFAULT_PORT,
        };
        let shutdown_grace_ms = std::env::var("COURIER_SHUTDOWN_GRACE_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS);
        Ok(Self {
            port,
            shutdown_grace_ms,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("COURIER_BROKER_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read COURIER_BROKER_CONFIG: {path}"))?;
            let override_cfg: BrokerConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse broker config yaml")?;
            if let Some(value) = override_cfg.port {
                config.port = value;
            }
            if let Some(value) = override_cfg.shutdown_grace_ms
                && value > 0
            {
                config.shutdown_grace_ms = value;
            }
        }
        Ok(config)
    }

    // Range-checks the raw port into the immutable server configuration.
    pub fn server_config(&self) -> Result<ServerConfig> {
        ServerConfig::from_raw(self.port).context("resolve broker listen port")
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EnvGuard;
    use serial_test::serial;
    use std::io::Write;

    fn write_temp_yaml(name: &str, contents: &str) -> Result<std::path::PathBuf> {
        let path = std::env::temp_dir().join(format!("{}-{}.yaml", name, std::process::id()));
        let mut file = fs::File::create(&path)?;
        file.write_all(contents.as_bytes())?;
        Ok(path)
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env() -> Result<()> {
        let _g1 = EnvGuard::unset("COURIER_BROKER_PORT");
        let _g2 = EnvGuard::unset("COURIER_SHUTDOWN_GRACE_MS");
        let _g3 = EnvGuard::unset("COURIER_BROKER_CONFIG");
        let config = BrokerConfig::from_env_or_yaml()?;
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.shutdown_grace_ms, DEFAULT_SHUTDOWN_GRACE_MS);
        Ok(())
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() -> Result<()> {
        let _g1 = EnvGuard::set("COURIER_BROKER_PORT", "7100");
        let _g2 = EnvGuard::set("COURIER_SHUTDOWN_GRACE_MS", "250");
        let _g3 = EnvGuard::unset("COURIER_BROKER_CONFIG");
        let config = BrokerConfig::from_env_or_yaml()?;
        assert_eq!(config.port, 7100);
        assert_eq!(config.shutdown_grace(), Duration::from_millis(250));
        Ok(())
    }

    #[test]
    #[serial]
    fn unparseable_port_is_an_error() {
        let _g1 = EnvGuard::set("COURIER_BROKER_PORT", "not-a-port");
        let _g2 = EnvGuard::unset("COURIER_BROKER_CONFIG");
        assert!(BrokerConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() -> Result<()> {
        let path = write_temp_yaml("broker-config-yaml-overrides-env", "port: 7200\n")?;
        let _g1 = EnvGuard::set("COURIER_BROKER_PORT", "7100");
        let _g2 = EnvGuard::unset("COURIER_SHUTDOWN_GRACE_MS");
        let _g3 = EnvGuard::set("COURIER_BROKER_CONFIG", path.to_str().expect("utf8 path"));
        let config = BrokerConfig::from_env_or_yaml()?;
        assert_eq!(config.port, 7200);
        assert_eq!(config.shutdown_grace_ms, DEFAULT_SHUTDOWN_GRACE_MS);
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn out_of_range_port_fails_resolution() {
        let _g1 = EnvGuard::set("COURIER_BROKER_PORT", "0");
        let _g2 = EnvGuard::unset("COURIER_BROKER_CONFIG");
        let config = BrokerConfig::from_env_or_yaml().expect("raw config resolves");
        assert!(config.server_config().is_err());
    }
}
