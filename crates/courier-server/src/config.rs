// Validated server configuration handed to the lifecycle manager.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("listen port out of range (1-65535): {0}")]
    PortOutOfRange(u64),
}

/// Immutable server configuration.
///
/// The port is fixed for the lifetime of the handle it is bound to; changing
/// it requires constructing a new server instance.
///
/// ```
/// use courier_server::ServerConfig;
///
/// let config = ServerConfig::new(9000).expect("valid port");
/// assert_eq!(config.port(), 9000);
/// assert!(ServerConfig::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Result<Self> {
        if port == 0 {
            return Err(ConfigurationError::PortOutOfRange(0));
        }
        Ok(Self { port })
    }

    // Range-checks an unvalidated integer from the configuration layer.
    pub fn from_raw(raw: u64) -> Result<Self> {
        match u16::try_from(raw) {
            Ok(port) if port != 0 => Ok(Self { port }),
            _ => Err(ConfigurationError::PortOutOfRange(raw)),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
