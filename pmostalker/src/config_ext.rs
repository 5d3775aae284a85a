//! Réglages du client de portail stockés dans pmoconfig
//!
//! ```rust,ignore
//! use pmoconfig::get_config;
//! use pmostalker::StalkerConfigExt;
//!
//! let config = get_config();
//! let timeout = config.get_stalker_request_timeout_secs()?;
//! ```

use crate::identity::DEFAULT_SERIAL_NUMBER;
use crate::transport::{DEFAULT_TIMEOUT_SECS, MAG_USER_AGENT};
use anyhow::{Result, anyhow};
use pmoconfig::{Config, impl_u64_config};
use serde_yaml::Value;

/// Trait d'extension ajoutant la section `stalker` à [`Config`]
pub trait StalkerConfigExt {
    /// Numéro de série présenté aux portails quand aucune surcharge n'existe
    fn get_stalker_serial_number(&self) -> Result<String>;

    /// Fixe le numéro de série par défaut
    ///
    /// Refuse les valeurs vides, que les portails traiteraient comme un numéro absent.
    fn set_stalker_serial_number(&self, serial: &str) -> Result<()>;

    fn get_stalker_user_agent(&self) -> Result<String>;

    fn get_stalker_request_timeout_secs(&self) -> Result<u64>;

    fn set_stalker_request_timeout_secs(&self, secs: u64) -> Result<()>;
}

impl StalkerConfigExt for Config {
    fn get_stalker_serial_number(&self) -> Result<String> {
        Ok(self.get_string_or(&["stalker", "serial_number"], DEFAULT_SERIAL_NUMBER))
    }

    fn set_stalker_serial_number(&self, serial: &str) -> Result<()> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(anyhow!("serial number cannot be empty"));
        }
        self.set_value(
            &["stalker", "serial_number"],
            Value::String(serial.to_string()),
        )
    }

    fn get_stalker_user_agent(&self) -> Result<String> {
        Ok(self.get_string_or(&["stalker", "user_agent"], MAG_USER_AGENT))
    }

    impl_u64_config!(
        get_stalker_request_timeout_secs,
        set_stalker_request_timeout_secs,
        &["stalker", "request_timeout_secs"],
        DEFAULT_TIMEOUT_SECS
    );
}
