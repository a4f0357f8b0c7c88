//! Shared daemon state

use std::sync::Arc;

use chrono::FixedOffset;

use snooze_core::config::DaemonConfig;
use snooze_core::error::ConfigError;
use snooze_core::traits::ServerControl;

use crate::decoy::DecoySettings;
use crate::registry::WakeRegistry;

/// State shared by the reconciliation loop and the process entry point
pub struct DaemonState {
    /// Configuration
    pub config: DaemonConfig,
    /// Parsed `config.utc_offset`
    pub offset: FixedOffset,
    /// Panel, or a fake in tests
    pub control: Arc<dyn ServerControl>,
    /// Active decoy listeners
    pub registry: Arc<WakeRegistry>,
    /// What the decoys advertise
    pub decoy: Arc<DecoySettings>,
}

impl DaemonState {
    /// Create daemon state around a server control backend
    pub fn new(config: DaemonConfig, control: Arc<dyn ServerControl>) -> Result<Self, ConfigError> {
        let offset = config.offset()?;
        let decoy = Arc::new(DecoySettings::from_config(&config));
        Ok(Self {
            config,
            offset,
            control,
            registry: Arc::new(WakeRegistry::new()),
            decoy,
        })
    }
}
