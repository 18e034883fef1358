//! OS network configuration capability

use crate::adapter::{Adapter, Mutation, ReturnCode};
use crate::error::{NetCfgError, Result};
use std::sync::Arc;

/// Access to the adapter configuration objects of the local machine.
///
/// Every call is synchronous and may block on the OS; async callers should
/// run it on a blocking thread.
pub trait NetworkConfigurator: Send + Sync {
    /// Enumerate the IP-enabled adapter configuration objects.
    fn list_adapters(&self) -> Result<Vec<Adapter>>;

    /// Invoke one configuration method on `adapter` and return its raw
    /// return code. Non-success codes are returned, not raised.
    fn apply(&self, adapter: &Adapter, mutation: &Mutation) -> Result<ReturnCode>;
}

/// Configurator for platforms without a supported backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedConfigurator;

impl NetworkConfigurator for UnsupportedConfigurator {
    fn list_adapters(&self) -> Result<Vec<Adapter>> {
        Err(NetCfgError::Unsupported)
    }

    fn apply(&self, _adapter: &Adapter, _mutation: &Mutation) -> Result<ReturnCode> {
        Err(NetCfgError::Unsupported)
    }
}

/// The configurator backed by this platform's network management interface.
#[cfg(windows)]
pub fn system_configurator() -> Arc<dyn NetworkConfigurator> {
    Arc::new(crate::wmi::WmiConfigurator::new())
}

/// The configurator backed by this platform's network management interface.
#[cfg(not(windows))]
pub fn system_configurator() -> Arc<dyn NetworkConfigurator> {
    Arc::new(UnsupportedConfigurator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_configurator() {
        let cfg = UnsupportedConfigurator;
        assert!(matches!(cfg.list_adapters(), Err(NetCfgError::Unsupported)));

        let adapter = Adapter::new("{A}", 1, "Test");
        let result = cfg.apply(&adapter, &Mutation::EnableDhcp);
        assert!(matches!(result, Err(NetCfgError::Unsupported)));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_system_configurator_unsupported_off_windows() {
        let cfg = system_configurator();
        assert!(matches!(cfg.list_adapters(), Err(NetCfgError::Unsupported)));
    }
}
