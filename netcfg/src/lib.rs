//! Windows network adapter configuration library
//!
//! Provides typed access to the IP configuration of network adapters
//! (`Win32_NetworkAdapterConfiguration` in `root\cimv2`): enumerate the
//! IP-enabled adapters and apply DHCP, static address, gateway and DNS
//! changes to one of them.
//!
//! # Architecture
//!
//! All OS access goes through the [`NetworkConfigurator`] trait so callers can
//! substitute their own implementation (tests use a recording fake):
//! - **WmiConfigurator**: COM/WMI backend, Windows only
//! - **UnsupportedConfigurator**: placeholder for other platforms
//!
//! # Example
//!
//! ```ignore
//! use netcfg::{system_configurator, Mutation, NetworkConfigurator};
//!
//! fn main() -> netcfg::Result<()> {
//!     let configurator = system_configurator();
//!
//!     for adapter in configurator.list_adapters()? {
//!         println!("{}: {:?}", adapter.description, adapter.ip_addresses);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod adapter;
mod configurator;
mod error;
#[cfg(windows)]
mod wmi;

pub use adapter::{Adapter, Mutation, ReturnCode, DEFAULT_GATEWAY_COST_METRIC};
pub use configurator::{system_configurator, NetworkConfigurator, UnsupportedConfigurator};
pub use error::{NetCfgError, Result};
#[cfg(windows)]
pub use wmi::WmiConfigurator;
