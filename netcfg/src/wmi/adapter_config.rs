//! `Win32_NetworkAdapterConfiguration` backed configurator

use super::{WmiConnection, WmiObject};
use crate::adapter::{Adapter, Mutation, ReturnCode};
use crate::configurator::NetworkConfigurator;
use crate::error::{NetCfgError, Result};

const CLASS_NAME: &str = "Win32_NetworkAdapterConfiguration";
const ENABLED_ADAPTERS_QUERY: &str =
    "SELECT * FROM Win32_NetworkAdapterConfiguration WHERE IPEnabled = TRUE";

/// Configurator that talks to WMI in root\cimv2.
///
/// COM interfaces are not `Send`, so every call opens its own connection on
/// the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct WmiConfigurator;

impl WmiConfigurator {
    pub fn new() -> Self {
        WmiConfigurator
    }

    fn object_path(adapter: &Adapter) -> String {
        format!("{}.Index={}", CLASS_NAME, adapter.index)
    }

    fn read_adapter(obj: &WmiObject) -> Result<Adapter> {
        let setting_id = obj.get_string_required("SettingID")?;
        let index = obj
            .get_u32("Index")?
            .ok_or_else(|| NetCfgError::MissingProperty("Index".to_string()))?;
        let description = obj.get_string("Description")?.unwrap_or_default();

        let mut adapter = Adapter::new(setting_id, index, description);
        adapter.dhcp_enabled = obj.get_bool("DHCPEnabled")?.unwrap_or(false);
        adapter.ip_addresses = obj.get_string_array("IPAddress")?;
        adapter.ip_subnets = obj.get_string_array("IPSubnet")?;
        adapter.default_gateways = obj.get_string_array("DefaultIPGateway")?;
        adapter.dns_servers = obj.get_string_array("DNSServerSearchOrder")?;
        Ok(adapter)
    }

    /// Populate the method's input parameters for `mutation`.
    fn fill_params(params: &WmiObject, mutation: &Mutation) -> Result<()> {
        match mutation {
            // Parameters left null
            Mutation::EnableDhcp | Mutation::ClearDnsServers => Ok(()),
            Mutation::EnableStatic {
                addresses,
                subnet_masks,
            } => {
                params.put_string_array("IPAddress", addresses)?;
                params.put_string_array("SubnetMask", subnet_masks)
            }
            Mutation::SetGateways {
                gateways,
                cost_metrics,
            } => {
                let metrics: Vec<i32> = cost_metrics.iter().map(|m| i32::from(*m)).collect();
                params.put_string_array("DefaultIPGateway", gateways)?;
                params.put_i32_array("GatewayCostMetric", &metrics)
            }
            Mutation::SetDnsServers { servers } => {
                params.put_string_array("DNSServerSearchOrder", servers)
            }
        }
    }
}

impl NetworkConfigurator for WmiConfigurator {
    fn list_adapters(&self) -> Result<Vec<Adapter>> {
        let conn = WmiConnection::connect_cimv2()?;

        let mut adapters = Vec::new();
        for obj in conn.query(ENABLED_ADAPTERS_QUERY)? {
            let obj = obj?;
            match Self::read_adapter(&obj) {
                Ok(adapter) => adapters.push(adapter),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable adapter configuration"),
            }
        }

        tracing::debug!(count = adapters.len(), "Enumerated IP-enabled adapters");
        Ok(adapters)
    }

    fn apply(&self, adapter: &Adapter, mutation: &Mutation) -> Result<ReturnCode> {
        let conn = WmiConnection::connect_cimv2()?;
        let method = mutation.method_name();
        let path = Self::object_path(adapter);

        let params = conn.get_method_params(CLASS_NAME, method)?;
        if let Some(params) = &params {
            Self::fill_params(params, mutation)?;
        }

        tracing::debug!(adapter = %adapter.setting_id, %path, method, "Invoking WMI method");
        let output = conn
            .exec_method(&path, method, params.as_ref())?
            .ok_or_else(|| NetCfgError::WmiError(format!("{} returned no output", method)))?;

        let code = output
            .get_u32("ReturnValue")?
            .ok_or_else(|| NetCfgError::MissingProperty("ReturnValue".to_string()))?;
        Ok(ReturnCode(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_uses_index() {
        let adapter = Adapter::new("{4D36E972-E325-11CE-BFC1-08002BE10318}", 12, "Ethernet");
        assert_eq!(
            WmiConfigurator::object_path(&adapter),
            "Win32_NetworkAdapterConfiguration.Index=12"
        );
    }
}
