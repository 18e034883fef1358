//! Adapter configuration model
//!
//! Platform-neutral view of one IP-enabled adapter configuration object and
//! the mutations that can be applied to it.

use serde::Serialize;
use std::fmt;

/// Cost metric applied to every gateway set through [`Mutation::SetGateways`]
/// when the caller has no preference.
pub const DEFAULT_GATEWAY_COST_METRIC: u16 = 1;

/// One IP-enabled network adapter configuration as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adapter {
    /// Stable configuration identifier (`SettingID`, a GUID string on Windows)
    pub setting_id: String,
    /// OS index of the configuration object (`Index`)
    pub index: u32,
    /// Human readable adapter description
    pub description: String,
    /// Whether the address is currently DHCP assigned
    pub dhcp_enabled: bool,
    pub ip_addresses: Vec<String>,
    pub ip_subnets: Vec<String>,
    pub default_gateways: Vec<String>,
    pub dns_servers: Vec<String>,
}

impl Adapter {
    /// Create an adapter with only its identity populated.
    pub fn new(setting_id: impl Into<String>, index: u32, description: impl Into<String>) -> Self {
        Adapter {
            setting_id: setting_id.into(),
            index,
            description: description.into(),
            dhcp_enabled: false,
            ip_addresses: Vec::new(),
            ip_subnets: Vec::new(),
            default_gateways: Vec::new(),
            dns_servers: Vec::new(),
        }
    }
}

/// A single state transition on one adapter configuration object.
///
/// Each variant maps to exactly one `Win32_NetworkAdapterConfiguration`
/// method invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Switch the adapter to DHCP-assigned addressing
    EnableDhcp,
    /// Remove every DNS server from the search order
    ClearDnsServers,
    /// Assign static addresses with their subnet masks
    EnableStatic {
        addresses: Vec<String>,
        subnet_masks: Vec<String>,
    },
    /// Replace the default gateways and their cost metrics
    SetGateways {
        gateways: Vec<String>,
        cost_metrics: Vec<u16>,
    },
    /// Replace the DNS server search order
    SetDnsServers { servers: Vec<String> },
}

impl Mutation {
    /// WMI method implementing this mutation
    pub fn method_name(&self) -> &'static str {
        match self {
            Mutation::EnableDhcp => "EnableDHCP",
            Mutation::ClearDnsServers | Mutation::SetDnsServers { .. } => {
                "SetDNSServerSearchOrder"
            }
            Mutation::EnableStatic { .. } => "EnableStatic",
            Mutation::SetGateways { .. } => "SetGateways",
        }
    }

    /// Short human readable step name used in logs and failure messages
    pub fn step(&self) -> &'static str {
        match self {
            Mutation::EnableDhcp => "Enable DHCP",
            Mutation::ClearDnsServers => "Clear DNS servers",
            Mutation::EnableStatic { .. } => "Set static IP",
            Mutation::SetGateways { .. } => "Set gateway",
            Mutation::SetDnsServers { .. } => "Set DNS servers",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::EnableDhcp | Mutation::ClearDnsServers => write!(f, "{}", self.step()),
            Mutation::EnableStatic {
                addresses,
                subnet_masks,
            } => write!(
                f,
                "{} {}/{}",
                self.step(),
                addresses.join(","),
                subnet_masks.join(",")
            ),
            Mutation::SetGateways { gateways, .. } => {
                write!(f, "{} {}", self.step(), gateways.join(","))
            }
            Mutation::SetDnsServers { servers } => {
                write!(f, "{} {}", self.step(), servers.join(","))
            }
        }
    }
}

/// `ReturnValue` of a `Win32_NetworkAdapterConfiguration` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnCode(pub u32);

impl ReturnCode {
    pub const SUCCESS: ReturnCode = ReturnCode(0);
    pub const SUCCESS_REBOOT_REQUIRED: ReturnCode = ReturnCode(1);

    /// Codes 0 and 1 both mean the OS accepted the change.
    pub fn is_success(&self) -> bool {
        matches!(self.0, 0 | 1)
    }

    pub fn reboot_required(&self) -> bool {
        self.0 == 1
    }

    /// Documented meaning of the code
    pub fn description(&self) -> &'static str {
        match self.0 {
            0 => "Successful completion, no reboot required",
            1 => "Successful completion, reboot required",
            64 => "Method not supported on this platform",
            65 => "Unknown failure",
            66 => "Invalid subnet mask",
            67 => "An error occurred while processing an instance that was returned",
            68 => "Invalid input parameter",
            69 => "More than five gateways specified",
            70 => "Invalid IP address",
            71 => "Invalid gateway IP address",
            72 => "An error occurred while accessing the registry for the requested information",
            73 => "Invalid domain name",
            74 => "Invalid host name",
            75 => "No primary or secondary WINS server defined",
            76 => "Invalid file",
            77 => "Invalid system path",
            78 => "File copy failed",
            79 => "Invalid security parameter",
            80 => "Unable to configure TCP/IP service",
            81 => "Unable to configure DHCP service",
            82 => "Unable to renew DHCP lease",
            83 => "Unable to release DHCP lease",
            84 => "IP not enabled on adapter",
            85 => "IPX not enabled on adapter",
            86 => "Frame or network number bounds error",
            87 => "Invalid frame type",
            88 => "Invalid network number",
            89 => "Duplicate network number",
            90 => "Parameter out of bounds",
            91 => "Access denied",
            92 => "Out of memory",
            93 => "Already exists",
            94 => "Path, file, or object not found",
            95 => "Unable to notify service",
            96 => "Unable to notify DNS service",
            97 => "Interface not configurable",
            98 => "Not all DHCP leases could be released or renewed",
            100 => "DHCP not enabled on the adapter",
            _ => "Unrecognized return code",
        }
    }
}

impl From<u32> for ReturnCode {
    fn from(value: u32) -> Self {
        ReturnCode(value)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_success() {
        assert!(ReturnCode::SUCCESS.is_success());
        assert!(ReturnCode::SUCCESS_REBOOT_REQUIRED.is_success());
        assert!(ReturnCode::SUCCESS_REBOOT_REQUIRED.reboot_required());
        assert!(!ReturnCode(70).is_success());
        assert!(!ReturnCode(91).reboot_required());
    }

    #[test]
    fn test_return_code_display() {
        assert_eq!(ReturnCode(66).to_string(), "66 (Invalid subnet mask)");
        assert_eq!(ReturnCode(4242).description(), "Unrecognized return code");
    }

    #[test]
    fn test_mutation_method_names() {
        assert_eq!(Mutation::EnableDhcp.method_name(), "EnableDHCP");
        assert_eq!(
            Mutation::ClearDnsServers.method_name(),
            "SetDNSServerSearchOrder"
        );
        let dns = Mutation::SetDnsServers {
            servers: vec!["8.8.8.8".to_string()],
        };
        assert_eq!(dns.method_name(), "SetDNSServerSearchOrder");
        assert_eq!(dns.step(), "Set DNS servers");
    }

    #[test]
    fn test_mutation_display() {
        let m = Mutation::EnableStatic {
            addresses: vec!["192.168.1.50".to_string()],
            subnet_masks: vec!["255.255.255.0".to_string()],
        };
        assert_eq!(m.to_string(), "Set static IP 192.168.1.50/255.255.255.0");
    }

    #[test]
    fn test_adapter_serializes_for_display() {
        let mut adapter = Adapter::new("{X}", 7, "Ethernet");
        adapter.ip_addresses = vec!["10.0.0.5".to_string()];
        let json = serde_json::to_value(&adapter).unwrap();
        assert_eq!(json["setting_id"], "{X}");
        assert_eq!(json["ip_addresses"][0], "10.0.0.5");
    }
}
