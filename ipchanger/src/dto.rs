//! Wire-level request and response types
//!
//! Each connection carries exactly one request line and one response line,
//! both encoded as JSON.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SUBNET_MASK: &str = "255.255.255.0";

pub const MSG_INVALID_REQUEST: &str = "Invalid request format.";
pub const MSG_ADAPTER_NOT_FOUND: &str = "Adapter not found.";
pub const MSG_DHCP_ENABLED: &str = "DHCP Enabled";
pub const MSG_STATIC_CONFIGURED: &str = "Static IP configured successfully.";

/// Configuration request sent by a client.
///
/// Field names are camelCase on the wire; PascalCase is accepted as well.
/// Absent fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationRequest {
    /// `SettingID` of the adapter to change
    #[serde(alias = "AdapterId")]
    pub adapter_id: String,
    /// When set, the static fields are ignored
    #[serde(alias = "UseDhcp")]
    pub use_dhcp: bool,
    #[serde(alias = "IpAddress")]
    pub ip_address: String,
    #[serde(alias = "SubnetMask")]
    pub subnet_mask: String,
    #[serde(alias = "Gateway")]
    pub gateway: String,
    /// Comma-separated DNS servers
    #[serde(alias = "Dns")]
    pub dns: String,
}

impl Default for ConfigurationRequest {
    fn default() -> Self {
        Self {
            adapter_id: String::new(),
            use_dhcp: false,
            ip_address: String::new(),
            subnet_mask: DEFAULT_SUBNET_MASK.to_string(),
            gateway: String::new(),
            dns: String::new(),
        }
    }
}

impl ConfigurationRequest {
    /// Request switching `adapter_id` to DHCP
    pub fn dhcp(adapter_id: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            use_dhcp: true,
            ..Default::default()
        }
    }

    /// Request a static address on `adapter_id`
    pub fn static_ip(
        adapter_id: impl Into<String>,
        ip_address: impl Into<String>,
        subnet_mask: impl Into<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            ip_address: ip_address.into(),
            subnet_mask: subnet_mask.into(),
            ..Default::default()
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn with_dns(mut self, dns: impl Into<String>) -> Self {
        self.dns = dns.into();
        self
    }

    /// Parse one request line. Only a JSON object is a request; `null`,
    /// arrays, malformed JSON and wrong shapes all yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// True when a gateway should be set
    pub fn has_gateway(&self) -> bool {
        !self.gateway.trim().is_empty()
    }

    /// DNS servers split on commas, each trimmed, empty entries dropped
    pub fn dns_servers(&self) -> Vec<String> {
        self.dns
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Outcome returned to the client, exactly one per connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationResponse {
    pub success: bool,
    pub message: String,
}

impl ConfigurationResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn invalid_request() -> Self {
        Self::failure(MSG_INVALID_REQUEST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_request() {
        let line = r#"{"adapterId":"{A}","useDhcp":false,"ipAddress":"192.168.1.50","subnetMask":"255.255.255.0","gateway":"192.168.1.1","dns":"8.8.8.8,8.8.4.4"}"#;
        let request = ConfigurationRequest::parse_line(line).unwrap();
        assert_eq!(request.adapter_id, "{A}");
        assert!(!request.use_dhcp);
        assert_eq!(request.ip_address, "192.168.1.50");
        assert_eq!(request.gateway, "192.168.1.1");
        assert_eq!(request.dns_servers(), vec!["8.8.8.8", "8.8.4.4"]);
    }

    #[test]
    fn test_absent_fields_take_defaults() {
        let request = ConfigurationRequest::parse_line(r#"{"adapterId":"{A}"}"#).unwrap();
        assert!(!request.use_dhcp);
        assert_eq!(request.ip_address, "");
        assert_eq!(request.subnet_mask, DEFAULT_SUBNET_MASK);
        assert!(!request.has_gateway());
        assert!(request.dns_servers().is_empty());
    }

    #[test]
    fn test_pascal_case_accepted() {
        let request =
            ConfigurationRequest::parse_line(r#"{"AdapterId":"{B}","UseDhcp":true}"#).unwrap();
        assert_eq!(request.adapter_id, "{B}");
        assert!(request.use_dhcp);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(ConfigurationRequest::parse_line("not json").is_none());
        assert!(ConfigurationRequest::parse_line("null").is_none());
        assert!(ConfigurationRequest::parse_line("[1,2,3]").is_none());
        assert!(ConfigurationRequest::parse_line(r#"["{A}", true]"#).is_none());
        assert!(ConfigurationRequest::parse_line(r#"["{A}", false, "10.0.0.2"]"#).is_none());
        assert!(ConfigurationRequest::parse_line("\"{A}\"").is_none());
        assert!(ConfigurationRequest::parse_line(r#"{"useDhcp":"yes"}"#).is_none());
        assert!(ConfigurationRequest::parse_line("").is_none());
    }

    #[test]
    fn test_dns_split_discards_empty_segments() {
        let request = ConfigurationRequest::static_ip("{A}", "10.0.0.2", "255.0.0.0")
            .with_dns(" 1.1.1.1 ,, 9.9.9.9 , ");
        assert_eq!(request.dns_servers(), vec!["1.1.1.1", "9.9.9.9"]);
    }

    #[test]
    fn test_blank_gateway() {
        let request = ConfigurationRequest::static_ip("{A}", "10.0.0.2", "255.0.0.0")
            .with_gateway("   ");
        assert!(!request.has_gateway());
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_string(&ConfigurationResponse::success(MSG_DHCP_ENABLED)).unwrap();
        assert_eq!(json, r#"{"success":true,"message":"DHCP Enabled"}"#);

        let json = serde_json::to_string(&ConfigurationResponse::invalid_request()).unwrap();
        assert_eq!(
            json,
            r#"{"success":false,"message":"Invalid request format."}"#
        );
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let json = serde_json::to_value(ConfigurationRequest::dhcp("{A}")).unwrap();
        assert_eq!(json["adapterId"], "{A}");
        assert_eq!(json["useDhcp"], true);
        assert_eq!(json["subnetMask"], DEFAULT_SUBNET_MASK);
    }
}
