//! Client-side request validation
//!
//! A convenience for interactive callers so obvious typos are caught before
//! a round trip. The service never relies on it.

use crate::dto::ConfigurationRequest;
use std::net::Ipv4Addr;

pub const MSG_INVALID_IP: &str = "Invalid IP address format.";
pub const MSG_INVALID_SUBNET: &str = "Invalid subnet mask format.";
pub const MSG_INVALID_GATEWAY: &str = "Invalid gateway address format.";

fn is_ipv4(value: &str) -> bool {
    value.trim().parse::<Ipv4Addr>().is_ok()
}

/// Check the static fields of `request`. DHCP requests always pass.
pub fn validate_request(request: &ConfigurationRequest) -> Result<(), String> {
    if request.use_dhcp {
        return Ok(());
    }

    if !is_ipv4(&request.ip_address) {
        return Err(MSG_INVALID_IP.to_string());
    }

    if !is_ipv4(&request.subnet_mask) {
        return Err(MSG_INVALID_SUBNET.to_string());
    }

    if request.has_gateway() && !is_ipv4(&request.gateway) {
        return Err(MSG_INVALID_GATEWAY.to_string());
    }

    for entry in request.dns.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !is_ipv4(entry) {
            return Err(format!("Invalid DNS server format: {}", entry));
        }
    }

    Ok(())
}
