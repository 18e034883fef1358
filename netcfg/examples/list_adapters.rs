//! Example: List IP-enabled network adapters with their current configuration

#[cfg(windows)]
use netcfg::{system_configurator, NetworkConfigurator};

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configurator = system_configurator();
    let adapters = configurator.list_adapters()?;

    println!("=== Network Adapters ===");
    if adapters.is_empty() {
        println!("  No IP-enabled adapters found");
    }

    for adapter in &adapters {
        let mode = if adapter.dhcp_enabled { "DHCP" } else { "Static" };
        println!("{} [{}]", adapter.description, mode);
        println!("  SettingID: {}", adapter.setting_id);
        println!("  Address:   {}", adapter.ip_addresses.join(", "));
        println!("  Subnet:    {}", adapter.ip_subnets.join(", "));
        println!("  Gateway:   {}", adapter.default_gateways.join(", "));
        println!("  DNS:       {}", adapter.dns_servers.join(", "));
        println!();
    }

    Ok(())
}

#[cfg(not(windows))]
fn main() {
    eprintln!("This example only runs on Windows.");
}
