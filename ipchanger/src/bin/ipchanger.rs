//! Command line client for the IP changer service
//!
//! Runs unprivileged; every change is relayed to the service over its local
//! endpoint.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ipchanger::client::{self, PROBE_TIMEOUT, REQUEST_TIMEOUT};
use ipchanger::dto::DEFAULT_SUBNET_MASK;
use ipchanger::validation::validate_request;
use ipchanger::{ConfigurationRequest, Endpoint};
use netcfg::NetworkConfigurator;

/// Change network adapter settings through the IP changer service.
#[derive(Parser, Debug)]
#[command(name = "ipchanger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Well-known name of the service endpoint
    #[arg(long, global = true, default_value = "IpChangerPipe")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether the service is reachable
    Status,

    /// List IP-enabled adapters and their current settings
    List,

    /// Switch an adapter to DHCP
    Dhcp {
        /// Adapter SettingID (see `list`)
        adapter: String,
    },

    /// Assign a static address to an adapter
    Static {
        /// Adapter SettingID (see `list`)
        adapter: String,

        #[arg(long)]
        ip: String,

        #[arg(long, default_value = DEFAULT_SUBNET_MASK)]
        mask: String,

        #[arg(long)]
        gateway: Option<String>,

        /// Comma-separated DNS servers
        #[arg(long)]
        dns: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let endpoint = Endpoint::from_name(&cli.endpoint);

    match cli.command {
        Commands::Status => status(&endpoint).await,
        Commands::List => list().await,
        Commands::Dhcp { adapter } => {
            apply(&endpoint, ConfigurationRequest::dhcp(adapter)).await
        }
        Commands::Static {
            adapter,
            ip,
            mask,
            gateway,
            dns,
        } => {
            let request = ConfigurationRequest::static_ip(adapter, ip, mask)
                .with_gateway(gateway.unwrap_or_default())
                .with_dns(dns.unwrap_or_default());
            apply(&endpoint, request).await
        }
    }
}

async fn status(endpoint: &Endpoint) -> ExitCode {
    if client::probe(endpoint, PROBE_TIMEOUT).await {
        println!("Service: Connected ({})", endpoint);
        ExitCode::SUCCESS
    } else {
        println!("Service: Disconnected ({})", endpoint);
        ExitCode::FAILURE
    }
}

async fn list() -> ExitCode {
    let adapters = tokio::task::spawn_blocking(|| netcfg::system_configurator().list_adapters()).await;

    let adapters = match adapters {
        Ok(Ok(adapters)) => adapters,
        Ok(Err(e)) => {
            eprintln!("Failed to list adapters: {}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Failed to list adapters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for adapter in &adapters {
        let mode = if adapter.dhcp_enabled { "DHCP" } else { "Static" };
        println!("{} [{}]", adapter.description, mode);
        println!("  SettingID: {}", adapter.setting_id);
        println!("  Address:   {}", adapter.ip_addresses.join(", "));
        println!("  Subnet:    {}", adapter.ip_subnets.join(", "));
        println!("  Gateway:   {}", adapter.default_gateways.join(", "));
        println!("  DNS:       {}", adapter.dns_servers.join(", "));
    }
    ExitCode::SUCCESS
}

async fn apply(endpoint: &Endpoint, request: ConfigurationRequest) -> ExitCode {
    if let Err(message) = validate_request(&request) {
        eprintln!("Validation error: {}", message);
        return ExitCode::FAILURE;
    }

    match client::send_request(endpoint, &request, REQUEST_TIMEOUT).await {
        Ok(response) if response.success => {
            println!("{}", response.message);
            ExitCode::SUCCESS
        }
        Ok(response) => {
            eprintln!("Error: {}", response.message);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Could not connect to service. Is it installed and running?\n{}", e);
            ExitCode::FAILURE
        }
    }
}
