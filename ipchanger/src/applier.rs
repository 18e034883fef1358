//! Adapter configuration applier
//!
//! Turns one [`ConfigurationRequest`] into an ordered sequence of
//! [`Mutation`]s against a single adapter and reports the outcome. OS
//! failures never escape as errors; they become a failed response.

use std::sync::Arc;

use netcfg::{Adapter, Mutation, NetCfgError, NetworkConfigurator, ReturnCode};
use thiserror::Error;
use tokio::task::JoinError;

use crate::dto::{
    ConfigurationRequest, ConfigurationResponse, MSG_ADAPTER_NOT_FOUND, MSG_DHCP_ENABLED,
    MSG_STATIC_CONFIGURED,
};
use crate::locks::AdapterLocks;

/// Why a request could not be applied
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Adapter not found.")]
    AdapterNotFound,

    /// Adapter enumeration failed before any change was made
    #[error("{0}")]
    Enumerate(#[source] NetCfgError),

    /// The OS call itself failed
    #[error("{step} failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: NetCfgError,
    },

    /// The OS call ran but rejected the change
    #[error("{step} failed: return code {code}")]
    Rejected {
        step: &'static str,
        code: ReturnCode,
    },
}

/// Mutations implementing `request`, in the order they must run
pub fn plan(request: &ConfigurationRequest) -> Vec<Mutation> {
    if request.use_dhcp {
        return vec![Mutation::EnableDhcp, Mutation::ClearDnsServers];
    }

    let mut steps = vec![Mutation::EnableStatic {
        addresses: vec![request.ip_address.clone()],
        subnet_masks: vec![request.subnet_mask.clone()],
    }];

    if request.has_gateway() {
        steps.push(Mutation::SetGateways {
            gateways: vec![request.gateway.clone()],
            cost_metrics: vec![netcfg::DEFAULT_GATEWAY_COST_METRIC],
        });
    }

    let servers = request.dns_servers();
    if !servers.is_empty() {
        steps.push(Mutation::SetDnsServers { servers });
    }

    steps
}

fn find_adapter(
    configurator: &dyn NetworkConfigurator,
    adapter_id: &str,
) -> Result<Adapter, ApplyError> {
    configurator
        .list_adapters()
        .map_err(ApplyError::Enumerate)?
        .into_iter()
        .find(|adapter| adapter.setting_id == adapter_id)
        .ok_or(ApplyError::AdapterNotFound)
}

/// Apply `request` synchronously. Stops at the first failing step; steps
/// that already succeeded are not rolled back.
pub fn try_apply(
    configurator: &dyn NetworkConfigurator,
    request: &ConfigurationRequest,
) -> Result<&'static str, ApplyError> {
    let adapter = find_adapter(configurator, &request.adapter_id)?;

    for mutation in plan(request) {
        let step = mutation.step();
        let code = configurator
            .apply(&adapter, &mutation)
            .map_err(|source| ApplyError::StepFailed { step, source })?;

        if !code.is_success() {
            return Err(ApplyError::Rejected { step, code });
        }
        if code.reboot_required() {
            tracing::warn!(adapter = %adapter.setting_id, step, "Change requires a reboot");
        }
        tracing::debug!(adapter = %adapter.setting_id, %mutation, "Step applied");
    }

    Ok(if request.use_dhcp {
        MSG_DHCP_ENABLED
    } else {
        MSG_STATIC_CONFIGURED
    })
}

/// Apply `request` and fold the outcome into a response
pub fn apply_request(
    configurator: &dyn NetworkConfigurator,
    request: &ConfigurationRequest,
) -> ConfigurationResponse {
    match try_apply(configurator, request) {
        Ok(message) => {
            tracing::info!(adapter = %request.adapter_id, outcome = message, "Configuration applied");
            ConfigurationResponse::success(message)
        }
        Err(e) => {
            tracing::warn!(adapter = %request.adapter_id, error = %e, "Configuration failed");
            ConfigurationResponse::failure(e.to_string())
        }
    }
}

/// Shared applier used by every connection handler
#[derive(Clone)]
pub struct Applier {
    configurator: Arc<dyn NetworkConfigurator>,
    locks: AdapterLocks,
}

impl Applier {
    pub fn new(configurator: Arc<dyn NetworkConfigurator>) -> Self {
        Self {
            configurator,
            locks: AdapterLocks::new(),
        }
    }

    pub fn locks(&self) -> &AdapterLocks {
        &self.locks
    }

    /// Apply `request` on the blocking pool while holding its adapter's lock.
    ///
    /// Returns `Err` only if the blocking task panicked or was cancelled.
    pub async fn apply(
        &self,
        request: ConfigurationRequest,
    ) -> Result<ConfigurationResponse, JoinError> {
        let lease = self.locks.acquire(&request.adapter_id).await;
        let configurator = Arc::clone(&self.configurator);

        tracing::debug!(adapter = %lease.adapter_id(), "Adapter lock acquired");

        tokio::task::spawn_blocking(move || {
            let _lease = lease;
            apply_request(configurator.as_ref(), &request)
        })
        .await
    }
}
