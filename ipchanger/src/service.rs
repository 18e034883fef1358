//! Windows Service support for the IP changer service
//!
//! This module provides Windows Service functionality using the windows-service crate.

#[cfg(windows)]
pub mod windows_service {
    use std::ffi::OsString;
    use std::sync::mpsc;
    use std::sync::OnceLock;
    use std::time::Duration;

    use windows_service::{
        define_windows_service,
        service::{
            ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
            ServiceType,
        },
        service_control_handler::{self, ServiceControlHandlerResult},
        service_dispatcher,
    };

    use crate::config::{get_config_path, Config};

    const SERVICE_TYPE: ServiceType = ServiceType::OWN_PROCESS;

    // The dispatcher callback takes no context, so the name is stashed here
    static SERVICE_NAME: OnceLock<String> = OnceLock::new();

    /// Run the application under the service control manager
    pub fn run_as_service(name: &str) -> Result<(), windows_service::Error> {
        let name = SERVICE_NAME.get_or_init(|| name.to_string());
        service_dispatcher::start(name, ffi_service_main)
    }

    define_windows_service!(ffi_service_main, service_main);

    fn service_main(_arguments: Vec<OsString>) {
        if let Err(e) = run_service() {
            tracing::error!("Service error: {}", e);
        }
    }

    fn run_service() -> Result<(), Box<dyn std::error::Error>> {
        let config_path = get_config_path();
        let config = Config::load_or_default(&config_path);
        let name = SERVICE_NAME
            .get()
            .cloned()
            .unwrap_or_else(|| config.service.name.clone());

        // Create a channel to receive stop events
        let (stop_tx, stop_rx) = mpsc::channel();

        let event_handler = move |control_event| -> ServiceControlHandlerResult {
            match control_event {
                ServiceControl::Stop | ServiceControl::Shutdown => {
                    let _ = stop_tx.send(());
                    ServiceControlHandlerResult::NoError
                }
                ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
                _ => ServiceControlHandlerResult::NotImplemented,
            }
        };

        let status_handle = service_control_handler::register(&name, event_handler)?;

        status_handle.set_service_status(ServiceStatus {
            service_type: SERVICE_TYPE,
            current_state: ServiceState::Running,
            controls_accepted: ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN,
            exit_code: ServiceExitCode::Win32(0),
            checkpoint: 0,
            wait_hint: Duration::default(),
            process_id: None,
        })?;

        crate::init_tracing(&config.logging.level);
        tracing::info!("Service {} starting with config from: {:?}", name, config_path);

        let runtime = tokio::runtime::Runtime::new()?;

        runtime.block_on(async {
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            let service = tokio::spawn({
                let config = config.clone();
                async move { crate::run(&config, shutdown_rx).await }
            });

            // Wait for stop signal
            let _ = tokio::task::spawn_blocking(move || stop_rx.recv()).await;
            tracing::info!("Received stop signal");

            let _ = shutdown_tx.send(true);
            if let Err(e) = service.await {
                tracing::error!("Listener task failed: {}", e);
            }
        });

        status_handle.set_service_status(ServiceStatus {
            service_type: SERVICE_TYPE,
            current_state: ServiceState::Stopped,
            controls_accepted: ServiceControlAccept::empty(),
            exit_code: ServiceExitCode::Win32(0),
            checkpoint: 0,
            wait_hint: Duration::default(),
            process_id: None,
        })?;

        Ok(())
    }
}

#[cfg(not(windows))]
pub mod windows_service {
    use crate::error::ServiceError;

    /// Placeholder for non-Windows platforms
    pub fn run_as_service(_name: &str) -> Result<(), ServiceError> {
        Err(ServiceError::ServiceModeUnsupported)
    }
}
