//! Integration tests for the IP changer service
//!
//! Drive a real listener over a Unix socket with a recording configurator in
//! place of the OS.

#![cfg(unix)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ipchanger::client::{self, PROBE_TIMEOUT, REQUEST_TIMEOUT};
use ipchanger::config::ListenerConfig;
use ipchanger::{Applier, ConfigurationRequest, ConfigurationResponse, Endpoint, Listener};
use netcfg::{Adapter, Mutation, NetworkConfigurator, ReturnCode};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Default)]
struct RecordingConfigurator {
    adapters: Vec<Adapter>,
    calls: Mutex<Vec<(String, Mutation)>>,
    delay: Duration,
    panic_on: Option<String>,
    active: Mutex<HashMap<String, usize>>,
    max_active_per_adapter: AtomicUsize,
}

impl RecordingConfigurator {
    fn new(ids: &[&str]) -> Self {
        Self {
            adapters: ids
                .iter()
                .enumerate()
                .map(|(i, id)| Adapter::new(*id, i as u32, format!("Adapter {}", i)))
                .collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(String, Mutation)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, id: &str) -> Vec<Mutation> {
        self.calls()
            .into_iter()
            .filter(|(setting_id, _)| setting_id == id)
            .map(|(_, mutation)| mutation)
            .collect()
    }
}

impl NetworkConfigurator for RecordingConfigurator {
    fn list_adapters(&self) -> netcfg::Result<Vec<Adapter>> {
        Ok(self.adapters.clone())
    }

    fn apply(&self, adapter: &Adapter, mutation: &Mutation) -> netcfg::Result<ReturnCode> {
        if self.panic_on.as_deref() == Some(adapter.setting_id.as_str()) {
            panic!("driver fault on {}", adapter.setting_id);
        }

        {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(adapter.setting_id.clone()).or_insert(0);
            *count += 1;
            self.max_active_per_adapter
                .fetch_max(*count, Ordering::SeqCst);
        }

        std::thread::sleep(self.delay);
        self.calls
            .lock()
            .unwrap()
            .push((adapter.setting_id.clone(), mutation.clone()));

        *self
            .active
            .lock()
            .unwrap()
            .get_mut(&adapter.setting_id)
            .unwrap() -= 1;

        Ok(ReturnCode::SUCCESS)
    }
}

struct TestService {
    endpoint: Endpoint,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestService {
    async fn start(configurator: Arc<RecordingConfigurator>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::from_path(dir.path().join("IpChangerPipe.sock"));
        let config = ListenerConfig {
            retry_backoff_ms: 20,
            response_linger_ms: 0,
        };

        let listener = Listener::new(endpoint.clone(), Applier::new(configurator), &config);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(listener.run(shutdown_rx));

        for _ in 0..100 {
            if endpoint.address().exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            endpoint,
            shutdown,
            task,
            _dir: dir,
        }
    }

    async fn send(&self, request: &ConfigurationRequest) -> ConfigurationResponse {
        client::send_request(&self.endpoint, request, REQUEST_TIMEOUT)
            .await
            .unwrap()
    }

    async fn send_raw(&self, payload: &[u8]) -> String {
        let mut stream = UnixStream::connect(self.endpoint.address()).await.unwrap();
        stream.write_all(payload).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("listener did not stop")
            .unwrap();
    }
}

#[tokio::test]
async fn test_static_configuration_end_to_end() {
    let fake = Arc::new(RecordingConfigurator::new(&["{A}", "{B}"]));
    let service = TestService::start(fake.clone()).await;

    let request = ConfigurationRequest::static_ip("{A}", "192.168.1.50", "255.255.255.0")
        .with_gateway("192.168.1.1")
        .with_dns("8.8.8.8,8.8.4.4");
    let response = service.send(&request).await;

    assert_eq!(
        response,
        ConfigurationResponse::success("Static IP configured successfully.")
    );
    let calls = fake.calls_for("{A}");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].method_name(), "EnableStatic");
    assert_eq!(calls[1].method_name(), "SetGateways");
    assert_eq!(
        calls[2],
        Mutation::SetDnsServers {
            servers: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
        }
    );
    assert!(fake.calls_for("{B}").is_empty());

    service.stop().await;
}

#[tokio::test]
async fn test_dhcp_twice() {
    let fake = Arc::new(RecordingConfigurator::new(&["{A}"]));
    let service = TestService::start(fake.clone()).await;

    for _ in 0..2 {
        let response = service.send(&ConfigurationRequest::dhcp("{A}")).await;
        assert_eq!(response, ConfigurationResponse::success("DHCP Enabled"));
    }
    assert_eq!(
        fake.calls_for("{A}"),
        vec![
            Mutation::EnableDhcp,
            Mutation::ClearDnsServers,
            Mutation::EnableDhcp,
            Mutation::ClearDnsServers,
        ]
    );

    service.stop().await;
}

#[tokio::test]
async fn test_unknown_adapter() {
    let fake = Arc::new(RecordingConfigurator::new(&["{A}"]));
    let service = TestService::start(fake.clone()).await;

    let response = service.send(&ConfigurationRequest::dhcp("{missing}")).await;
    assert_eq!(response, ConfigurationResponse::failure("Adapter not found."));
    assert!(fake.calls().is_empty());

    service.stop().await;
}

#[tokio::test]
async fn test_malformed_payload() {
    let fake = Arc::new(RecordingConfigurator::new(&["{A}"]));
    let service = TestService::start(fake.clone()).await;

    let reply = service.send_raw(b"this is not json\n").await;
    assert_eq!(
        reply,
        "{\"success\":false,\"message\":\"Invalid request format.\"}\n"
    );

    // Positional fields are not a request
    let reply = service.send_raw(b"[\"{A}\",true]\n").await;
    assert_eq!(
        reply,
        "{\"success\":false,\"message\":\"Invalid request format.\"}\n"
    );
    assert!(fake.calls().is_empty());

    service.stop().await;
}

#[tokio::test]
async fn test_probe_then_request() {
    let fake = Arc::new(RecordingConfigurator::new(&["{A}"]));
    let service = TestService::start(fake.clone()).await;

    for _ in 0..3 {
        assert!(client::probe(&service.endpoint, PROBE_TIMEOUT).await);
    }

    let response = service.send(&ConfigurationRequest::dhcp("{A}")).await;
    assert!(response.success);

    service.stop().await;
}

#[tokio::test]
async fn test_concurrent_adapters_are_independent() {
    let ids = ["{A}", "{B}", "{C}", "{D}"];
    let mut fake = RecordingConfigurator::new(&ids);
    fake.adapters.push(Adapter::new("{FAULTY}", 99, "Broken"));
    fake.panic_on = Some("{FAULTY}".to_string());
    fake.delay = Duration::from_millis(20);
    let fake = Arc::new(fake);
    let service = Arc::new(TestService::start(fake.clone()).await);

    let mut requests = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let service = Arc::clone(&service);
        let request =
            ConfigurationRequest::static_ip(*id, format!("10.0.0.{}", i + 10), "255.255.255.0");
        requests.push(tokio::spawn(async move { service.send(&request).await }));
    }
    let faulty = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.send(&ConfigurationRequest::dhcp("{FAULTY}")).await })
    };

    for (i, request) in requests.into_iter().enumerate() {
        let response = request.await.unwrap();
        assert!(response.success, "request {} failed: {}", i, response.message);
    }
    let response = faulty.await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message, "Error: driver fault on {FAULTY}");

    for (i, id) in ids.iter().enumerate() {
        assert_eq!(
            fake.calls_for(id),
            vec![Mutation::EnableStatic {
                addresses: vec![format!("10.0.0.{}", i + 10)],
                subnet_masks: vec!["255.255.255.0".to_string()],
            }]
        );
    }

    let service = Arc::try_unwrap(service).ok().expect("service still shared");
    service.stop().await;
}

#[tokio::test]
async fn test_same_adapter_requests_are_serialized() {
    let mut fake = RecordingConfigurator::new(&["{A}"]);
    fake.delay = Duration::from_millis(30);
    let fake = Arc::new(fake);
    let service = Arc::new(TestService::start(fake.clone()).await);

    let mut requests = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        requests.push(tokio::spawn(async move {
            service.send(&ConfigurationRequest::dhcp("{A}")).await
        }));
    }
    for request in requests {
        assert!(request.await.unwrap().success);
    }

    assert_eq!(fake.calls_for("{A}").len(), 8);
    assert_eq!(fake.max_active_per_adapter.load(Ordering::SeqCst), 1);

    let service = Arc::try_unwrap(service).ok().expect("service still shared");
    service.stop().await;
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_request() {
    let mut fake = RecordingConfigurator::new(&["{A}"]);
    fake.delay = Duration::from_millis(200);
    let fake = Arc::new(fake);
    let service = TestService::start(fake.clone()).await;

    let endpoint = service.endpoint.clone();
    let in_flight = tokio::spawn(async move {
        client::send_request(&endpoint, &ConfigurationRequest::dhcp("{A}"), REQUEST_TIMEOUT).await
    });

    // Let the request reach the configurator before stopping
    tokio::time::sleep(Duration::from_millis(100)).await;
    let endpoint = service.endpoint.clone();
    service.stop().await;

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response, ConfigurationResponse::success("DHCP Enabled"));
    assert!(!client::probe(&endpoint, PROBE_TIMEOUT).await);
}

#[tokio::test]
async fn test_shutdown_with_idle_client() {
    let fake = Arc::new(RecordingConfigurator::new(&["{A}"]));
    let service = TestService::start(fake.clone()).await;

    // Connected but never sends a request
    let mut idle = UnixStream::connect(service.endpoint.address()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    service.stop().await;

    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(2), idle.read_to_end(&mut buf))
        .await
        .expect("idle connection was not closed")
        .unwrap();
    assert_eq!(read, 0);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_client_gone_before_response() {
    let mut fake = RecordingConfigurator::new(&["{A}"]);
    fake.delay = Duration::from_millis(20);
    let fake = Arc::new(fake);
    let service = TestService::start(fake.clone()).await;

    {
        let mut stream = UnixStream::connect(service.endpoint.address()).await.unwrap();
        stream
            .write_all(b"{\"adapterId\":\"{A}\",\"useDhcp\":true}\n")
            .await
            .unwrap();
    }

    let response = service.send(&ConfigurationRequest::dhcp("{A}")).await;
    assert_eq!(response, ConfigurationResponse::success("DHCP Enabled"));

    service.stop().await;
}

#[tokio::test]
async fn test_endpoint_failure_is_retried_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    // Parent of the socket path is a regular file, so bind keeps failing
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let endpoint = Endpoint::from_path(blocker.join("IpChangerPipe.sock"));

    let config = ListenerConfig {
        retry_backoff_ms: 10,
        response_linger_ms: 0,
    };
    let fake: Arc<dyn NetworkConfigurator> = Arc::new(RecordingConfigurator::new(&["{A}"]));
    let listener = Listener::new(endpoint, Applier::new(fake), &config);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(listener.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("listener did not stop")
        .unwrap();
}
