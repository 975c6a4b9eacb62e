//! Campaign runner: one full test run per device.
//!
//! Ties the pipeline together: collect at the configured rate, analyze the
//! completed sample set, assemble metadata and persist the result as one
//! JSON record. Each run gets a fresh collector (and so a fresh error log)
//! and a fresh v4 test id.

use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::{AnalysisConfig, AnalysisError, Analyzer};
use crate::client::MeasurementClient;
use crate::collector::{
    CollectError, ErrorPolicy, SamplingCollector, SamplingConfig, SamplingConfigError,
};
use crate::device::DeviceKind;
use crate::fault::{FaultConfig, FaultConfigError, FaultInjector};
use crate::storage::{ResultStore, StorageError, TestMetadata, TestResult};
use crate::util::iso_now;

/// Network location of one device endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl EndpointConfig {
    /// Default endpoint for a device kind: localhost on its fixed port.
    pub fn for_kind(kind: DeviceKind) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: kind.default_port(),
        }
    }

    /// Resolves to a socket address.
    pub fn addr(&self) -> Result<SocketAddr, RunError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| RunError::Endpoint(format!("{}:{}: {}", self.host, self.port, e)))?
            .next()
            .ok_or_else(|| {
                RunError::Endpoint(format!("{}:{} resolved to no address", self.host, self.port))
            })
    }
}

/// Full campaign configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Device kind to endpoint mapping; kinds absent here cannot be run.
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<DeviceKind, EndpointConfig>,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub fault: FaultConfig,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default = "default_save_path")]
    pub save_path: String,
}

fn default_endpoints() -> BTreeMap<DeviceKind, EndpointConfig> {
    DeviceKind::ALL
        .iter()
        .map(|kind| (*kind, EndpointConfig::for_kind(*kind)))
        .collect()
}

fn default_save_path() -> String {
    "results".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            sampling: SamplingConfig::default(),
            analysis: AnalysisConfig::default(),
            fault: FaultConfig::default(),
            error_policy: ErrorPolicy::default(),
            save_path: default_save_path(),
        }
    }
}

/// Error type for a failed campaign run.
#[derive(Debug)]
pub enum RunError {
    /// The device kind has no configured endpoint.
    MissingEndpoint(DeviceKind),
    /// Endpoint resolution failed.
    Endpoint(String),
    /// Invalid sampling configuration.
    Sampling(SamplingConfigError),
    /// Invalid fault configuration.
    Fault(FaultConfigError),
    /// Collection failed.
    Collect(CollectError),
    /// Analysis failed.
    Analysis(AnalysisError),
    /// Persisting the result failed.
    Storage(StorageError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::MissingEndpoint(kind) => {
                write!(f, "no endpoint configured for device kind '{}'", kind)
            }
            RunError::Endpoint(msg) => write!(f, "endpoint error: {}", msg),
            RunError::Sampling(e) => write!(f, "sampling config: {}", e),
            RunError::Fault(e) => write!(f, "fault config: {}", e),
            RunError::Collect(e) => write!(f, "collection failed: {}", e),
            RunError::Analysis(e) => write!(f, "analysis failed: {}", e),
            RunError::Storage(e) => write!(f, "storage failed: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<CollectError> for RunError {
    fn from(e: CollectError) -> Self {
        RunError::Collect(e)
    }
}

impl From<AnalysisError> for RunError {
    fn from(e: AnalysisError) -> Self {
        RunError::Analysis(e)
    }
}

impl From<StorageError> for RunError {
    fn from(e: StorageError) -> Self {
        RunError::Storage(e)
    }
}

/// Runs full test campaigns against configured device endpoints.
pub struct TestRunner {
    config: RunnerConfig,
    store: ResultStore,
}

impl TestRunner {
    /// Creates a runner, validating sampling and fault configuration once.
    pub fn new(config: RunnerConfig) -> Result<Self, RunError> {
        config.sampling.validate().map_err(RunError::Sampling)?;
        config.fault.validate().map_err(RunError::Fault)?;
        let store = ResultStore::new(&config.save_path);
        Ok(Self { config, store })
    }

    /// The store results are persisted to.
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Runs one complete test against a device: collect, analyze, persist.
    pub fn run(&self, kind: DeviceKind) -> Result<TestResult, RunError> {
        let endpoint = self
            .config
            .endpoints
            .get(&kind)
            .ok_or(RunError::MissingEndpoint(kind))?;
        let addr = endpoint.addr()?;
        let test_id = Uuid::new_v4().to_string();

        info!("running test {} against {} at {}", test_id, kind, addr);

        let injector = FaultInjector::new(self.config.fault.clone()).map_err(RunError::Fault)?;
        let mut collector =
            SamplingCollector::new(self.config.sampling.clone(), MeasurementClient::new())
                .map_err(RunError::Sampling)?
                .with_injector(injector)
                .with_policy(self.config.error_policy);

        let measurements = collector.collect(kind, addr, &test_id)?;

        let analyzer = Analyzer::new(self.config.analysis.clone());
        let analysis = analyzer.analyze(&measurements)?;

        let result = TestResult {
            metadata: TestMetadata {
                test_id: test_id.clone(),
                timestamp: iso_now(),
                device_kind: kind,
                test_duration: self.config.sampling.total_duration_seconds,
                sampling_frequency: self.config.sampling.sampling_frequency_hz,
            },
            measurements,
            analysis,
        };

        let path = self.store.save(&result)?;
        info!(
            "test {} finished: {} measurements, {} fault events, saved to {}",
            test_id,
            result.measurements.len(),
            collector.error_count(),
            path.display()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceServer, ammeter_with_seed};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn spawn_endpoint(kind: DeviceKind) -> (SocketAddr, Arc<AtomicBool>, thread::JoinHandle<()>) {
        let device = ammeter_with_seed(kind, 3);
        let server = DeviceServer::bind(device, "127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = server.local_addr();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::spawn(move || {
            server.run(flag).unwrap();
        });
        (addr, running, handle)
    }

    fn runner_config(kind: DeviceKind, addr: SocketAddr, save_path: &std::path::Path) -> RunnerConfig {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            kind,
            EndpointConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
            },
        );
        RunnerConfig {
            endpoints,
            sampling: SamplingConfig {
                sampling_frequency_hz: 50.0,
                measurements_count: 10,
                total_duration_seconds: 0.2,
            },
            save_path: save_path.to_string_lossy().into_owned(),
            ..RunnerConfig::default()
        }
    }

    #[test]
    fn run_collects_analyzes_and_persists() {
        let (addr, running, handle) = spawn_endpoint(DeviceKind::Greenlee);
        let dir = tempfile::tempdir().unwrap();

        let runner =
            TestRunner::new(runner_config(DeviceKind::Greenlee, addr, dir.path())).unwrap();
        let result = runner.run(DeviceKind::Greenlee).unwrap();

        assert_eq!(result.measurements.len(), 10);
        assert_eq!(result.metadata.device_kind, DeviceKind::Greenlee);
        assert!(result.analysis.mean.is_some());
        assert!(
            result
                .measurements
                .iter()
                .all(|m| m.test_id == result.metadata.test_id)
        );

        // Persisted copy matches the returned result.
        let loaded = runner.store().load(&result.metadata.test_id).unwrap();
        assert_eq!(loaded, result);

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn unconfigured_kind_is_a_missing_endpoint() {
        let (addr, running, handle) = spawn_endpoint(DeviceKind::Greenlee);
        let dir = tempfile::tempdir().unwrap();

        let runner =
            TestRunner::new(runner_config(DeviceKind::Greenlee, addr, dir.path())).unwrap();
        let err = runner.run(DeviceKind::Entes).unwrap_err();
        assert!(matches!(err, RunError::MissingEndpoint(DeviceKind::Entes)));

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn fresh_test_ids_per_run() {
        let (addr, running, handle) = spawn_endpoint(DeviceKind::Circutor);
        let dir = tempfile::tempdir().unwrap();

        let runner =
            TestRunner::new(runner_config(DeviceKind::Circutor, addr, dir.path())).unwrap();
        let first = runner.run(DeviceKind::Circutor).unwrap();
        let second = runner.run(DeviceKind::Circutor).unwrap();
        assert_ne!(first.metadata.test_id, second.metadata.test_id);

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = RunnerConfig {
            sampling: SamplingConfig {
                sampling_frequency_hz: -1.0,
                ..SamplingConfig::default()
            },
            ..RunnerConfig::default()
        };
        assert!(matches!(
            TestRunner::new(config),
            Err(RunError::Sampling(_))
        ));
    }
}
