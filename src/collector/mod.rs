//! Fixed-rate sampling collector.
//!
//! One collection session runs a producer thread that samples the device
//! endpoint at the configured frequency, and a synchronous consumer (the
//! calling thread) that pulls exactly the configured number of items off a
//! FIFO channel, timestamping each on dequeue.
//!
//! Every item on the channel is a tagged `Result`: a producer-side fault
//! travels to the consumer as data instead of dying with the thread, so a
//! failed sample can never strand the consumer on an empty queue. This is
//! the collector's load-bearing invariant.
//!
//! Pacing has no catch-up: when a request overruns the interval (for
//! example a timed-out exchange), the next tick is not compressed, so true
//! throughput degrades under fault load. That is expected behavior.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{MeasurementClient, ProtocolError};
use crate::device::DeviceKind;
use crate::fault::{FaultInjector, InjectedValue, InjectorStats, SimulatedFault};
use crate::storage::model::Measurement;
use crate::util::unix_now;

/// Cap on the in-memory error log; oldest events are dropped beyond it.
pub const ERROR_LOG_CAPACITY: usize = 1000;

/// Sampling configuration for one collection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub sampling_frequency_hz: f64,
    pub measurements_count: usize,
    pub total_duration_seconds: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sampling_frequency_hz: 10.0,
            measurements_count: 50,
            total_duration_seconds: 5.0,
        }
    }
}

impl SamplingConfig {
    /// Validates frequency and count bounds.
    pub fn validate(&self) -> Result<(), SamplingConfigError> {
        if self.sampling_frequency_hz <= 0.0 || !self.sampling_frequency_hz.is_finite() {
            return Err(SamplingConfigError::InvalidFrequency(
                self.sampling_frequency_hz,
            ));
        }
        if self.measurements_count == 0 {
            return Err(SamplingConfigError::ZeroCount);
        }
        Ok(())
    }

    /// Target interval between sample starts.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sampling_frequency_hz)
    }
}

/// Error type for invalid sampling configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingConfigError {
    InvalidFrequency(f64),
    ZeroCount,
}

impl std::fmt::Display for SamplingConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingConfigError::InvalidFrequency(hz) => {
                write!(f, "sampling frequency {} Hz is not positive", hz)
            }
            SamplingConfigError::ZeroCount => write!(f, "measurements count must be non-zero"),
        }
    }
}

impl std::error::Error for SamplingConfigError {}

/// What to do when a sample fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// First fault ends the session and surfaces to the caller.
    #[default]
    Abort,
    /// Failures are logged; all configured ticks still run.
    Continue,
}

/// One logged fault occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub device_kind: DeviceKind,
    pub fault_kind: &'static str,
    pub message: String,
    pub timestamp: f64,
}

/// Error type for a failed sample or session.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// Real protocol failure from the measurement client.
    Protocol(ProtocolError),
    /// Deliberately injected fault.
    Fault(SimulatedFault),
    /// Non-numeric or absent value surfacing after fault injection.
    Validation(String),
    /// The session's cancel flag was raised between samples.
    Cancelled,
}

impl CollectError {
    /// Stable lowercase name for error-event logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CollectError::Protocol(e) => e.kind_name(),
            CollectError::Fault(f) => f.kind_name(),
            CollectError::Validation(_) => "validation",
            CollectError::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Protocol(e) => write!(f, "{}", e),
            CollectError::Fault(e) => write!(f, "{}", e),
            CollectError::Validation(msg) => write!(f, "validation failed: {}", msg),
            CollectError::Cancelled => write!(f, "collection cancelled"),
        }
    }
}

impl std::error::Error for CollectError {}

/// Concurrent fixed-rate sampling collector.
///
/// The error log lives for the lifetime of the collector and is cleared
/// only by recreating it; one runner session uses one collector.
pub struct SamplingCollector {
    config: SamplingConfig,
    client: MeasurementClient,
    injector: Option<FaultInjector>,
    policy: ErrorPolicy,
    cancel_flag: Option<Arc<AtomicBool>>,
    error_log: VecDeque<ErrorEvent>,
}

impl SamplingCollector {
    /// Creates a collector, validating the sampling configuration once.
    pub fn new(
        config: SamplingConfig,
        client: MeasurementClient,
    ) -> Result<Self, SamplingConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            injector: None,
            policy: ErrorPolicy::default(),
            cancel_flag: None,
            error_log: VecDeque::new(),
        })
    }

    /// Attaches a fault injector wrapping every measurement.
    pub fn with_injector(mut self, injector: FaultInjector) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Sets the on-fault policy. Default: abort.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches a cancellation flag, observed between samples.
    ///
    /// Raising the flag ends the session before the next sample; the
    /// session then returns `CollectError::Cancelled`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Logged fault events, oldest first.
    pub fn error_log(&self) -> impl Iterator<Item = &ErrorEvent> {
        self.error_log.iter()
    }

    /// Number of logged fault events.
    pub fn error_count(&self) -> usize {
        self.error_log.len()
    }

    /// Injection statistics, when an injector is attached.
    pub fn injector_stats(&self) -> Option<InjectorStats> {
        self.injector.as_ref().map(|i| i.stats())
    }

    /// Runs one collection session against a device endpoint.
    ///
    /// The producer loops `measurements_count` times, sampling and then
    /// sleeping out the remainder of the interval. The consumer stamps
    /// each successful sample with its dequeue-time Unix timestamp and the
    /// test id; ordering follows production order (FIFO channel).
    ///
    /// Under `ErrorPolicy::Abort` the first fault ends the session and is
    /// returned; under `Continue` faults are logged and the remaining
    /// ticks still run, so the returned list may be shorter than the
    /// configured count.
    pub fn collect(
        &mut self,
        kind: DeviceKind,
        addr: SocketAddr,
        test_id: &str,
    ) -> Result<Vec<Measurement>, CollectError> {
        let interval = self.config.interval();
        let count = self.config.measurements_count;
        let policy = self.policy;

        info!(
            "collecting {} samples from {} at {:.1} Hz (policy: {:?})",
            count, kind, self.config.sampling_frequency_hz, policy
        );

        let client = &self.client;
        let mut injector = self.injector.as_mut();
        let error_log = &mut self.error_log;
        let cancel_flag = self.cancel_flag.clone();
        let producer_cancel = cancel_flag.clone();

        let (tx, rx) = mpsc::channel::<Result<f64, CollectError>>();

        let mut measurements: Vec<Measurement> = Vec::with_capacity(count);
        let mut first_error: Option<CollectError> = None;
        let mut received = 0usize;

        thread::scope(|s| {
            let producer = s.spawn(move || {
                for seq in 0..count {
                    if let Some(ref flag) = producer_cancel
                        && flag.load(Ordering::SeqCst)
                    {
                        debug!("producer stopping: cancelled before sample {}", seq);
                        break;
                    }
                    let started = Instant::now();
                    let outcome = sample_once(client, injector.as_deref_mut(), kind, addr);
                    let failed = outcome.is_err();
                    if tx.send(outcome).is_err() {
                        // Receiver hung up (abort path); stop sampling.
                        debug!("producer stopping: consumer gone after sample {}", seq);
                        break;
                    }
                    if failed && policy == ErrorPolicy::Abort {
                        break;
                    }
                    let elapsed = started.elapsed();
                    if seq + 1 < count && elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
            });

            // Sampling phase: pull exactly `count` items, or stop at the
            // first fault under the abort policy.
            for _ in 0..count {
                match rx.recv() {
                    Ok(Ok(value)) => {
                        received += 1;
                        measurements.push(Measurement {
                            timestamp: unix_now(),
                            value,
                            test_id: test_id.to_string(),
                        });
                    }
                    Ok(Err(fault)) => {
                        received += 1;
                        push_error_event(error_log, kind, &fault);
                        if policy == ErrorPolicy::Abort {
                            first_error = Some(fault);
                            break;
                        }
                    }
                    Err(_) => {
                        // Producer closed the channel early; nothing more
                        // will arrive.
                        break;
                    }
                }
            }

            // Draining phase: wait for the producer before returning.
            debug!("collection draining, waiting for producer");
            drop(rx);
            let _ = producer.join();
        });

        // A cancelled producer stops short; a session that already
        // delivered every tick is complete regardless of the flag.
        if first_error.is_none()
            && received < count
            && let Some(flag) = cancel_flag
            && flag.load(Ordering::SeqCst)
        {
            first_error = Some(CollectError::Cancelled);
        }

        match first_error {
            Some(err) => {
                warn!("collection from {} aborted: {}", kind, err);
                Err(err)
            }
            None => {
                info!(
                    "collection from {} done: {} measurements, {} fault events",
                    kind,
                    measurements.len(),
                    self.error_log.len()
                );
                Ok(measurements)
            }
        }
    }
}

/// Fetches one value through the client and the optional fault injector.
fn sample_once(
    client: &MeasurementClient,
    injector: Option<&mut FaultInjector>,
    kind: DeviceKind,
    addr: SocketAddr,
) -> Result<f64, CollectError> {
    let value = client
        .request(kind, addr, kind.command())
        .map_err(CollectError::Protocol)?;

    let Some(injector) = injector else {
        return Ok(value);
    };

    match injector.apply(value).map_err(CollectError::Fault)? {
        InjectedValue::Value(v) => Ok(v),
        InjectedValue::Empty => Err(CollectError::Validation(
            "empty response from fault injector".to_string(),
        )),
        InjectedValue::Corrupt(payload) => Err(CollectError::Validation(format!(
            "non-numeric value from fault injector: {}",
            payload
        ))),
    }
}

/// Appends a fault to the capped error log.
fn push_error_event(log: &mut VecDeque<ErrorEvent>, kind: DeviceKind, fault: &CollectError) {
    warn!("{}: sample failed: {}", kind, fault);
    if log.len() == ERROR_LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(ErrorEvent {
        device_kind: kind,
        fault_kind: fault.kind_name(),
        message: fault.to_string(),
        timestamp: unix_now(),
    });
}
