//! Bridge engine
//!
//! A [`Bridge`] owns one worker thread that binds the input and output
//! interfaces, then loops: receive a frame, test it against the selector,
//! mangle it, send it. Receives are bounded by the configured timeout, so a
//! stop request is observed within one timeout of being made.

use ferry_capture::{PcapProvider, Transport, TransportProvider};
use ferry_core::{Error, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::stats::{BridgeStats, DropReason, StatsAccumulator};

/// Lifecycle of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Configured, worker not started
    Configured,
    /// Worker is running
    Running,
    /// Stop requested, worker still finishing its current iteration
    Stopping,
    /// Worker has exited
    Stopped,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Configured => "configured",
            BridgeState::Running => "running",
            BridgeState::Stopping => "stopping",
            BridgeState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What the bridge does with one captured frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Send these bytes on the output interface
    Forward(Vec<u8>),
    /// Do not forward
    Drop(DropReason),
}

/// Run one frame through the selector and transform of `config`.
///
/// Forwarding needs both a positive match and a transform: frames are dropped
/// when no selector is configured, when the selector rejects them, when no
/// transform is configured, or when the transform fails.
pub fn process_frame(config: &BridgeConfig, frame: &[u8]) -> Verdict {
    let Some(selector) = config.selector() else {
        return Verdict::Drop(DropReason::NoSelector);
    };
    if !selector.matches(frame) {
        return Verdict::Drop(DropReason::Unmatched);
    }
    let Some(mangle) = config.mangle() else {
        return Verdict::Drop(DropReason::NoMangle);
    };

    match mangle.mangle(frame) {
        Ok(bytes) => Verdict::Forward(bytes),
        Err(e) => {
            warn!(error = %e, len = frame.len(), "Transform failed, frame skipped");
            Verdict::Drop(DropReason::MangleFailed)
        }
    }
}

/// Capture-mangle-forward bridge between two interfaces
pub struct Bridge {
    id: Uuid,
    config: Arc<BridgeConfig>,
    provider: Arc<dyn TransportProvider>,
    state: Arc<RwLock<BridgeState>>,
    stats: StatsAccumulator,
    worker: Option<JoinHandle<Result<()>>>,
}

impl Bridge {
    /// Create a bridge whose interfaces are opened through `provider`
    pub fn new(config: BridgeConfig, provider: Arc<dyn TransportProvider>) -> Self {
        let id = Uuid::now_v7();
        debug!(bridge = %id, ?config, "Bridge configured");
        Self {
            id,
            config: Arc::new(config),
            provider,
            state: Arc::new(RwLock::new(BridgeState::Configured)),
            stats: StatsAccumulator::new(),
            worker: None,
        }
    }

    /// Create a bridge over pcap handles with default capture settings
    pub fn pcap(config: BridgeConfig) -> Self {
        Self::new(config, Arc::new(PcapProvider::default()))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == BridgeState::Running
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats.snapshot()
    }

    /// Spawn the worker. A bridge can only be started once.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != BridgeState::Configured {
                return Err(Error::config(format!("bridge is {}, cannot start", *state)));
            }
            *state = BridgeState::Running;
        }
        // Rates count from start, not from construction
        self.stats = StatsAccumulator::new();

        info!(
            bridge = %self.id,
            input = %self.config.input(),
            output = %self.config.output(),
            "Starting bridge"
        );

        let worker = Worker {
            id: self.id,
            config: Arc::clone(&self.config),
            provider: Arc::clone(&self.provider),
            state: Arc::clone(&self.state),
            stats: self.stats.clone(),
        };

        let spawned = thread::Builder::new()
            .name(format!("ferry-bridge-{}", self.id))
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.write() = BridgeState::Stopped;
                Err(e.into())
            }
        }
    }

    /// Ask the worker to stop. It exits within one receive timeout.
    pub fn stop(&self) {
        let mut state = self.state.write();
        match *state {
            BridgeState::Running => {
                info!(bridge = %self.id, "Stopping bridge");
                *state = BridgeState::Stopping;
            }
            BridgeState::Configured => *state = BridgeState::Stopped,
            BridgeState::Stopping | BridgeState::Stopped => {}
        }
    }

    /// Wait for the worker to exit and return how it ended
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                error!(bridge = %self.id, "Bridge worker panicked");
                *self.state.write() = BridgeState::Stopped;
                Err(Error::transport("bridge worker panicked"))
            }
        }
    }

    /// Stop the worker and wait for it to exit
    pub fn stop_and_join(&mut self) -> Result<()> {
        self.stop();
        self.join()
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Ensure the worker is stopped when dropped
        let _ = self.stop_and_join();
    }
}

struct Worker {
    id: Uuid,
    config: Arc<BridgeConfig>,
    provider: Arc<dyn TransportProvider>,
    state: Arc<RwLock<BridgeState>>,
    stats: StatsAccumulator,
}

impl Worker {
    fn run(self) -> Result<()> {
        let result = self.run_loop();

        *self.state.write() = BridgeState::Stopped;
        match &result {
            Ok(()) => info!(bridge = %self.id, "Bridge worker finished"),
            Err(e) => error!(bridge = %self.id, error = %e, "Bridge worker failed"),
        }
        result
    }

    fn running(&self) -> bool {
        *self.state.read() == BridgeState::Running
    }

    fn run_loop(&self) -> Result<()> {
        let mut input: Option<Box<dyn Transport>> = None;
        let mut output: Option<Box<dyn Transport>> = None;

        while self.running() {
            if input.is_none() || output.is_none() {
                self.bind(&mut input, self.config.input(), true)?;
                self.bind(&mut output, self.config.output(), false)?;
                if input.is_none() || output.is_none() {
                    self.backoff();
                }
                continue;
            }
            let (Some(rx), Some(tx)) = (input.as_mut(), output.as_mut()) else {
                continue;
            };

            let Some(frame) = rx.receive()? else {
                continue;
            };
            self.stats.record_received(frame.len());

            match process_frame(&self.config, frame.data()) {
                Verdict::Forward(bytes) => {
                    self.stats.record_matched();
                    tx.send(&bytes)?;
                    self.stats.record_forwarded(bytes.len());
                    trace!(bridge = %self.id, len = bytes.len(), "Frame forwarded");
                }
                Verdict::Drop(reason) => {
                    self.record_drop(reason, frame.len());
                }
            }
        }
        Ok(())
    }

    fn record_drop(&self, reason: DropReason, len: usize) {
        match reason {
            DropReason::Unmatched => {
                trace!(bridge = %self.id, len, "Frame did not match selector");
            }
            DropReason::NoSelector => {
                debug!(bridge = %self.id, len, "No selector configured, frame dropped");
            }
            DropReason::NoMangle => {
                self.stats.record_matched();
                warn!(bridge = %self.id, len, "Frame matched but no transform is configured");
            }
            DropReason::MangleFailed => self.stats.record_matched(),
        }
        self.stats.record_dropped(reason);
    }

    /// Bind `slot` if it is still empty. Unavailable interfaces leave it
    /// empty for a later retry; other errors end the worker.
    fn bind(&self, slot: &mut Option<Box<dyn Transport>>, interface: &str, is_input: bool) -> Result<()> {
        if slot.is_some() {
            return Ok(());
        }

        let (options, role) = if is_input {
            (self.config.input_options(), "input")
        } else {
            (self.config.output_options(), "output")
        };

        match self.provider.bind(interface, &options) {
            Ok(transport) => {
                info!(
                    bridge = %self.id,
                    interface,
                    role,
                    "Interface bound"
                );
                *slot = Some(transport);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!(
                    bridge = %self.id,
                    interface,
                    role,
                    error = %e,
                    retry_in = ?self.config.retry_backoff(),
                    "Interface unavailable, will retry"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Sleep for the retry backoff, waking early when a stop is requested
    fn backoff(&self) {
        let deadline = Instant::now() + self.config.retry_backoff();
        let slice = self.config.receive_timeout().min(Duration::from_millis(100));
        while self.running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }
}
