//! In-memory transport
//!
//! A [`MemoryNetwork`] is a set of named software interfaces. Frames injected
//! into an interface are delivered to whoever bound it; frames sent through a
//! bound handle are recorded on the interface for inspection. It needs no
//! privileges, which makes it the transport of choice for exercising the
//! bridge engine.

use ferry_core::{Error, Frame, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::transport::{BindOptions, Transport, TransportProvider};

#[derive(Debug, Default)]
struct Link {
    inbound: Mutex<VecDeque<Vec<u8>>>,
    arrived: Condvar,
    sent: Mutex<Vec<Vec<u8>>>,
    departed: Condvar,
    available: AtomicBool,
    failing: AtomicBool,
    binds: AtomicU64,
}

/// A set of named in-memory interfaces; cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    links: Arc<Mutex<HashMap<String, Arc<Link>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or re-enable) an interface that can be bound
    pub fn add_interface(&self, name: &str) {
        self.link(name).available.store(true, Ordering::SeqCst);
    }

    /// Mark an interface as unbindable; existing handles keep working
    pub fn remove_interface(&self, name: &str) {
        self.link(name).available.store(false, Ordering::SeqCst);
    }

    /// Make every send through `name` fail
    pub fn fail_sends(&self, name: &str, failing: bool) {
        self.link(name).failing.store(failing, Ordering::SeqCst);
    }

    /// Queue a frame to be received on `name`
    pub fn inject(&self, name: &str, data: impl Into<Vec<u8>>) {
        let link = self.link(name);
        link.inbound.lock().push_back(data.into());
        link.arrived.notify_one();
    }

    /// Frames sent through `name` so far
    pub fn sent(&self, name: &str) -> Vec<Vec<u8>> {
        self.link(name).sent.lock().clone()
    }

    /// Frames injected into `name` and not yet received
    pub fn pending(&self, name: &str) -> usize {
        self.link(name).inbound.lock().len()
    }

    /// Number of bind attempts made on `name`, successful or not
    pub fn bind_attempts(&self, name: &str) -> u64 {
        self.link(name).binds.load(Ordering::SeqCst)
    }

    /// Block until at least `count` frames have been sent through `name`,
    /// or `timeout` passes. Returns whether the count was reached.
    pub fn wait_sent(&self, name: &str, count: usize, timeout: Duration) -> bool {
        let link = self.link(name);
        let deadline = Instant::now() + timeout;
        let mut sent = link.sent.lock();
        while sent.len() < count {
            if link.departed.wait_until(&mut sent, deadline).timed_out() {
                return sent.len() >= count;
            }
        }
        true
    }

    /// Block until every frame injected into `name` has been received
    pub fn wait_drained(&self, name: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending(name) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn link(&self, name: &str) -> Arc<Link> {
        Arc::clone(self.links.lock().entry(name.to_string()).or_default())
    }
}

impl TransportProvider for MemoryNetwork {
    fn bind(&self, interface: &str, options: &BindOptions) -> Result<Box<dyn Transport>> {
        let link = self.link(interface);
        link.binds.fetch_add(1, Ordering::SeqCst);

        if !link.available.load(Ordering::SeqCst) {
            return Err(Error::unavailable(interface, "no such interface"));
        }
        if let Some(filter) = options.filter.as_deref() {
            debug!(interface, filter, "Capture filters are not applied in memory");
        }

        Ok(Box::new(MemoryTransport {
            interface: interface.to_string(),
            link,
            read_timeout: options.read_timeout,
        }))
    }
}

/// Handle on one [`MemoryNetwork`] interface
#[derive(Debug)]
pub struct MemoryTransport {
    interface: String,
    link: Arc<Link>,
    read_timeout: Duration,
}

impl Transport for MemoryTransport {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        let deadline = Instant::now() + self.read_timeout;
        let mut inbound = self.link.inbound.lock();
        loop {
            if let Some(data) = inbound.pop_front() {
                trace!(interface = %self.interface, len = data.len(), "Frame received");
                return Ok(Some(Frame::new(self.interface.as_str(), data)));
            }
            if self.link.arrived.wait_until(&mut inbound, deadline).timed_out() {
                return Ok(inbound.pop_front().map(|data| Frame::new(self.interface.as_str(), data)));
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.link.failing.load(Ordering::SeqCst) {
            return Err(Error::transport(format!("send on '{}' failed: link down", self.interface)));
        }
        self.link.sent.lock().push(data.to_vec());
        self.link.departed.notify_all();
        Ok(())
    }
}
