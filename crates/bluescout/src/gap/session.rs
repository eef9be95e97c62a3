//! BLE advertisement discovery
//!
//! This module drives a full discovery run: it puts the controller into
//! passive scan mode, polls for advertising reports, decodes each one
//! and hands the results to the caller as an accumulated map and,
//! optionally, through a per-advertisement callback.

use crate::eir;
use crate::error::{Error, Result};
use crate::gap::types::{Advertisement, BdAddr};
use crate::hci::constants::HCI_MAX_EVENT_SIZE;
use crate::hci::packet::LeAdvertisingReport;
use crate::hci::socket::device_index;
use crate::hci::{Controller, HciSocket};
use crate::scan::{ScanConfig, ScanSession};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Adapter used when no device name is given
pub const DEFAULT_DEVICE: &str = "hci0";

/// Tuning knobs for a discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Controller-level scan settings
    pub scan: ScanConfig,
    /// Length of one readiness wait; the deadline and the cancellation
    /// token are checked between waits, so this bounds their latency
    pub wait_slice: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            wait_slice: Duration::from_millis(100),
        }
    }
}

/// Cooperative cancellation flag for unbounded discovery runs.
///
/// Cancelling takes effect between wait slices, so the worst-case
/// latency is one slice.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Discovery lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Polling,
    Stopping,
    Aborted,
}

/// Sink invoked synchronously for every decoded advertisement.
///
/// It runs in-line with the polling loop, so a slow callback delays the
/// next poll and the deadline check.
pub type DiscoveryCallback = Box<dyn FnMut(&BdAddr, &Advertisement) + Send>;

/// Strategy that turns one raw controller event into an advertisement.
///
/// The default [`EirReportDecoder`] understands standard LE advertising
/// reports; sessions accept a replacement for controllers with vendor
/// event formats.
pub trait ReportDecoder {
    /// Decode one raw event buffer, `None` when it holds no
    /// advertisement
    fn decode(&mut self, buf: &[u8]) -> Option<Advertisement>;
}

/// Default decoder: advertising-report extraction plus EIR decoding
#[derive(Debug, Clone, Copy, Default)]
pub struct EirReportDecoder;

impl ReportDecoder for EirReportDecoder {
    fn decode(&mut self, buf: &[u8]) -> Option<Advertisement> {
        let report = LeAdvertisingReport::from_raw(buf)?;
        let decoded = eir::decode(&report.data);

        Some(Advertisement {
            address: BdAddr::new(report.address),
            address_type: report.address_type.into(),
            name: decoded.name,
            rssi: report.rssi,
            fields: decoded.fields,
        })
    }
}

/// A discovery session over one exclusively-owned controller.
///
/// The session moves through `Idle -> Starting -> Polling -> Stopping ->
/// Idle` on a successful run; an unrecoverable error leaves it in
/// `Aborted`.
pub struct DiscoverySession<C, D = EirReportDecoder> {
    device: String,
    scan: ScanSession<C>,
    decoder: D,
    callback: Option<DiscoveryCallback>,
    state: SessionState,
    cancel: CancellationToken,
    wait_slice: Duration,
}

impl DiscoverySession<HciSocket> {
    /// Opens a session on the default adapter
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_DEVICE)
    }

    /// Opens a session on a named adapter such as `"hci0"`
    pub fn open(device: &str) -> Result<Self> {
        Self::open_with_config(device, DiscoveryConfig::default())
    }

    pub fn open_with_config(device: &str, config: DiscoveryConfig) -> Result<Self> {
        let index = device_index(device)?;
        let socket = HciSocket::open(index)?;
        Ok(Self::with_controller(device, socket, config))
    }
}

impl<C: Controller> DiscoverySession<C> {
    /// Builds a session over an already-open controller
    pub fn with_controller(device: &str, controller: C, config: DiscoveryConfig) -> Self {
        DiscoverySession {
            device: device.to_string(),
            scan: ScanSession::new(controller, config.scan),
            decoder: EirReportDecoder,
            callback: None,
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
            wait_slice: config.wait_slice,
        }
    }
}

impl<C: Controller, D: ReportDecoder> DiscoverySession<C, D> {
    /// Replaces the report decoder, keeping everything else
    pub fn with_decoder<D2: ReportDecoder>(self, decoder: D2) -> DiscoverySession<C, D2> {
        DiscoverySession {
            device: self.device,
            scan: self.scan,
            decoder,
            callback: self.callback,
            state: self.state,
            cancel: self.cancel,
            wait_slice: self.wait_slice,
        }
    }

    /// Registers a per-advertisement sink; `None` clears it
    pub fn set_callback(&mut self, callback: Option<DiscoveryCallback>) {
        self.callback = callback;
    }

    /// Token for stopping an in-flight [`discover`](Self::discover)
    /// from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Runs discovery until the timeout elapses or the session is
    /// cancelled, returning the last advertisement seen per device.
    ///
    /// `None` means no deadline: the loop runs until the cancellation
    /// token fires. A registered callback sees every advertisement as
    /// it arrives, including the repeats the returned map collapses.
    pub fn discover(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<HashMap<BdAddr, Advertisement>> {
        self.cancel.reset();

        self.state = SessionState::Starting;
        debug!("Starting discovery on {}", self.device);
        if let Err(err) = self.start() {
            self.state = SessionState::Aborted;
            return Err(err);
        }

        let mut devices = HashMap::new();
        self.state = SessionState::Polling;

        match self.poll(timeout, &mut devices) {
            Ok(()) => {
                self.state = SessionState::Stopping;
                self.teardown();
                self.state = SessionState::Idle;
                debug!(
                    "Discovery on {} finished with {} device(s)",
                    self.device,
                    devices.len()
                );
                Ok(devices)
            }
            Err(err) => {
                self.state = SessionState::Aborted;
                self.teardown();
                Err(err)
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        self.scan.enable_scan_mode()?;
        self.scan.install_filter()?;
        Ok(())
    }

    fn poll(
        &mut self,
        timeout: Option<Duration>,
        devices: &mut HashMap<BdAddr, Advertisement>,
    ) -> Result<()> {
        let started = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                debug!("Discovery on {} cancelled", self.device);
                return Ok(());
            }
            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    return Ok(());
                }
            }

            // A wait that ends with nothing readable is the normal way
            // to get back to the deadline and cancellation checks
            let readable = self
                .scan
                .wait_readable(self.wait_slice)
                .map_err(Error::Read)?;
            if !readable {
                continue;
            }

            let mut buf = [0u8; HCI_MAX_EVENT_SIZE];
            let len = self.scan.read_event(&mut buf).map_err(Error::Read)?;

            if let Some(advertisement) = self.decoder.decode(&buf[..len]) {
                trace!(
                    "{} rssi {} name {:?}",
                    advertisement.address,
                    advertisement.rssi,
                    advertisement.name
                );
                if let Some(callback) = self.callback.as_mut() {
                    callback(&advertisement.address, &advertisement);
                }
                devices.insert(advertisement.address, advertisement);
            }
        }
    }

    /// Restore the saved filter, then disable scanning. Failures here
    /// are logged and swallowed; the discovery outcome is already
    /// decided by the time teardown runs.
    fn teardown(&mut self) {
        self.scan.restore_filter();
        if self.scan.is_scanning() {
            if let Err(err) = self.scan.disable_scan_mode() {
                warn!("Failed to disable scanning on {}: {}", self.device, err);
            }
        }
    }
}
