//! The radio link
//!
//! [`RadioLink`] owns at most one open connection. Every command, including
//! the background poller's, runs while holding the connection lock, so only
//! one exchange is ever on the wire.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use cat_protocol::{resolve_mode, CatOperation, CwHandling, RadioDatabase, RadioModel};
use cat_serial::{apply_control_lines, PortOpener, PortSettings, SerialOpener};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::connection::Connection;
use crate::error::LinkError;
use crate::events::LinkEvent;

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 64;

type Slot<O> = Option<Connection<<O as PortOpener>::Transport>>;

/// Handle to a radio link
///
/// Cloning is cheap; clones share the same connection.
pub struct RadioLink<O: PortOpener> {
    inner: Arc<Inner<O>>,
}

struct Inner<O: PortOpener> {
    opener: O,
    config: LinkConfig,
    connection: Mutex<Slot<O>>,
    poller: StdMutex<Option<Poller>>,
    events: broadcast::Sender<LinkEvent>,
}

struct Poller {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl<O: PortOpener> Clone for RadioLink<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl RadioLink<SerialOpener> {
    /// Create a link that talks to real serial ports
    pub fn new(config: LinkConfig) -> Self {
        Self::with_opener(SerialOpener, config)
    }
}

impl<O: PortOpener> RadioLink<O> {
    /// Create a link that opens ports through `opener`
    pub fn with_opener(opener: O, config: LinkConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                opener,
                config,
                connection: Mutex::new(None),
                poller: StdMutex::new(None),
                events,
            }),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// Subscribe to link events
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Connect to `model_name` on `port` and return the frequency it reports
    ///
    /// Uses `baud` when given, else the model's default rate. An existing
    /// connection is closed first. The radio must answer a frequency query
    /// with a non-zero value, otherwise the port is closed again and
    /// [`LinkError::NoResponse`] is returned.
    pub async fn connect(
        &self,
        port: &str,
        model_name: &str,
        baud: Option<u32>,
    ) -> Result<u64, LinkError> {
        let model = RadioDatabase::by_name(model_name)
            .ok_or_else(|| LinkError::UnsupportedModel(model_name.to_string()))?;
        let port = port.trim();
        if port.is_empty() {
            return Err(LinkError::MissingPort);
        }

        self.stop_polling();
        let mut slot = self.inner.connection.lock().await;
        if let Some(old) = slot.take() {
            info!("Closing {} on {} before reconnecting", old.model, old.port);
            drop(old);
            self.emit(LinkEvent::ConnectionChanged(false));
        }

        let config = &self.inner.config;
        let baud = baud.unwrap_or(model.default_baud);
        info!("Connecting to {} on {} at {} baud", model, port, baud);

        let mut transport = self
            .inner
            .opener
            .open(port, &PortSettings::new(baud, config.read_timeout))
            .map_err(|e| LinkError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        apply_control_lines(&mut transport, model)?;
        tokio::time::sleep(config.settle).await;

        let mut conn = Connection::new(transport, model, port, baud, self.inner.events.clone());
        let probe = conn
            .read_frequency(model.protocol_for(CatOperation::GetFrequency), config)
            .await;

        let hz = match probe {
            Ok(hz) if hz > 0 => hz,
            outcome => {
                let reason = match outcome {
                    Ok(_) => "radio reported 0 Hz".to_string(),
                    Err(e) => e.to_string(),
                };
                warn!("{} did not answer on {}: {}", model, port, reason);
                return Err(LinkError::NoResponse {
                    model: model.name.to_string(),
                    port: port.to_string(),
                    baud,
                    reason,
                });
            }
        };

        conn.frequency_hz = Some(hz);
        *slot = Some(conn);
        info!("Connected to {} on {} ({} Hz)", model, port, hz);
        self.emit(LinkEvent::ConnectionChanged(true));
        Ok(hz)
    }

    /// Close the connection
    ///
    /// Safe to call at any time. Waits for an in-flight command to finish
    /// or time out before the port is closed.
    pub async fn disconnect(&self) {
        self.stop_polling();
        let mut slot = self.inner.connection.lock().await;
        if let Some(conn) = slot.take() {
            info!("Disconnected from {} on {}", conn.model, conn.port);
        }
        self.emit(LinkEvent::ConnectionChanged(false));
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.connection.lock().await.is_some()
    }

    /// Last frequency read from or written to the radio
    pub async fn current_frequency(&self) -> Option<u64> {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .and_then(|c| c.frequency_hz)
    }

    /// Last mode read from or written to the radio
    pub async fn current_mode(&self) -> Option<String> {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .and_then(|c| c.mode.clone())
    }

    pub async fn connected_model(&self) -> Option<&'static RadioModel> {
        self.inner.connection.lock().await.as_ref().map(|c| c.model)
    }

    /// Port name and baud rate of the open connection
    pub async fn connected_port(&self) -> Option<(String, u32)> {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .map(|c| (c.port.clone(), c.baud))
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    pub async fn get_frequency(&self) -> Result<u64, LinkError> {
        let mut slot = self.inner.connection.lock().await;
        let conn = slot.as_mut().ok_or(LinkError::NotConnected)?;
        let result = conn.get_frequency(&self.inner.config).await;
        self.record_outcome(&mut slot, CatOperation::GetFrequency, result)
    }

    /// Tune the radio to `hz`
    ///
    /// ASCII-protocol radios are read back and must land within 100 Hz.
    pub async fn set_frequency(&self, hz: u64) -> Result<(), LinkError> {
        let mut slot = self.inner.connection.lock().await;
        let conn = slot.as_mut().ok_or(LinkError::NotConnected)?;
        let result = conn.set_frequency(hz, &self.inner.config).await;
        self.record_outcome(&mut slot, CatOperation::SetFrequency, result)
    }

    pub async fn get_mode(&self) -> Result<String, LinkError> {
        let mut slot = self.inner.connection.lock().await;
        let conn = slot.as_mut().ok_or(LinkError::NotConnected)?;
        let result = conn.get_mode(&self.inner.config).await;
        self.record_outcome(&mut slot, CatOperation::GetMode, result)
    }

    /// Set an operator-facing mode and return the mode name sent to the radio
    ///
    /// `SSB` and the digital modes are resolved against the current
    /// frequency first (see [`resolve_mode`]); `CW` follows
    /// [`LinkConfig::cw_handling`].
    pub async fn set_mode(&self, mode: &str) -> Result<String, LinkError> {
        let config = &self.inner.config;
        let mut slot = self.inner.connection.lock().await;
        if slot.is_none() {
            return Err(LinkError::NotConnected);
        }

        let hz = self.known_frequency(&mut slot).await;
        // The live read may have used up the last allowed failure
        let conn = slot.as_mut().ok_or(LinkError::NotConnected)?;
        let protocol = conn.model.protocol_for(CatOperation::SetMode);
        let resolved = resolve_mode(mode, hz, protocol, config.cw_handling);

        let result = conn.set_mode(&resolved, config).await;
        self.record_outcome(&mut slot, CatOperation::SetMode, result)?;
        Ok(resolved)
    }

    /// Resolve `mode` for the connected radio without sending anything
    ///
    /// Returns `mode` unchanged when no radio is connected.
    pub async fn resolve_mode(&self, mode: &str, cw: CwHandling) -> String {
        let mut slot = self.inner.connection.lock().await;
        let Some(model) = slot.as_ref().map(|c| c.model) else {
            return mode.to_string();
        };

        let hz = self.known_frequency(&mut slot).await;
        resolve_mode(mode, hz, model.protocol_for(CatOperation::SetMode), cw)
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    /// Poll frequency and mode every `interval` (the configured interval
    /// when `None`), replacing any running poller
    ///
    /// Changes are reported as [`LinkEvent`]s. The poller ends on
    /// [`stop_polling`](Self::stop_polling), on disconnect, or once it finds
    /// the link closed. Must be called from within a tokio runtime.
    pub fn start_polling(&self, interval: Option<Duration>) {
        self.stop_polling();

        let every = interval.unwrap_or(self.inner.config.poll_interval);
        let (shutdown, stop) = oneshot::channel();
        let task = tokio::spawn(run_poller(Arc::downgrade(&self.inner), every, stop));
        debug!("Polling every {:?}", every);

        *self.poller() = Some(Poller { shutdown, task });
    }

    pub fn stop_polling(&self) {
        if let Some(poller) = self.poller().take() {
            let _ = poller.shutdown.send(());
            poller.task.abort();
            debug!("Polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller()
            .as_ref()
            .is_some_and(|p| !p.task.is_finished())
    }

    fn poller(&self) -> std::sync::MutexGuard<'_, Option<Poller>> {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One poll cycle; returns `false` once the link is closed
    async fn poll_once(&self) -> bool {
        let mut slot = self.inner.connection.lock().await;
        let Some(conn) = slot.as_mut() else {
            return false;
        };
        let result = conn.get_frequency(&self.inner.config).await;
        let _ = self.record_outcome(&mut slot, CatOperation::GetFrequency, result);

        let Some(conn) = slot.as_mut() else {
            return false;
        };
        let result = conn.get_mode(&self.inner.config).await;
        let _ = self.record_outcome(&mut slot, CatOperation::GetMode, result);

        slot.is_some()
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Cached frequency, else a live read; `None` when neither is available
    ///
    /// A failed live read counts like any other failed exchange.
    async fn known_frequency(&self, slot: &mut Slot<O>) -> Option<u64> {
        let conn = slot.as_mut()?;
        if let Some(hz) = conn.frequency_hz {
            return Some(hz);
        }

        let result = conn.get_frequency(&self.inner.config).await;
        match self.record_outcome(slot, CatOperation::GetFrequency, result) {
            Ok(hz) => Some(hz),
            Err(e) => {
                warn!("Frequency unknown, resolving mode for the upper band: {}", e);
                None
            }
        }
    }

    /// Update the failure counter for a finished command
    ///
    /// Drops the connection once `max_consecutive_failures` exchanges in a
    /// row have failed. A limit of 0 never drops it.
    fn record_outcome<R>(
        &self,
        slot: &mut Slot<O>,
        op: CatOperation,
        result: Result<R, LinkError>,
    ) -> Result<R, LinkError> {
        let Some(conn) = slot.as_mut() else {
            return result;
        };

        match &result {
            Ok(_) => conn.failures = 0,
            Err(e) if e.is_exchange_failure() => {
                conn.failures += 1;
                warn!(
                    "{} failed on {} ({}/{}): {}",
                    op, conn.model, conn.failures, self.inner.config.max_consecutive_failures, e
                );
                let limit = self.inner.config.max_consecutive_failures;
                if limit > 0 && conn.failures >= limit {
                    warn!("Giving up on {} on {}", conn.model, conn.port);
                    *slot = None;
                    self.emit(LinkEvent::ConnectionChanged(false));
                }
            }
            Err(e) => warn!("{} on {}: {}", op, conn.model, e),
        }
        result
    }

    fn emit(&self, event: LinkEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

async fn run_poller<O: PortOpener>(
    weak: Weak<Inner<O>>,
    every: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = weak.upgrade() else { break };
        let link = RadioLink { inner };
        if !link.poll_once().await {
            debug!("Link closed, poller exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::io::DuplexStream;

    /// Connections are installed by hand, so opening always fails
    struct NoPorts;

    impl PortOpener for NoPorts {
        type Transport = DuplexStream;

        fn open(&self, port: &str, _settings: &PortSettings) -> io::Result<DuplexStream> {
            Err(io::Error::new(io::ErrorKind::NotFound, port.to_string()))
        }
    }

    /// A link holding a connection that has never read the frequency
    async fn uncached_link(
        model: &str,
        max_consecutive_failures: u32,
    ) -> (RadioLink<NoPorts>, DuplexStream) {
        let config = LinkConfig {
            read_timeout: Duration::from_millis(50),
            settle: Duration::from_millis(1),
            max_consecutive_failures,
            ..LinkConfig::default()
        };
        let link = RadioLink::with_opener(NoPorts, config);
        let (ours, radio) = tokio::io::duplex(256);
        let model = RadioDatabase::by_name(model).unwrap();
        let conn = Connection::new(ours, model, "mock", model.default_baud, link.inner.events.clone());
        *link.inner.connection.lock().await = Some(conn);
        (link, radio)
    }

    #[tokio::test]
    async fn test_failed_live_read_counts_toward_teardown() {
        let (link, _radio) = uncached_link("Kenwood TS-590", 1).await;
        let mut events = link.subscribe();

        let err = link.set_mode("SSB").await.unwrap_err();

        assert!(matches!(err, LinkError::NotConnected));
        assert!(!link.is_connected().await);
        assert_eq!(events.try_recv().unwrap(), LinkEvent::ConnectionChanged(false));
    }

    #[tokio::test]
    async fn test_resolve_survives_teardown_during_live_read() {
        let (link, _radio) = uncached_link("Kenwood TS-590", 1).await;

        assert_eq!(link.resolve_mode("SSB", CwHandling::PassThrough).await, "USB");
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_zero_limit_never_tears_down() {
        let (link, _radio) = uncached_link("Yaesu FT-891", 0).await;

        for _ in 0..3 {
            assert!(matches!(link.get_frequency().await, Err(LinkError::Timeout(_))));
        }
        assert!(link.is_connected().await);
    }
}
