//! In-process connection for the simulator and for fault-injection tests.
//!
//! # Responsibilities
//! - Emulate the handshake, lifetime and write path of a relay connection
//! - Record delivered messages on a channel
//! - Let callers inject faults (failed handshakes, remote closes, rejected writes)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::config::SimulationConfig;
use crate::connection::{
    AtomicStatus, ConnectionError, ConnectionFactory, ConnectionId, ConnectionKind,
    ConnectionStatus, InitSignal, ServiceConnection, ServiceMessage,
};
use crate::endpoint::ServiceEndpoint;

/// How simulated connections behave.
#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// Time spent in the handshake.
    pub handshake: Duration,
    /// Probability that a handshake is refused.
    pub failure_rate: f64,
    /// Lifetime after which the connection drops on its own.
    pub lifetime: Option<Duration>,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            handshake: Duration::from_millis(10),
            failure_rate: 0.0,
            lifetime: None,
        }
    }
}

impl From<&SimulationConfig> for SimBehavior {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            handshake: Duration::from_millis(config.handshake_ms),
            failure_rate: config.failure_rate,
            lifetime: (config.lifetime_secs > 0)
                .then(|| Duration::from_secs(config.lifetime_secs)),
        }
    }
}

/// A message accepted by a simulated connection.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub connection_id: ConnectionId,
    pub message: ServiceMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Closing {
    Stopped,
    Dropped(String),
}

/// Simulated relay connection.
#[derive(Debug)]
pub struct SimulatedConnection {
    id: ConnectionId,
    kind: ConnectionKind,
    endpoint: String,
    accept: bool,
    behavior: SimBehavior,
    status: AtomicStatus,
    init: InitSignal,
    closing: watch::Sender<Option<Closing>>,
    deliveries: mpsc::UnboundedSender<Delivery>,
    reject_writes: AtomicBool,
    status_reads: AtomicUsize,
    write_attempts: AtomicUsize,
    created_at: Instant,
}

impl SimulatedConnection {
    pub fn new(
        kind: ConnectionKind,
        endpoint: &str,
        accept: bool,
        behavior: SimBehavior,
        deliveries: mpsc::UnboundedSender<Delivery>,
    ) -> Self {
        let (closing, _) = watch::channel(None);
        Self {
            id: ConnectionId::new(),
            kind,
            endpoint: endpoint.to_string(),
            accept,
            behavior,
            status: AtomicStatus::new(ConnectionStatus::Connecting),
            init: InitSignal::new(),
            closing,
            deliveries,
            reject_writes: AtomicBool::new(false),
            status_reads: AtomicUsize::new(0),
            write_attempts: AtomicUsize::new(0),
            created_at: Instant::now(),
        }
    }

    /// Drop the connection as if the remote side went away.
    pub fn close(&self, reason: &str) {
        self.closing.send_replace(Some(Closing::Dropped(reason.to_string())));
    }

    /// Overwrite the reported status without touching the lifecycle.
    pub fn force_status(&self, status: ConnectionStatus) {
        self.status.store(status);
    }

    /// Make writes fail with `NotActive` while the status still reads `Connected`.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    /// Number of times `status()` was called.
    pub fn status_reads(&self) -> usize {
        self.status_reads.load(Ordering::Relaxed)
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.status_reads.store(0, Ordering::Relaxed);
        self.write_attempts.store(0, Ordering::Relaxed);
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

async fn closed(rx: &mut watch::Receiver<Option<Closing>>) -> Closing {
    match rx.wait_for(Option::is_some).await {
        Ok(closing) => closing.clone().unwrap_or(Closing::Stopped),
        Err(_) => Closing::Stopped,
    }
}

impl ServiceConnection for SimulatedConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn kind(&self) -> ConnectionKind {
        self.kind
    }

    fn status(&self) -> ConnectionStatus {
        self.status_reads.fetch_add(1, Ordering::Relaxed);
        self.status.load()
    }

    fn init_signal(&self) -> &InitSignal {
        &self.init
    }

    fn start(self: Arc<Self>, _target: Option<String>) -> BoxFuture<'static, Result<(), ConnectionError>> {
        Box::pin(async move {
            let mut closing = self.closing.subscribe();
            self.status.store(ConnectionStatus::Connecting);
            tokio::time::sleep(self.behavior.handshake).await;

            let refused = if !self.accept {
                Some("handshake refused".to_string())
            } else if closing.borrow().is_some() {
                Some("closed during handshake".to_string())
            } else {
                None
            };
            if let Some(reason) = refused {
                self.status.store(ConnectionStatus::Disconnected);
                self.init.notify();
                return Err(ConnectionError::Handshake { id: self.id, reason });
            }

            self.status.store(ConnectionStatus::Connected);
            self.init.notify();
            tracing::debug!(
                endpoint = %self.endpoint,
                connection_id = %self.id,
                kind = %self.kind,
                "Simulated connection established"
            );

            let outcome = match self.behavior.lifetime {
                Some(lifetime) => tokio::select! {
                    _ = tokio::time::sleep(lifetime) => Closing::Dropped("lifetime elapsed".to_string()),
                    outcome = closed(&mut closing) => outcome,
                },
                None => closed(&mut closing).await,
            };
            self.status.store(ConnectionStatus::Disconnected);

            match outcome {
                Closing::Stopped => Ok(()),
                Closing::Dropped(reason) => Err(ConnectionError::Closed { id: self.id, reason }),
            }
        })
    }

    fn write<'a>(&'a self, message: &'a ServiceMessage) -> BoxFuture<'a, Result<(), ConnectionError>> {
        Box::pin(async move {
            self.write_attempts.fetch_add(1, Ordering::Relaxed);
            if self.status.load() != ConnectionStatus::Connected
                || self.reject_writes.load(Ordering::Relaxed)
            {
                return Err(ConnectionError::NotActive(self.id));
            }
            let _ = self.deliveries.send(Delivery {
                connection_id: self.id,
                message: message.clone(),
            });
            Ok(())
        })
    }

    fn stop(&self) {
        self.closing.send_if_modified(|closing| {
            if closing.is_some() {
                false
            } else {
                *closing = Some(Closing::Stopped);
                true
            }
        });
    }
}

/// Factory producing [`SimulatedConnection`]s.
///
/// Keeps every connection it created so tests can reach into the pool.
#[derive(Debug)]
pub struct SimulatedFactory {
    behavior: SimBehavior,
    script: Mutex<VecDeque<bool>>,
    created: Mutex<Vec<Arc<SimulatedConnection>>>,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl SimulatedFactory {
    /// Create a factory and the receiver for delivered messages.
    pub fn new(behavior: SimBehavior) -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (deliveries, rx) = mpsc::unbounded_channel();
        (
            Self {
                behavior,
                script: Mutex::new(VecDeque::new()),
                created: Mutex::new(Vec::new()),
                deliveries,
            },
            rx,
        )
    }

    /// Queue handshake outcomes for the next connections created, in order.
    pub fn script_handshakes(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
    }

    pub fn created(&self) -> Vec<Arc<SimulatedConnection>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Look up a created connection by id.
    pub fn find(&self, id: ConnectionId) -> Option<Arc<SimulatedConnection>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|conn| conn.id == id)
            .cloned()
    }

    fn next_accept(&self) -> bool {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| {
            let rate = self.behavior.failure_rate.clamp(0.0, 1.0);
            !rand::thread_rng().gen_bool(rate)
        })
    }
}

impl ConnectionFactory for SimulatedFactory {
    fn create(&self, kind: ConnectionKind, owner: &ServiceEndpoint) -> Arc<dyn ServiceConnection> {
        let connection = Arc::new(SimulatedConnection::new(
            kind,
            owner.name(),
            self.next_accept(),
            self.behavior.clone(),
            self.deliveries.clone(),
        ));
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(connection.clone());
        connection
    }
}
