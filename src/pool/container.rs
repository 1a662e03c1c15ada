//! Fixed-size connection container.
//!
//! # Responsibilities
//! - Own N slots, each holding at most one live connection
//! - Supervise every slot: run its connection, then retire or restart it
//! - Pace restarts with the pool-wide retry counter and backoff policy
//! - Publish itself into the endpoint once the first connection initialized
//! - Aggregate pool status and route writes
//!
//! # Design Decisions
//! - One spawned supervisor task per slot; `start` joins them all, so it
//!   spans the pool's operating lifetime
//! - The retry counter is incremented after the backoff delay, right before
//!   the replacement is created, and reset once a replacement connects
//! - Supervisor tasks hold the container alive until `shutdown` retires
//!   every slot

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{join_all, select_all, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::watch;

use crate::config::PoolConfig;
use crate::connection::{
    ConnectionError, ConnectionFactory, ConnectionKind, ConnectionStatus, InitSignal,
    ServiceConnection, ServiceMessage,
};
use crate::endpoint::ServiceEndpoint;
use crate::observability::metrics;
use crate::pool::error::{PoolError, PoolResult};
use crate::pool::policy::{Disposition, FixedRestart, RestartPolicy};
use crate::pool::router;
use crate::pool::slots::{SlotEntry, SlotTable};
use crate::pool::snapshot::{PoolSnapshot, SlotSnapshot};
use crate::pool::ConnectionContainer;
use crate::resilience::{BackoffPolicy, RetryCounter};

/// Builder for [`ServiceConnectionContainer`].
pub struct ContainerBuilder {
    factory: Arc<dyn ConnectionFactory>,
    endpoint: Arc<ServiceEndpoint>,
    policy: Arc<dyn RestartPolicy>,
    kind: ConnectionKind,
    connection_count: usize,
    backoff: BackoffPolicy,
}

impl ContainerBuilder {
    /// Dispose-or-restart policy. Defaults to [`FixedRestart`].
    pub fn policy(mut self, policy: impl RestartPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn kind(mut self, kind: ConnectionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn connection_count(mut self, count: usize) -> Self {
        self.connection_count = count;
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Take size and connection kind from configuration.
    pub fn pool_config(self, config: &PoolConfig) -> Self {
        self.connection_count(config.connection_count)
            .kind(config.connection_kind)
    }

    /// Build a pool of `connection_count` connections created by the factory.
    pub fn build(self) -> PoolResult<Arc<ServiceConnectionContainer>> {
        if self.connection_count == 0 {
            return Err(PoolError::InvalidSize(0));
        }
        let connections = (0..self.connection_count)
            .map(|_| self.factory.create(self.kind, &self.endpoint))
            .collect();
        Ok(self.assemble(connections))
    }

    /// Build a pool around connections created elsewhere. The pool size is
    /// the number of connections given.
    pub fn build_with(
        self,
        connections: Vec<Arc<dyn ServiceConnection>>,
    ) -> PoolResult<Arc<ServiceConnectionContainer>> {
        if connections.is_empty() {
            return Err(PoolError::InvalidSize(0));
        }
        Ok(self.assemble(connections))
    }

    fn assemble(self, connections: Vec<Arc<dyn ServiceConnection>>) -> Arc<ServiceConnectionContainer> {
        let count = connections.len();
        let entries = connections
            .into_iter()
            .enumerate()
            .map(|(generation, connection)| {
                Arc::new(SlotEntry {
                    connection,
                    generation: generation as u64,
                })
            })
            .collect();
        let (closing, _) = watch::channel(false);

        tracing::debug!(
            endpoint = %self.endpoint.name(),
            slots = count,
            kind = %self.kind,
            "Connection pool created"
        );

        Arc::new(ServiceConnectionContainer {
            endpoint: self.endpoint,
            kind: self.kind,
            factory: self.factory,
            policy: self.policy,
            backoff: self.backoff,
            slots: SlotTable::new(entries),
            retry: RetryCounter::new(),
            generation: AtomicU64::new(count as u64),
            started: AtomicBool::new(false),
            initialized: InitSignal::new(),
            closing,
        })
    }
}

/// A pool of persistent connections to one endpoint.
pub struct ServiceConnectionContainer {
    endpoint: Arc<ServiceEndpoint>,
    kind: ConnectionKind,
    factory: Arc<dyn ConnectionFactory>,
    policy: Arc<dyn RestartPolicy>,
    backoff: BackoffPolicy,
    slots: SlotTable,
    retry: RetryCounter,
    generation: AtomicU64,
    started: AtomicBool,
    initialized: InitSignal,
    closing: watch::Sender<bool>,
}

async fn closed(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|closing| *closing).await;
}

impl ServiceConnectionContainer {
    pub fn builder(factory: Arc<dyn ConnectionFactory>, endpoint: Arc<ServiceEndpoint>) -> ContainerBuilder {
        let defaults = PoolConfig::default();
        ContainerBuilder {
            factory,
            endpoint,
            policy: Arc::new(FixedRestart),
            kind: defaults.connection_kind,
            connection_count: defaults.connection_count,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn endpoint(&self) -> &Arc<ServiceEndpoint> {
        &self.endpoint
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.current()
    }

    /// Connection currently occupying `slot`.
    pub fn connection(&self, slot: usize) -> Option<Arc<dyn ServiceConnection>> {
        self.slots.load(slot).map(|entry| entry.connection.clone())
    }

    pub fn connected_slots(&self) -> usize {
        self.slots
            .entries()
            .filter(|(_, entry)| {
                entry
                    .as_ref()
                    .is_some_and(|e| e.connection.status() == ConnectionStatus::Connected)
            })
            .count()
    }

    /// `Connected` if any slot is connected, otherwise `Disconnected`.
    pub fn status(&self) -> ConnectionStatus {
        let any_connected = self.slots.entries().any(|(_, entry)| {
            entry.is_some_and(|e| e.connection.status() == ConnectionStatus::Connected)
        });
        if any_connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// Resolves once the pool has published itself into its endpoint.
    pub async fn initialized(&self) {
        self.initialized.wait().await
    }

    /// Launch every slot and supervise them until all are retired.
    ///
    /// The endpoint back-reference is published as soon as any connection
    /// has finished its first handshake attempt.
    pub async fn start(self: Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::warn!(endpoint = %self.endpoint.name(), "Connection pool already started");
            return;
        }

        let mut launches = Vec::with_capacity(self.size());
        let mut initializations = Vec::with_capacity(self.size());
        for (slot, entry) in self.slots.entries() {
            let Some(entry) = entry else {
                continue;
            };
            initializations.push(entry.connection.init_signal().wait().boxed());
            launches.push(tokio::spawn(self.clone().supervise(slot, entry)));
        }

        if !initializations.is_empty() {
            select_all(initializations).await;
        }

        let weak = Arc::downgrade(&self);
        let container: Weak<dyn ConnectionContainer> = weak;
        self.endpoint.attach(container);
        self.initialized.notify();
        self.record_health();
        tracing::info!(
            endpoint = %self.endpoint.name(),
            slots = self.size(),
            connected = self.connected_slots(),
            "Connection pool initialized"
        );

        for result in join_all(launches).await {
            if let Err(e) = result {
                tracing::error!(endpoint = %self.endpoint.name(), error = %e, "Slot supervisor failed");
            }
        }
        tracing::info!(endpoint = %self.endpoint.name(), "Connection pool stopped");
    }

    /// Write to a randomly chosen connection, failing over across the pool.
    pub async fn write(&self, message: &ServiceMessage) -> PoolResult<()> {
        let initial = router::random_initial(self.size());
        router::write_with_retry(&self.slots, self.endpoint.name(), message, initial).await
    }

    /// Write to the connection `partition_key` maps to, failing over across
    /// the pool when that connection is unavailable.
    pub async fn write_partitioned(&self, partition_key: &str, message: &ServiceMessage) -> PoolResult<()> {
        if partition_key.is_empty() {
            return Err(PoolError::EmptyPartitionKey);
        }
        let initial = i64::from(router::partition_hash(partition_key));
        router::write_with_retry(&self.slots, self.endpoint.name(), message, initial).await
    }

    /// Route by the message's own partition key, if it carries one.
    pub async fn dispatch(&self, message: &ServiceMessage) -> PoolResult<()> {
        match message.partition_key() {
            Some(key) => self.write_partitioned(key, message).await,
            None => self.write(message).await,
        }
    }

    /// Stop restarting and ask every live connection to close.
    pub fn shutdown(&self) {
        if self.closing.send_replace(true) {
            return;
        }
        tracing::info!(endpoint = %self.endpoint.name(), "Shutting down connection pool");
        for (_, entry) in self.slots.entries() {
            if let Some(entry) = entry {
                entry.connection.stop();
            }
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let slots: Vec<_> = self
            .slots
            .entries()
            .map(|(index, entry)| SlotSnapshot {
                index,
                connection_id: entry.as_ref().map(|e| e.connection.id()),
                status: entry.as_ref().map(|e| e.connection.status()),
                generation: entry.as_ref().map(|e| e.generation),
            })
            .collect();
        let connected = slots
            .iter()
            .filter(|slot| slot.status == Some(ConnectionStatus::Connected))
            .count();

        PoolSnapshot {
            endpoint: self.endpoint.name().to_string(),
            kind: self.kind,
            status: if connected > 0 {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            },
            size: self.size(),
            connected,
            retry_count: self.retry_count(),
            slots,
        }
    }

    async fn supervise(self: Arc<Self>, slot: usize, mut entry: Arc<SlotEntry>) {
        let mut restarted = false;
        loop {
            let result = self.run_connection(slot, &entry, restarted).await;
            let connection_id = entry.connection.id();
            match &result {
                Ok(()) => tracing::info!(
                    endpoint = %self.endpoint.name(),
                    slot,
                    connection_id = %connection_id,
                    "Connection closed"
                ),
                Err(e) => tracing::warn!(
                    endpoint = %self.endpoint.name(),
                    slot,
                    connection_id = %connection_id,
                    error = %e,
                    "Connection exited with error"
                ),
            }
            self.record_health();

            match self.dispose_or_restart(slot, &entry) {
                Disposition::Retire(_) => {
                    self.retire(slot);
                    break;
                }
                Disposition::Restart(_) => {
                    match self.restart(slot).await {
                        Some(next) => {
                            entry = next;
                            restarted = true;
                        }
                        None => {
                            self.retire(slot);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Run one connection to the end of its lifetime.
    async fn run_connection(
        &self,
        slot: usize,
        entry: &SlotEntry,
        restarted: bool,
    ) -> Result<(), ConnectionError> {
        let connection = entry.connection.clone();
        let mut lifetime = connection.clone().start(None);
        if !restarted {
            return lifetime.await;
        }

        let initialized = connection.init_signal().wait();
        tokio::pin!(initialized);
        tokio::select! {
            biased;
            _ = &mut initialized => {}
            result = &mut lifetime => return result,
        }

        if connection.status() == ConnectionStatus::Connected {
            self.retry.reset();
            metrics::record_retry_count(self.endpoint.name(), 0);
            self.record_health();
            tracing::info!(
                endpoint = %self.endpoint.name(),
                slot,
                connection_id = %connection.id(),
                "Connection restarted"
            );
        } else {
            tracing::warn!(
                endpoint = %self.endpoint.name(),
                slot,
                connection_id = %connection.id(),
                retry_count = self.retry.current(),
                "Restarted connection failed to connect"
            );
        }
        lifetime.await
    }

    /// A decision naming any slot other than the exited one retires it.
    fn dispose_or_restart(&self, slot: usize, entry: &SlotEntry) -> Disposition {
        if self.is_closing() {
            return Disposition::Retire(slot);
        }
        match self.policy.decide(slot, entry.connection.as_ref()) {
            Disposition::Retire(index) | Disposition::Restart(index) if index != slot => {
                tracing::error!(
                    endpoint = %self.endpoint.name(),
                    slot,
                    decided_slot = index,
                    "Restart policy named another slot, retiring"
                );
                Disposition::Retire(slot)
            }
            disposition => disposition,
        }
    }

    /// Back off, then put a fresh connection into `slot`. Returns `None` if
    /// the container shut down meanwhile.
    async fn restart(&self, slot: usize) -> Option<Arc<SlotEntry>> {
        let retry_count = self.retry.current();
        let delay = self.backoff.delay(retry_count);
        tracing::info!(
            endpoint = %self.endpoint.name(),
            slot,
            retry_count,
            delay_ms = delay.as_millis() as u64,
            "Restarting connection after backoff"
        );

        let mut closing = self.closing.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = closed(&mut closing) => return None,
        }
        if self.is_closing() {
            return None;
        }

        let retry_count = self.retry.increment();
        metrics::record_retry_count(self.endpoint.name(), retry_count);
        metrics::record_restart(self.endpoint.name());

        let entry = Arc::new(SlotEntry {
            connection: self.factory.create(self.kind, &self.endpoint),
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
        });
        self.slots.replace(slot, Some(entry.clone()));
        if self.is_closing() {
            entry.connection.stop();
        }
        Some(entry)
    }

    fn retire(&self, slot: usize) {
        if let Some(entry) = self.slots.replace(slot, None) {
            tracing::info!(
                endpoint = %self.endpoint.name(),
                slot,
                connection_id = %entry.connection.id(),
                "Slot retired"
            );
        }
        self.record_health();
    }

    fn record_health(&self) {
        metrics::record_connected_slots(self.endpoint.name(), self.connected_slots());
    }
}

impl ConnectionContainer for ServiceConnectionContainer {
    fn start(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(ServiceConnectionContainer::start(self))
    }

    fn write<'a>(&'a self, message: &'a ServiceMessage) -> BoxFuture<'a, PoolResult<()>> {
        Box::pin(ServiceConnectionContainer::write(self, message))
    }

    fn write_partitioned<'a>(
        &'a self,
        partition_key: &'a str,
        message: &'a ServiceMessage,
    ) -> BoxFuture<'a, PoolResult<()>> {
        Box::pin(ServiceConnectionContainer::write_partitioned(self, partition_key, message))
    }

    fn status(&self) -> ConnectionStatus {
        ServiceConnectionContainer::status(self)
    }
}

impl fmt::Debug for ServiceConnectionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnectionContainer")
            .field("endpoint", &self.endpoint.name())
            .field("kind", &self.kind)
            .field("size", &self.size())
            .field("retry_count", &self.retry_count())
            .field("closing", &self.is_closing())
            .finish()
    }
}
