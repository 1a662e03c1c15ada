//! Shared helpers for pool integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use relay_pool::connection::simulated::{Delivery, SimBehavior, SimulatedConnection, SimulatedFactory};
use relay_pool::{ConnectionKind, RestartPolicy, ServiceConnectionContainer, ServiceEndpoint};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A pool of simulated connections plus handles into it.
pub struct TestPool {
    pub container: Arc<ServiceConnectionContainer>,
    pub factory: Arc<SimulatedFactory>,
    pub endpoint: Arc<ServiceEndpoint>,
    pub deliveries: mpsc::UnboundedReceiver<Delivery>,
    supervisor: Option<JoinHandle<()>>,
}

impl TestPool {
    /// Build a pool without starting it. `script` sets the handshake outcome
    /// of each connection the factory creates, in order.
    pub fn build(
        size: usize,
        kind: ConnectionKind,
        policy: impl RestartPolicy + 'static,
        script: &[bool],
    ) -> Self {
        let (factory, deliveries) = SimulatedFactory::new(SimBehavior::default());
        factory.script_handshakes(script.iter().copied());
        let factory = Arc::new(factory);
        let endpoint = Arc::new(ServiceEndpoint::new("test-endpoint", "http://relay.test"));
        let container = ServiceConnectionContainer::builder(factory.clone(), endpoint.clone())
            .connection_count(size)
            .kind(kind)
            .policy(policy)
            .build()
            .unwrap();

        Self {
            container,
            factory,
            endpoint,
            deliveries,
            supervisor: None,
        }
    }

    /// Build, start and wait until every slot is connected.
    pub async fn connected(size: usize, policy: impl RestartPolicy + 'static) -> Self {
        let mut pool = Self::build(size, ConnectionKind::Default, policy, &[]);
        pool.start().await;
        let container = pool.container.clone();
        wait_until(|| container.connected_slots() == size).await;
        pool
    }

    /// Spawn the pool's `start` and wait for it to publish itself.
    pub async fn start(&mut self) {
        self.supervisor = Some(tokio::spawn(self.container.clone().start()));
        self.container.initialized().await;
    }

    /// Simulated connection currently in `slot`.
    pub fn slot(&self, slot: usize) -> Arc<SimulatedConnection> {
        let connection = self.container.connection(slot).expect("slot is empty");
        self.factory.find(connection.id()).expect("connection not created by factory")
    }

    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut delivered = Vec::new();
        while let Ok(delivery) = self.deliveries.try_recv() {
            delivered.push(delivery);
        }
        delivered
    }

    /// Shut the pool down and wait for `start` to return.
    pub async fn stop(mut self) {
        self.container.shutdown();
        if let Some(supervisor) = self.supervisor.take() {
            tokio::time::timeout(Duration::from_secs(120), supervisor)
                .await
                .expect("pool did not stop")
                .unwrap();
        }
    }

    pub fn take_supervisor(&mut self) -> JoinHandle<()> {
        self.supervisor.take().expect("pool not started")
    }
}

/// Poll `condition` every 10ms, for at most two virtual minutes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..12_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
