//! The connection hub task
//!
//! One task owns the registry, the rate limiter and the store handle. Every
//! request arrives through a single FIFO inbox, so admissions, removals and
//! broadcasts are totally ordered and the hub needs no locks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::handle::HubHandle;
use super::registry::Registry;
use super::request::{Call, HubRequest, HubStats, Notification};
use crate::connection::{Connection, ConnectionId};
use crate::error::{Error, Result};
use crate::protocol::{PixelUpdate, ServerMessage};
use crate::store::CanvasStore;
use crate::utils::{AddressRateLimiter, RateLimitConfig};

/// Hub limits
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Live connections allowed per source address
    pub max_connections_per_address: usize,
    /// Per-address update budget
    pub rate_limit: RateLimitConfig,
    /// How often idle rate-limiter entries are swept
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections_per_address: 5,
            rate_limit: RateLimitConfig::default(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Connection hub actor
pub struct ConnectionHub {
    config: HubConfig,
    registry: Registry,
    limiter: AddressRateLimiter,
    store: Arc<dyn CanvasStore>,
    inbox: mpsc::UnboundedReceiver<HubRequest>,
}

impl ConnectionHub {
    /// Create a hub and the handle that feeds it
    #[must_use]
    pub fn new(store: Arc<dyn CanvasStore>, config: HubConfig) -> (Self, HubHandle) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let hub = Self {
            limiter: AddressRateLimiter::new(config.rate_limit.clone()),
            config,
            registry: Registry::new(),
            store,
            inbox,
        };
        (hub, HubHandle::new(tx))
    }

    /// Process requests until `cancel` fires or every handle is dropped
    pub async fn run(mut self, cancel: CancellationToken) {
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let mut sweep = tokio::time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            max_connections_per_address = self.config.max_connections_per_address,
            rate_limit_capacity = self.config.rate_limit.capacity,
            "Connection hub started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Connection hub shutting down");
                    break;
                }
                request = self.inbox.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => {
                        debug!("All hub handles dropped");
                        break;
                    }
                },
                _ = sweep.tick() => self.sweep(),
            }
        }

        self.shutdown();
    }

    async fn handle(&mut self, request: HubRequest) {
        trace!(request = request.kind(), "Hub request");
        match request {
            HubRequest::Call(Call::Register { conn, reply }) => {
                let result = self.register(conn);
                let _ = reply.send(result);
            }
            HubRequest::Call(Call::Count { reply }) => {
                let _ = reply.send(self.registry.total());
            }
            HubRequest::Call(Call::Stats { reply }) => {
                let _ = reply.send(self.stats());
            }
            HubRequest::Notify(Notification::Deregister { id }) => self.deregister(id),
            HubRequest::Notify(Notification::Broadcast { src, update }) => {
                self.broadcast(src, update).await;
            }
        }
    }

    fn register(&mut self, conn: Arc<dyn Connection>) -> Result<()> {
        let id = conn.id();
        let addr = conn.remote_addr();
        let live = self.registry.count_for(&addr);
        let limit = self.config.max_connections_per_address;

        if live >= limit {
            warn!(conn_id = %id, addr = %addr, live, "Connection limit reached for address");
            return Err(Error::TooManyConnections {
                address: addr,
                limit,
            });
        }

        if self.limiter.ensure(addr) {
            debug!(addr = %addr, "Created rate limiter bucket");
        }
        self.registry.add(conn);

        info!(
            conn_id = %id,
            addr = %addr,
            clients = self.registry.total(),
            "Client registered"
        );
        Ok(())
    }

    fn deregister(&mut self, id: ConnectionId) {
        let Some(conn) = self.registry.remove(id) else {
            debug!(conn_id = %id, "Deregister for unknown connection ignored");
            return;
        };
        conn.close();
        info!(
            conn_id = %id,
            addr = %conn.remote_addr(),
            clients = self.registry.total(),
            "Client deregistered"
        );
    }

    async fn broadcast(&mut self, src: ConnectionId, update: PixelUpdate) {
        let Some(source) = self.registry.get(&src).cloned() else {
            debug!(conn_id = %src, "Broadcast from unregistered connection ignored");
            return;
        };
        let addr = source.remote_addr();

        let permit = self.limiter.acquire(addr);
        if !permit.allowed {
            let denied = Error::RateLimited;
            debug!(
                conn_id = %src,
                addr = %addr,
                code = denied.code(),
                retry_after_ms = permit.retry_after.as_millis() as u64,
                "Update rate limited"
            );
            if let Some(text) = denied.notice() {
                if let Err(e) = source.send(&text) {
                    debug!(conn_id = %src, error = %e, "Failed to deliver rate limit notice");
                    self.deregister(src);
                }
            }
            return;
        }

        if let Err(e) = self
            .store
            .set_range(update.index, &update.color_bytes())
            .await
        {
            warn!(index = update.index, error = %e, "Failed to write update to store");
            return;
        }

        let message = match ServerMessage::update(update, self.registry.total()).to_json() {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to encode update");
                return;
            }
        };

        let failed: Vec<ConnectionId> = self
            .registry
            .connections()
            .filter_map(|conn| match conn.send(&message) {
                Ok(()) => None,
                Err(e) => {
                    debug!(conn_id = %conn.id(), error = %e, "Send failed during broadcast");
                    Some(conn.id())
                }
            })
            .collect();

        for id in failed {
            self.deregister(id);
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.registry.total(),
            addresses: self.registry.address_count(),
            tracked_addresses: self.limiter.len(),
        }
    }

    fn sweep(&mut self) {
        let registry = &self.registry;
        let removed = self.limiter.sweep(|addr| registry.is_address_live(addr));
        if removed > 0 {
            debug!(
                removed,
                remaining = self.limiter.len(),
                "Swept idle rate limiter entries"
            );
        }
    }

    fn shutdown(&mut self) {
        self.inbox.close();
        let connections = self.registry.drain();
        let closed = connections.len();
        for conn in connections {
            conn.close();
        }
        info!(closed, "Connection hub stopped");
    }
}

/// Spawn a hub on the current runtime
pub fn spawn_hub(
    store: Arc<dyn CanvasStore>,
    config: HubConfig,
    cancel: CancellationToken,
) -> (HubHandle, JoinHandle<()>) {
    let (hub, handle) = ConnectionHub::new(store, config);
    let task = tokio::spawn(hub.run(cancel));
    (handle, task)
}
