//! Expiry reaper
//!
//! Background task that evicts abandoned rooms on two cadences: a slow
//! sweep for rooms idle past the stale threshold, and a faster one that only
//! runs while the store is over its soft limit and drops idle rooms that are
//! not mid-game.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::room::{Room, RoomStatus};
use crate::server::GameServer;
use crate::types::RoomCode;

const STALE_REASON: &str = "Room expired after inactivity";
const PRESSURE_REASON: &str = "Room closed to free server capacity";

pub struct ExpiryReaper {
    server: Arc<GameServer>,
    reaper_interval: Duration,
    stale_room_timeout: Duration,
    pressure_interval: Duration,
    idle_room_timeout: Duration,
    room_soft_limit: usize,
}

impl ExpiryReaper {
    pub fn new(server: Arc<GameServer>, config: &ServerConfig) -> Self {
        Self {
            server,
            reaper_interval: config.reaper_interval,
            stale_room_timeout: config.stale_room_timeout,
            pressure_interval: config.pressure_interval,
            idle_room_timeout: config.idle_room_timeout,
            room_soft_limit: config.room_soft_limit,
        }
    }

    /// Sweep until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let mut stale_tick = tokio::time::interval(self.reaper_interval);
        let mut pressure_tick = tokio::time::interval(self.pressure_interval);
        stale_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        pressure_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Reaper started (stale after {:?}, soft limit {} rooms)",
            self.stale_room_timeout, self.room_soft_limit
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = stale_tick.tick() => {
                    self.sweep_stale(Instant::now());
                    self.report_cache();
                }
                _ = pressure_tick.tick() => {
                    let rooms = self.server.rooms().len();
                    if rooms > self.room_soft_limit {
                        debug!("{} rooms over soft limit {}", rooms, self.room_soft_limit);
                        self.sweep_idle(Instant::now());
                    }
                }
            }
        }

        info!("Reaper stopped");
    }

    /// Evict every room idle longer than the stale threshold
    pub fn sweep_stale(&self, now: Instant) -> Vec<RoomCode> {
        let timeout = self.stale_room_timeout;
        self.sweep(STALE_REASON, |room| room.idle_for(now) > timeout)
    }

    /// Evict rooms that are not mid-game and idle longer than the idle threshold
    pub fn sweep_idle(&self, now: Instant) -> Vec<RoomCode> {
        let timeout = self.idle_room_timeout;
        self.sweep(PRESSURE_REASON, |room| {
            room.status != RoomStatus::Playing && room.idle_for(now) > timeout
        })
    }

    /// Log score cache occupancy; returns (entries, hits, misses)
    pub fn report_cache(&self) -> (usize, u64, u64) {
        let cache = self.server.ai().cache();
        let (hits, misses) = cache.stats();
        debug!(
            "Score cache: {}/{} entries, {} hits, {} misses",
            cache.len(),
            cache.capacity(),
            hits,
            misses
        );
        (cache.len(), hits, misses)
    }

    fn sweep(&self, reason: &str, expired: impl Fn(&Room) -> bool) -> Vec<RoomCode> {
        let mut evicted = Vec::new();

        for code in self.server.rooms().codes() {
            let Ok(handle) = self.server.rooms().get(&code) else {
                continue;
            };
            // A locked room has a handler running in it right now
            let Ok(mut room) = handle.room.try_lock() else {
                continue;
            };
            if room.is_closed() || !expired(&room) {
                continue;
            }
            self.server.evict_locked(&mut room, reason);
            evicted.push(code);
        }

        if !evicted.is_empty() {
            info!("Reaper evicted {} room(s)", evicted.len());
        }
        evicted
    }
}
