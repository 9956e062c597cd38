//! Per-patient mutable state with TTL eviction.
//!
//! The store serializes mutation per patient: each entry is its own mutex,
//! so interleaved deliveries for the same patient cannot lose counter
//! increments, while distinct patients never block each other. No lock is
//! ever held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::rules::ViolationKind;

/// Mutable evaluation state for one patient.
///
/// Created lazily on the first sample, destroyed only by the eviction
/// sweep once idle beyond the TTL.
#[derive(Debug, Clone)]
pub struct EntityState {
    pub patient_id: Uuid,
    /// Consecutive-violation counters, independent per kind.
    pub counters: HashMap<ViolationKind, u32>,
    /// Wall-clock time of the last evaluation touching this patient.
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    fn new(patient_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            patient_id,
            counters: HashMap::new(),
            last_updated: now,
        }
    }

    /// Current streak for a kind (0 if never violated).
    pub fn counter(&self, kind: ViolationKind) -> u32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }
}

/// Explicitly constructed per-patient state store (no hidden singleton).
#[derive(Debug, Default)]
pub struct StateStore {
    entities: RwLock<HashMap<Uuid, Arc<Mutex<EntityState>>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the state entry for a patient, creating it with zeroed
    /// counters on first access.
    pub fn get_or_create(&self, patient_id: Uuid) -> Arc<Mutex<EntityState>> {
        if let Some(entry) = self.entities.read().unwrap().get(&patient_id) {
            return entry.clone();
        }

        let mut entities = self.entities.write().unwrap();
        entities
            .entry(patient_id)
            .or_insert_with(|| Arc::new(Mutex::new(EntityState::new(patient_id, Utc::now()))))
            .clone()
    }

    /// Remove every patient idle for strictly longer than `ttl` at `now`.
    ///
    /// Eviction is absolute staleness, not LRU: with the sweep period equal
    /// to the TTL, an idle patient survives up to just under 2×TTL before
    /// removal. That boundary effect is part of the contract.
    pub fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let ttl = match chrono::Duration::from_std(ttl) {
            Ok(d) => d,
            Err(_) => return 0,
        };

        let mut entities = self.entities.write().unwrap();
        let before = entities.len();
        entities.retain(|_, entry| {
            let state = entry.lock().unwrap();
            now.signed_duration_since(state.last_updated) <= ttl
        });
        before - entities.len()
    }

    /// Number of patients currently tracked (gauge).
    pub fn tracked(&self) -> usize {
        self.entities.read().unwrap().len()
    }
}

// ── Eviction sweeper ────────────────────────────────────────────────

/// Owned handle to the periodic eviction task.
///
/// The sweep is not an ambient timer: whoever spawns it must call
/// [`stop`](SweeperHandle::stop) during shutdown, which cancels the loop
/// and awaits the task.
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        self.shutdown.notify_one();
        let _ = self.handle.await;
        info!("Eviction sweeper stopped");
    }
}

/// Spawn the periodic eviction sweep. The first sweep runs one full
/// `period` after startup, not immediately.
pub fn spawn_sweeper(store: Arc<StateStore>, period: Duration, ttl: Duration) -> SweeperHandle {
    let shutdown = Arc::new(Notify::new());
    let sweeper_shutdown = shutdown.clone();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately on the first tick; consume it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = store.sweep(Utc::now(), ttl);
                    if removed > 0 {
                        debug!(removed, tracked = store.tracked(), "Evicted idle patient state");
                    }
                }
                _ = sweeper_shutdown.notified() => break,
            }
        }
    });

    info!(period_ms = period.as_millis() as u64, ttl_ms = ttl.as_millis() as u64, "Eviction sweeper started");
    SweeperHandle { shutdown, handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let store = StateStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.tracked(), 0);

        let a = store.get_or_create(id);
        let b = store.get_or_create(id);
        assert_eq!(store.tracked(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().unwrap().counter(ViolationKind::Spo2Low), 0);
    }

    #[test]
    fn test_sweep_evicts_strictly_older_than_ttl() {
        let store = StateStore::new();
        let id = Uuid::new_v4();
        let entry = store.get_or_create(id);
        entry.lock().unwrap().last_updated = at(0);
        let ttl = Duration::from_millis(1000);

        assert_eq!(store.sweep(at(1000), ttl), 0); // age == ttl: retained
        assert_eq!(store.tracked(), 1);
        assert_eq!(store.sweep(at(1001), ttl), 1);
        assert_eq!(store.tracked(), 0);
    }

    #[test]
    fn test_periodic_schedule_survives_until_second_sweep() {
        // TTL 1000ms, sweep period == TTL, entity updated at t=0. The
        // sweep at t=1000 retains it (age == ttl), so it stays tracked
        // until the t=2000 sweep: just under 2×TTL of wall clock.
        let store = StateStore::new();
        let id = Uuid::new_v4();
        let entry = store.get_or_create(id);
        entry.lock().unwrap().last_updated = at(0);
        let ttl = Duration::from_millis(1000);

        assert_eq!(store.sweep(at(1000), ttl), 0);
        assert_eq!(store.tracked(), 1);

        assert_eq!(store.sweep(at(2000), ttl), 1);
        assert_eq!(store.tracked(), 0);
    }

    #[test]
    fn test_sweep_spares_recently_updated() {
        let store = StateStore::new();
        let idle = Uuid::new_v4();
        let active = Uuid::new_v4();
        store.get_or_create(idle).lock().unwrap().last_updated = at(0);
        store.get_or_create(active).lock().unwrap().last_updated = at(5_000);

        let removed = store.sweep(at(6_000), Duration::from_millis(1000));
        assert_eq!(removed, 1);
        assert_eq!(store.tracked(), 1);
        // The surviving entry is the active one.
        let entry = store.get_or_create(active);
        assert_eq!(entry.lock().unwrap().last_updated, at(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_runs_and_stops() {
        let store = Arc::new(StateStore::new());
        let id = Uuid::new_v4();
        store.get_or_create(id).lock().unwrap().last_updated = at(0);

        let handle = spawn_sweeper(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_nanos(1),
        );

        // Let the sweeper tick at least once.
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(store.tracked(), 0);

        handle.stop().await;
    }
}
