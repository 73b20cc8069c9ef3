use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::ClimateCatalog;
use crate::flower::RngDice;
use crate::session::WeatherSession;

/// A client's session together with the dice it rolls.
pub struct Slot {
    pub session: WeatherSession,
    pub dice: RngDice<ChaCha8Rng>,
}

struct Entry {
    slot: Arc<Mutex<Slot>>,
    /// Milliseconds since the store was created.
    last_seen_ms: AtomicU64,
}

/// Limits applied by a [`SessionStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Sessions unseen for this long are dropped when a new one is issued.
    pub idle: Duration,
    /// When full, issuing a session evicts the least recently seen one.
    pub max_sessions: usize,
}

/// Per-client sessions keyed by cookie id.
///
/// Each slot sits behind its own mutex, so one client's
/// select/jump/roll sequence is serialized while other clients run freely.
pub struct SessionStore {
    entries: RwLock<HashMap<Uuid, Arc<Entry>>>,
    started: Instant,
    limits: StoreLimits,
    dice_seed: u64,
    issued: AtomicU64,
    default_climate: String,
    default_season: String,
}

impl SessionStore {
    pub fn new(
        default_climate: impl Into<String>,
        default_season: impl Into<String>,
        limits: StoreLimits,
        dice_seed: u64,
    ) -> Self {
        SessionStore {
            entries: RwLock::new(HashMap::new()),
            started: Instant::now(),
            limits,
            dice_seed,
            issued: AtomicU64::new(0),
            default_climate: default_climate.into(),
            default_season: default_season.into(),
        }
    }

    /// The slot for a known id, marking it as seen. Never issues a session.
    pub async fn find(&self, id: Option<Uuid>) -> Option<Arc<Mutex<Slot>>> {
        let id = id?;
        let entries = self.entries.read().await;
        let entry = entries.get(&id)?;
        entry.last_seen_ms.store(self.now_ms(), Ordering::Relaxed);
        Some(Arc::clone(&entry.slot))
    }

    /// Look up the client's slot, or issue a fresh one seeded on the
    /// default climate and season. Returns the id and whether it is new.
    pub async fn open(
        &self,
        id: Option<Uuid>,
        catalog: &ClimateCatalog,
    ) -> (Uuid, Arc<Mutex<Slot>>, bool) {
        if let (Some(id), Some(slot)) = (id, self.find(id).await) {
            return (id, slot, false);
        }

        let mut session = WeatherSession::new();
        if let Err(e) = session.select_season(catalog, &self.default_climate, &self.default_season)
        {
            warn!(
                climate = %self.default_climate,
                season = %self.default_season,
                "Default selection failed: {}", e
            );
        }
        let slot = Arc::new(Mutex::new(Slot {
            session,
            dice: RngDice::new(self.next_rng()),
        }));

        let id = Uuid::new_v4();
        let now = self.now_ms();
        let mut entries = self.entries.write().await;
        self.prune(&mut entries, now);
        while entries.len() >= self.limits.max_sessions {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_seen_ms.load(Ordering::Relaxed))
                .map(|(id, _)| *id)
            else {
                break;
            };
            entries.remove(&oldest);
            debug!(session = %oldest, "Evicted least recently seen session");
        }
        entries.insert(
            id,
            Arc::new(Entry {
                slot: Arc::clone(&slot),
                last_seen_ms: AtomicU64::new(now),
            }),
        );
        debug!(session = %id, active = entries.len(), "Session issued");
        (id, slot, true)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn prune(&self, entries: &mut HashMap<Uuid, Arc<Entry>>, now: u64) {
        let idle_ms = self.limits.idle.as_millis() as u64;
        let before = entries.len();
        entries.retain(|_, e| now.saturating_sub(e.last_seen_ms.load(Ordering::Relaxed)) < idle_ms);
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!(dropped, "Pruned idle sessions");
        }
    }

    fn next_rng(&self) -> ChaCha8Rng {
        let n = self.issued.fetch_add(1, Ordering::Relaxed);
        if self.dice_seed == 0 {
            ChaCha8Rng::from_entropy()
        } else {
            ChaCha8Rng::seed_from_u64(self.dice_seed.wrapping_add(n))
        }
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::small_catalog;
    use crate::flower::FlowerRules;

    fn limits(idle: Duration, max_sessions: usize) -> StoreLimits {
        StoreLimits { idle, max_sessions }
    }

    fn store() -> SessionStore {
        SessionStore::new("temperate", "summer", limits(Duration::from_secs(3600), 64), 0)
    }

    #[tokio::test]
    async fn new_session_starts_on_default_selection() {
        let catalog = small_catalog();
        let store = store();
        let (_, slot, created) = store.open(None, &catalog).await;
        assert!(created);
        let slot = slot.lock().await;
        assert_eq!(slot.session.selection(), Some(("temperate", "summer")));
        assert_eq!(slot.session.position().unwrap().get(), 10);
    }

    #[tokio::test]
    async fn known_id_returns_same_slot() {
        let catalog = small_catalog();
        let store = store();
        let (id, slot, _) = store.open(None, &catalog).await;
        slot.lock().await.session.jump_to(4).unwrap();

        let (again, slot, created) = store.open(Some(id), &catalog).await;
        assert_eq!(again, id);
        assert!(!created);
        assert_eq!(slot.lock().await.session.position().unwrap().get(), 4);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_id_issues_new_session() {
        let catalog = small_catalog();
        let store = store();
        let stale = Uuid::new_v4();
        let (id, _, created) = store.open(Some(stale), &catalog).await;
        assert!(created);
        assert_ne!(id, stale);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let catalog = small_catalog();
        let store = store();
        let (_, a, _) = store.open(None, &catalog).await;
        let (_, b, _) = store.open(None, &catalog).await;
        a.lock().await.session.jump_to(2).unwrap();
        assert_eq!(b.lock().await.session.position().unwrap().get(), 10);
    }

    #[tokio::test]
    async fn bad_default_leaves_session_uninitialized() {
        let catalog = small_catalog();
        let store = SessionStore::new("polar", "winter", limits(Duration::from_secs(60), 8), 0);
        let (_, slot, _) = store.open(None, &catalog).await;
        assert!(!slot.lock().await.session.is_ready());
    }

    #[tokio::test]
    async fn idle_sessions_pruned_on_issue() {
        let catalog = small_catalog();
        let store = SessionStore::new(
            "temperate",
            "spring",
            limits(Duration::from_millis(1), 8),
            0,
        );
        store.open(None, &catalog).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.open(None, &catalog).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_rolls_on_one_session_all_apply() {
        let catalog = Arc::new(small_catalog());
        let rules = Arc::new(FlowerRules::standard().unwrap());
        let store = Arc::new(store());
        let (id, _, _) = store.open(None, &catalog).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let (catalog, rules, store) = (catalog.clone(), rules.clone(), store.clone());
            handles.push(tokio::spawn(async move {
                let (_, slot, _) = store.open(Some(id), &catalog).await;
                let mut slot = slot.lock().await;
                slot.session.roll_transition(&rules, &catalog, 13).unwrap().from.get()
            }));
        }
        let mut starts = Vec::new();
        for h in handles {
            starts.push(h.await.unwrap());
        }
        // Up from 10 climbs 10 -> 15 -> 19, then holds at the top.
        starts.sort();
        assert_eq!(starts.iter().filter(|&&c| c == 10).count(), 1);
        assert_eq!(starts.iter().filter(|&&c| c == 15).count(), 1);
        assert_eq!(starts.iter().filter(|&&c| c == 19).count(), 14);
    }

    #[tokio::test]
    async fn seeded_store_is_reproducible() {
        use crate::flower::DiceSource;
        let catalog = small_catalog();
        let a = SessionStore::new(
            "temperate",
            "spring",
            limits(Duration::from_secs(60), 8),
            99,
        );
        let b = SessionStore::new(
            "temperate",
            "spring",
            limits(Duration::from_secs(60), 8),
            99,
        );
        let (_, sa, _) = a.open(None, &catalog).await;
        let (_, sb, _) = b.open(None, &catalog).await;
        let ra: Vec<u8> = {
            let mut s = sa.lock().await;
            (0..10).map(|_| s.dice.roll(8)).collect()
        };
        let rb: Vec<u8> = {
            let mut s = sb.lock().await;
            (0..10).map(|_| s.dice.roll(8)).collect()
        };
        assert_eq!(ra, rb);
    }

    #[tokio::test]
    async fn full_store_evicts_least_recently_seen() {
        let catalog = small_catalog();
        let store = SessionStore::new(
            "temperate",
            "spring",
            limits(Duration::from_secs(3600), 3),
            0,
        );
        let (first, _, _) = store.open(None, &catalog).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (second, _, _) = store.open(None, &catalog).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (third, _, _) = store.open(None, &catalog).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Touch the first so the second becomes the oldest.
        assert!(store.find(Some(first)).await.is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.open(None, &catalog).await;

        assert_eq!(store.len().await, 3);
        assert!(store.find(Some(first)).await.is_some());
        assert!(store.find(Some(second)).await.is_none());
        assert!(store.find(Some(third)).await.is_some());
    }

    #[tokio::test]
    async fn store_never_exceeds_cap() {
        let catalog = small_catalog();
        let store = SessionStore::new(
            "temperate",
            "spring",
            limits(Duration::from_secs(3600), 10),
            0,
        );
        for _ in 0..500 {
            store.open(None, &catalog).await;
        }
        assert_eq!(store.len().await, 10);
    }

    #[tokio::test]
    async fn find_does_not_issue() {
        let store = store();
        assert!(store.find(None).await.is_none());
        assert!(store.find(Some(Uuid::new_v4())).await.is_none());
        assert!(store.is_empty().await);
    }
}
