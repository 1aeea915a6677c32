//! Scripted data source for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use super::{BattleRecord, DataSource, EntityId, FetchError};

/// What the scripted source answers for one entity.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Latest record.
    Record(BattleRecord),
    /// No record yet.
    Empty,
    /// Currently unavailable.
    Unavailable,
    /// Never completes.
    Hang,
}

/// Data source answering from a per-entity script.
///
/// Entities without a script answer [`Scripted::Empty`].
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<EntityId, Scripted>>,
    calls: Mutex<Vec<EntityId>>,
    delay: Mutex<Option<Duration>>,
    hold: Mutex<Option<Arc<Notify>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the answer for `entity`.
    pub fn set(&self, entity: &str, answer: Scripted) {
        self.script
            .lock()
            .unwrap()
            .insert(EntityId::from(entity), answer);
    }

    /// Answers with a record whose fingerprint is `"{seq}_{time}"`.
    pub fn set_record(&self, entity: &str, seq: &str, time: &str) {
        self.set(entity, Scripted::Record(record(seq, time)));
    }

    /// Makes every fetch wait `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Makes every later fetch wait until the returned handle is notified.
    ///
    /// The fetch is recorded in [`ScriptedSource::calls`] before it waits.
    pub fn hold(&self) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&release));
        release
    }

    /// Returns every fetched entity, in call order.
    pub fn calls(&self) -> Vec<EntityId> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns how often `entity` was fetched.
    pub fn calls_for(&self, entity: &str) -> usize {
        self.calls()
            .iter()
            .filter(|e| e.as_str() == entity)
            .count()
    }

    /// Returns the highest number of concurrent fetches observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl DataSource for ScriptedSource {
    async fn fetch_latest(&self, entity: &EntityId) -> Result<Option<BattleRecord>, FetchError> {
        self.calls.lock().unwrap().push(entity.clone());
        let answer = self
            .script
            .lock()
            .unwrap()
            .get(entity)
            .cloned()
            .unwrap_or(Scripted::Empty);
        let delay = *self.delay.lock().unwrap();
        let hold = self.hold.lock().unwrap().clone();
        if let Some(release) = hold {
            release.notified().await;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match answer {
            Scripted::Record(record) => Ok(Some(record)),
            Scripted::Empty => Ok(None),
            Scripted::Unavailable => Err(FetchError::InvalidResponse("scripted failure".into())),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

/// Builds a winning record with the given fingerprint parts.
pub fn record(seq: &str, time: &str) -> BattleRecord {
    BattleRecord {
        game_seq: seq.to_string(),
        game_time: time.to_string(),
        is_win: true,
        hero_name: "李白".to_string(),
        kill_num: 10,
        dead_num: 2,
        assist_num: 5,
        map_name: "排位赛".to_string(),
        score: "11.2".to_string(),
    }
}
