use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::Bound,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{LexBound, Script, Store, StoreError};

/// Store operations that can be made to fail once via
/// [`MemoryStore::fail_on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Exists,
    Get,
    Set,
    Delete,
    SortedSetAdd,
    SortedSetRemove,
    RangeByLex,
    /// The next script is rejected before it runs.
    Script,
    /// The next script applies its first mutation and then aborts without
    /// undoing it, as if the store died mid-script.
    ScriptPartial,
}

#[derive(Default)]
struct State {
    values: HashMap<String, Bytes>,
    sorted_sets: HashMap<String, BTreeMap<String, f64>>,
    armed: HashSet<FailPoint>,
}

impl State {
    /// Consumes an armed failure for `point`.
    fn trip(&mut self, point: FailPoint) -> Result<(), StoreError> {
        if self.armed.remove(&point) {
            return Err(StoreError::unavailable(format!("injected {point:?} failure")));
        }
        Ok(())
    }

    fn zadd(&mut self, set: &str, score: f64, member: &str) -> u64 {
        let members = self.sorted_sets.entry(set.to_string()).or_default();
        match members.insert(member.to_string(), score) {
            Some(_) => 0,
            None => 1,
        }
    }

    fn zrem(&mut self, set: &str, member: &str) -> u64 {
        let Some(members) = self.sorted_sets.get_mut(set) else {
            return 0;
        };
        let removed = u64::from(members.remove(member).is_some());
        if members.is_empty() {
            self.sorted_sets.remove(set);
        }
        removed
    }

    fn add_task(&mut self, keys: &[String], args: &[Bytes]) -> Result<(), StoreError> {
        let script = Script::AddTask;
        let (primary, index) = (&keys[0], &keys[1]);
        let member = utf8_arg(script, &args[1])?;

        self.trip(FailPoint::Set)
            .map_err(|e| script_failed(script, e.to_string()))?;
        self.values.insert(primary.clone(), args[0].clone());

        if self.armed.remove(&FailPoint::ScriptPartial) {
            return Err(aborted(script, "SET", "store failed"));
        }

        // ZADD runs under pcall: a failure is a value the script inspects
        let added = match (self.trip(FailPoint::SortedSetAdd), member.parse::<f64>()) {
            (Ok(()), Ok(score)) => Ok(self.zadd(index, score, member)),
            (Err(e), _) => Err(e.to_string()),
            (_, Err(_)) => Err("value is not a valid float".to_string()),
        };

        match added {
            Ok(1) => Ok(()),
            outcome => {
                self.trip(FailPoint::Delete)
                    .map_err(|e| aborted(script, "SET", e.to_string()))?;
                self.values.remove(primary);
                let reason = match outcome {
                    Err(reason) => reason,
                    Ok(count) => format!("ZADD added {count} members"),
                };
                Err(script_failed(script, reason))
            }
        }
    }

    fn update_task(&mut self, keys: &[String], args: &[Bytes]) -> Result<(), StoreError> {
        let script = Script::UpdateTask;
        let primary = &keys[0];
        if !self.values.contains_key(primary) {
            return Err(script_failed(script, "task missing"));
        }
        self.trip(FailPoint::Set)
            .map_err(|e| script_failed(script, e.to_string()))?;
        self.values.insert(primary.clone(), args[0].clone());
        Ok(())
    }

    fn delete_task(&mut self, keys: &[String], args: &[Bytes]) -> Result<(), StoreError> {
        let script = Script::DeleteTask;
        let (primary, index) = (&keys[0], &keys[1]);
        let member = utf8_arg(script, &args[0])?;

        self.trip(FailPoint::Get)
            .map_err(|e| script_failed(script, e.to_string()))?;
        self.trip(FailPoint::Delete)
            .map_err(|e| script_failed(script, e.to_string()))?;
        // DEL must report exactly one key; otherwise nothing was changed
        let Some(prior) = self.values.remove(primary) else {
            return Err(script_failed(script, "task missing"));
        };

        if self.armed.remove(&FailPoint::ScriptPartial) {
            return Err(aborted(script, "DEL", "store failed"));
        }

        let removed = self
            .trip(FailPoint::SortedSetRemove)
            .map(|()| self.zrem(index, member))
            .map_err(|e| e.to_string());

        match removed {
            Ok(1) => Ok(()),
            outcome => {
                self.trip(FailPoint::Set)
                    .map_err(|e| aborted(script, "DEL", e.to_string()))?;
                self.values.insert(primary.clone(), prior);
                let reason = match outcome {
                    Err(reason) => reason,
                    Ok(count) => format!("ZREM removed {count} members"),
                };
                Err(script_failed(script, reason))
            }
        }
    }
}

fn script_failed(script: Script, reason: impl Into<String>) -> StoreError {
    StoreError::ScriptFailed {
        script,
        reason: reason.into(),
    }
}

fn aborted(script: Script, step: &'static str, reason: impl Into<String>) -> StoreError {
    StoreError::Aborted {
        script,
        step,
        reason: reason.into(),
    }
}

fn utf8_arg(script: Script, arg: &Bytes) -> Result<&str, StoreError> {
    core::str::from_utf8(arg).map_err(|_| StoreError::InvalidArguments {
        script,
        reason: "member is not valid UTF-8".to_string(),
    })
}

/// A process-local [`Store`].
///
/// All state sits behind one mutex, so every operation, scripts included, is
/// atomic with respect to every other. Sorted-set members are kept in
/// lexicographic order, which is what `range_by_lex` scans; scores are stored
/// but only reported, never used for ordering.
///
/// Failures can be injected for tests with [`MemoryStore::fail_on`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure for the next operation matching `point`.
    ///
    /// Inside a script an armed `Set`/`Delete`/`Get` stops the script at that
    /// step (as an abort if an earlier write is left behind), and an armed
    /// `SortedSetAdd`/`SortedSetRemove` is seen by the script as a failed
    /// index step, which triggers its own rollback.
    pub fn fail_on(&self, point: FailPoint) {
        self.state.lock().armed.insert(point);
    }

    /// Number of primary keys held.
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score of `member` in `set`, if present.
    pub fn score(&self, set: &str, member: &str) -> Option<f64> {
        self.state
            .lock()
            .sorted_sets
            .get(set)
            .and_then(|members| members.get(member).copied())
    }

    /// Number of members in `set`.
    pub fn cardinality(&self, set: &str) -> usize {
        self.state.lock().sorted_sets.get(set).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::Exists)?;
        Ok(state.values.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::Get)?;
        Ok(state.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::Set)?;
        state.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::Delete)?;
        Ok(u64::from(state.values.remove(key).is_some()))
    }

    async fn sorted_set_add(&self, set: &str, score: f64, member: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::SortedSetAdd)?;
        Ok(state.zadd(set, score, member))
    }

    async fn sorted_set_remove(&self, set: &str, member: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::SortedSetRemove)?;
        Ok(state.zrem(set, member))
    }

    async fn range_by_lex(
        &self,
        set: &str,
        start: LexBound,
        stop: LexBound,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock();
        state.trip(FailPoint::RangeByLex)?;
        let Some(members) = state.sorted_sets.get(set) else {
            return Ok(Vec::new());
        };

        let lower = match &start {
            LexBound::Unbounded => Bound::Unbounded,
            LexBound::Inclusive(m) => Bound::Included(m.as_str()),
            LexBound::Exclusive(m) => Bound::Excluded(m.as_str()),
        };
        // an inverted range is empty rather than a panic
        let below_stop = |member: &str| match &stop {
            LexBound::Unbounded => true,
            LexBound::Inclusive(m) => member <= m.as_str(),
            LexBound::Exclusive(m) => member < m.as_str(),
        };

        Ok(members
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(member, _)| member.as_str())
            .take_while(|member| below_stop(*member))
            .skip(offset)
            .take(count)
            .map(str::to_string)
            .collect())
    }

    async fn execute_atomic(
        &self,
        script: Script,
        keys: &[String],
        args: &[Bytes],
    ) -> Result<(), StoreError> {
        if keys.len() != script.key_count() || args.len() != script.arity() {
            return Err(StoreError::InvalidArguments {
                script,
                reason: format!(
                    "expected {} keys and {} args, got {} and {}",
                    script.key_count(),
                    script.arity(),
                    keys.len(),
                    args.len()
                ),
            });
        }

        let mut state = self.state.lock();
        state.trip(FailPoint::Script)?;
        match script {
            Script::AddTask => state.add_task(keys, args),
            Script::DeleteTask => state.delete_task(keys, args),
            Script::UpdateTask => state.update_task(keys, args),
        }
    }
}
