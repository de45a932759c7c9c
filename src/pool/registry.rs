use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use super::types::{ProvisionedWorker, WorkerRecord, WorkerState};

/// Everything guarded by `PoolSupervisor::pool_lock`.
///
/// Every method here takes `&mut self` and is synchronous: no method on this type may
/// ever `.await`. That is enforced structurally, not just by convention, because the
/// only lock ever taken over a `PoolState` is a [`std::sync::Mutex`], whose guard is
/// not `Send`, so holding one across an await point is a compile error, not a review
/// comment.
pub struct PoolState {
    registry: HashMap<String, WorkerRecord>,
    valid_queue: VecDeque<String>,
    valid_set: HashSet<String>,
    pending_repairs: HashSet<String>,
    pending_creates: usize,
    needs_restart: HashSet<String>,
    epoch: Instant,
    /// Bumped by `reset()`. Lets the worker loop recognize and discard results for
    /// tasks enqueued against a pool state that has since been cleared, standing in
    /// for literally draining the channel on `reset`.
    generation: u64,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            valid_queue: VecDeque::new(),
            valid_set: HashSet::new(),
            pending_repairs: HashSet::new(),
            pending_creates: 0,
            needs_restart: HashSet::new(),
            epoch: Instant::now(),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // READS
    // ============================================================================

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_set.len()
    }

    pub fn pending_creates(&self) -> usize {
        self.pending_creates
    }

    pub fn pending_repairs(&self) -> usize {
        self.pending_repairs.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&WorkerRecord> {
        self.registry.get(name)
    }

    /// Snapshot copy of the full registry, for `list()`.
    pub fn snapshot(&self) -> HashMap<String, WorkerRecord> {
        self.registry.clone()
    }

    /// Names requiring sweep attention: the union of `needs_restart` and any record
    /// whose state is not `valid`.
    pub fn names_needing_sweep(&self) -> Vec<String> {
        let mut names: HashSet<String> = self.needs_restart.clone();
        names.extend(
            self.registry
                .iter()
                .filter(|(_, record)| record.state != WorkerState::Valid)
                .map(|(name, _)| name.clone()),
        );
        names.into_iter().collect()
    }

    // READINESS INDEX
    // ============================================================================

    /// Pops the front of `valid_queue` until it finds a name that is both present in
    /// `valid_set` and `valid` in the registry, rotating it to the back and returning
    /// a snapshot copy. Drops stale entries found along the way. Never suspends.
    pub fn acquire_valid(&mut self) -> Option<WorkerRecord> {
        while let Some(name) = self.valid_queue.pop_front() {
            if !self.valid_set.contains(&name) {
                continue;
            }
            match self.registry.get(&name) {
                Some(record) if record.state == WorkerState::Valid => {
                    let snapshot = record.clone();
                    self.valid_queue.push_back(name);
                    return Some(snapshot);
                }
                _ => continue,
            }
        }
        None
    }

    /// Upserts `provisioned` as `valid`, de-duplicates its position in `valid_queue`,
    /// and clears it from the restart/repair bookkeeping sets.
    pub fn store_valid(&mut self, provisioned: ProvisionedWorker) -> WorkerRecord {
        let name = provisioned.name.clone();
        self.valid_queue.retain(|n| n != &name);

        let record = match self.registry.get_mut(&name) {
            Some(existing) => {
                existing.touch(provisioned, self.epoch);
                existing.clone()
            }
            None => {
                let record = WorkerRecord::new(provisioned, self.epoch);
                self.registry.insert(name.clone(), record.clone());
                record
            }
        };

        self.valid_queue.push_back(name.clone());
        self.valid_set.insert(name.clone());
        self.needs_restart.remove(&name);
        self.pending_repairs.remove(&name);
        record
    }

    // MUTATIONS (called only from within PoolSupervisor methods while the lock is
    // held)
    // ============================================================================

    pub fn mark_invalid(&mut self, name: &str) {
        if let Some(record) = self.registry.get_mut(name) {
            record.state = WorkerState::Invalid;
        }
        self.valid_set.remove(name);
    }

    pub fn flag_needs_restart(&mut self, name: &str) {
        self.needs_restart.insert(name.to_string());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let existed = self.registry.remove(name).is_some();
        self.valid_set.remove(name);
        self.needs_restart.remove(name);
        self.pending_repairs.remove(name);
        self.valid_queue.retain(|n| n != name);
        existed
    }

    pub fn clear(&mut self) {
        self.registry.clear();
        self.valid_queue.clear();
        self.valid_set.clear();
        self.pending_repairs.clear();
        self.pending_creates = 0;
        self.needs_restart.clear();
        self.generation += 1;
    }

    pub fn try_reserve_create(&mut self, target_size: usize) -> bool {
        if self.registry.len() + self.pending_creates < target_size {
            self.pending_creates += 1;
            true
        } else {
            false
        }
    }

    pub fn release_create_reservation(&mut self) {
        self.pending_creates = self.pending_creates.saturating_sub(1);
    }
}

impl Default for PoolState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioned(name: &str, ip: &str) -> ProvisionedWorker {
        ProvisionedWorker {
            name: name.to_string(),
            container_id: format!("cid-{name}"),
            proxy_port: 9000,
            proxy_url: "http://127.0.0.1:9000".to_string(),
            ip_seen: ip.to_string(),
        }
    }

    #[test]
    fn round_robin_cycles_through_valid_workers() {
        let mut state = PoolState::new();
        state.store_valid(provisioned("w-1", "10.0.0.1"));
        state.store_valid(provisioned("w-2", "10.0.0.2"));

        let first = state.acquire_valid().unwrap();
        let second = state.acquire_valid().unwrap();
        let third = state.acquire_valid().unwrap();

        assert_eq!(first.name, "w-1");
        assert_eq!(second.name, "w-2");
        assert_eq!(third.name, "w-1");
    }

    #[test]
    fn acquire_skips_stale_entries_and_drains_to_none() {
        let mut state = PoolState::new();
        state.store_valid(provisioned("w-1", "10.0.0.1"));
        state.mark_invalid("w-1");

        assert!(state.acquire_valid().is_none());
    }

    #[test]
    fn store_valid_deduplicates_queue_position() {
        let mut state = PoolState::new();
        state.store_valid(provisioned("w-1", "10.0.0.1"));
        state.store_valid(provisioned("w-2", "10.0.0.2"));
        state.store_valid(provisioned("w-1", "10.0.0.3"));

        let first = state.acquire_valid().unwrap();
        assert_eq!(first.name, "w-2");
        let second = state.acquire_valid().unwrap();
        assert_eq!(second.name, "w-1");
        assert_eq!(second.ip_seen, "10.0.0.3");
    }

    #[test]
    fn schedule_restart_removes_from_valid_set() {
        let mut state = PoolState::new();
        state.store_valid(provisioned("w-1", "10.0.0.1"));
        state.mark_invalid("w-1");
        state.flag_needs_restart("w-1");

        assert!(!state.valid_set.contains("w-1"));
        assert!(state.needs_restart.contains("w-1"));
    }
}
