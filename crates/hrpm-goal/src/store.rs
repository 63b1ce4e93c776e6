// store.rs - GoalStore trait with in-memory and JSON-file implementations.
//
// The store is the persistence boundary for goals. It provides:
// - point reads and filtered listing
// - compare-and-swap writes keyed on a per-record `version`
// - an atomic batch of conditional writes for the overdue sweep; records
//   whose version moved are reported as conflicts, the rest commit together
// - a shared per-scope "last swept at" marker so sweep debouncing holds
//   across processes that share the store
// - live subscriptions that receive the matching goal set after every change
//
// JsonGoalStore layout: `<dir>/goals/<goal_id>.json` plus `<dir>/sweep.json`.
// Writers hold an exclusive flock on `<dir>/goals/.lock`.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::PerformanceGoal;

/// Which goals a listing or subscription covers. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalFilter {
    pub employee_id: Option<String>,
    /// Status names (see [`GoalStatus::name`](crate::GoalStatus::name)).
    pub statuses: Vec<String>,
}

impl GoalFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_employee(employee_id: impl Into<String>) -> Self {
        Self {
            employee_id: Some(employee_id.into()),
            statuses: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.push(status.into());
        self
    }

    pub fn matches(&self, goal: &PerformanceGoal) -> bool {
        if let Some(employee_id) = &self.employee_id {
            if &goal.employee_id != employee_id {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.iter().any(|s| s == goal.status.name())
    }
}

/// Write `goal` only if the stored copy is still at `expected_version`.
#[derive(Debug, Clone)]
pub struct ConditionalWrite {
    pub goal: PerformanceGoal,
    pub expected_version: u64,
}

/// Result of [`GoalStore::commit_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Goals as stored after the write (versions bumped).
    pub committed: Vec<PerformanceGoal>,
    /// Goals skipped because they changed (or vanished) since they were read.
    pub conflicts: Vec<Uuid>,
}

/// Persistence boundary for performance goals.
pub trait GoalStore: Send + Sync {
    /// Get a goal by ID.
    fn get(&self, goal_id: Uuid) -> Result<Option<PerformanceGoal>, GoalError>;

    /// List goals matching the filter, oldest first.
    fn list(&self, filter: &GoalFilter) -> Result<Vec<PerformanceGoal>, GoalError>;

    /// Store a new goal at version 1.
    fn insert(&self, goal: &PerformanceGoal) -> Result<PerformanceGoal, GoalError>;

    /// Overwrite a goal if its stored version equals `expected_version`.
    /// Returns the stored copy with its new version.
    fn save_if_version(
        &self,
        goal: &PerformanceGoal,
        expected_version: u64,
    ) -> Result<PerformanceGoal, GoalError>;

    /// Apply many conditional writes at once.
    ///
    /// Conflicting writes are dropped and reported; the remaining ones are
    /// written all-or-nothing.
    fn commit_batch(&self, writes: Vec<ConditionalWrite>) -> Result<BatchOutcome, GoalError>;

    /// Claim the sweep marker for `scope_key`.
    ///
    /// Returns `false` (and changes nothing) if another sweep of the same
    /// scope was claimed less than `cooldown` before `now`.
    fn claim_sweep(
        &self,
        scope_key: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool, GoalError>;

    /// Subscribe to a live query. The receiver gets the current matching set
    /// immediately and again after every change to the store.
    fn subscribe(&self, filter: GoalFilter) -> Result<Receiver<Vec<PerformanceGoal>>, GoalError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, GoalError> {
    mutex
        .lock()
        .map_err(|_| GoalError::StoreUnavailable("goal store lock poisoned".to_string()))
}

/// Exclusive advisory lock on a lock file. Released when dropped.
struct FileLock {
    _file: File,
}

impl FileLock {
    /// Block until the lock at `path` is ours, creating the file if needed.
    fn acquire(path: &Path) -> Result<Self, GoalError> {
        let io_error = |source: io::Error| GoalError::IoError {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_error)?;
        flock_exclusive(&file).map_err(io_error)?;
        Ok(Self { _file: file })
    }
}

fn flock_exclusive(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        loop {
            // SAFETY: `fd` belongs to `file`, which outlives this call.
            #[allow(unsafe_code)]
            let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(())
    }
}

fn marker_is_fresh(
    last: Option<&DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    last.is_some_and(|last| now - *last < cooldown)
}

struct Subscription {
    filter: GoalFilter,
    tx: Sender<Vec<PerformanceGoal>>,
}

/// Live-query subscribers. Dropped receivers are pruned on the next notify.
#[derive(Default)]
struct Watchers {
    subs: Mutex<Vec<Subscription>>,
}

impl Watchers {
    fn add(
        &self,
        filter: GoalFilter,
        current: &[PerformanceGoal],
    ) -> Result<Receiver<Vec<PerformanceGoal>>, GoalError> {
        let (tx, rx) = mpsc::channel();
        let initial = current.iter().filter(|g| filter.matches(g)).cloned().collect();
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(initial);
        lock(&self.subs)?.push(Subscription { filter, tx });
        Ok(rx)
    }

    fn notify(&self, all: &[PerformanceGoal]) {
        let Ok(mut subs) = self.subs.lock() else {
            return;
        };
        subs.retain(|sub| {
            let matching = all.iter().filter(|g| sub.filter.matches(g)).cloned().collect();
            sub.tx.send(matching).is_ok()
        });
    }

    fn is_empty(&self) -> bool {
        self.subs.lock().map(|s| s.is_empty()).unwrap_or(true)
    }
}

fn sorted(mut goals: Vec<PerformanceGoal>) -> Vec<PerformanceGoal> {
    goals.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.goal_id.cmp(&b.goal_id))
    });
    goals
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    goals: BTreeMap<Uuid, PerformanceGoal>,
    sweep_marks: HashMap<String, DateTime<Utc>>,
}

/// Mutex-protected in-memory store. Useful for tests and single-process use.
#[derive(Default)]
pub struct MemoryGoalStore {
    state: Mutex<MemoryState>,
    watchers: Watchers,
}

impl MemoryGoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, state: &MemoryState) {
        if self.watchers.is_empty() {
            return;
        }
        let all = sorted(state.goals.values().cloned().collect());
        self.watchers.notify(&all);
    }
}

impl GoalStore for MemoryGoalStore {
    fn get(&self, goal_id: Uuid) -> Result<Option<PerformanceGoal>, GoalError> {
        Ok(lock(&self.state)?.goals.get(&goal_id).cloned())
    }

    fn list(&self, filter: &GoalFilter) -> Result<Vec<PerformanceGoal>, GoalError> {
        let state = lock(&self.state)?;
        Ok(sorted(
            state
                .goals
                .values()
                .filter(|g| filter.matches(g))
                .cloned()
                .collect(),
        ))
    }

    fn insert(&self, goal: &PerformanceGoal) -> Result<PerformanceGoal, GoalError> {
        let mut state = lock(&self.state)?;
        if state.goals.contains_key(&goal.goal_id) {
            return Err(GoalError::AlreadyExists(goal.goal_id));
        }
        let mut stored = goal.clone();
        stored.version = 1;
        state.goals.insert(stored.goal_id, stored.clone());
        self.publish(&state);
        Ok(stored)
    }

    fn save_if_version(
        &self,
        goal: &PerformanceGoal,
        expected_version: u64,
    ) -> Result<PerformanceGoal, GoalError> {
        let mut state = lock(&self.state)?;
        let found = state
            .goals
            .get(&goal.goal_id)
            .map(|g| g.version)
            .ok_or(GoalError::NotFound(goal.goal_id))?;
        if found != expected_version {
            return Err(GoalError::VersionConflict {
                goal_id: goal.goal_id,
                expected: expected_version,
                found,
            });
        }
        let mut stored = goal.clone();
        stored.version = found + 1;
        state.goals.insert(stored.goal_id, stored.clone());
        self.publish(&state);
        Ok(stored)
    }

    fn commit_batch(&self, writes: Vec<ConditionalWrite>) -> Result<BatchOutcome, GoalError> {
        let mut state = lock(&self.state)?;
        let mut outcome = BatchOutcome::default();

        for write in writes {
            match state.goals.get(&write.goal.goal_id) {
                Some(current) if current.version == write.expected_version => {
                    let mut stored = write.goal;
                    stored.version = write.expected_version + 1;
                    outcome.committed.push(stored);
                }
                _ => outcome.conflicts.push(write.goal.goal_id),
            }
        }

        // Nothing can fail past this point, so the batch lands as a unit.
        for goal in &outcome.committed {
            state.goals.insert(goal.goal_id, goal.clone());
        }
        if !outcome.committed.is_empty() {
            self.publish(&state);
        }
        Ok(outcome)
    }

    fn claim_sweep(
        &self,
        scope_key: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool, GoalError> {
        let mut state = lock(&self.state)?;
        if marker_is_fresh(state.sweep_marks.get(scope_key), now, cooldown) {
            return Ok(false);
        }
        state.sweep_marks.insert(scope_key.to_string(), now);
        Ok(true)
    }

    fn subscribe(&self, filter: GoalFilter) -> Result<Receiver<Vec<PerformanceGoal>>, GoalError> {
        let state = lock(&self.state)?;
        let all = sorted(state.goals.values().cloned().collect());
        self.watchers.add(filter, &all)
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// One JSON file per goal.
///
/// Writers are serialized by an internal lock within the process and by an
/// exclusive flock on `goals/.lock` across processes, held from the version
/// read to the final rename. Batch writes stage every file as `<id>.json.tmp` first and only then rename them into
/// place, restoring the previous contents if a rename fails midway.
pub struct JsonGoalStore {
    goals_dir: PathBuf,
    sweep_file: PathBuf,
    lock_file: PathBuf,
    write_lock: Mutex<()>,
    watchers: Watchers,
}

impl JsonGoalStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, GoalError> {
        let dir = dir.as_ref().to_path_buf();
        let goals_dir = dir.join("goals");
        fs::create_dir_all(&goals_dir).map_err(|source| GoalError::IoError {
            path: goals_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_file: goals_dir.join(".lock"),
            goals_dir,
            sweep_file: dir.join("sweep.json"),
            write_lock: Mutex::new(()),
            watchers: Watchers::default(),
        })
    }

    /// Serialize against writers in this process, then in other processes.
    fn lock_writers(&self) -> Result<(MutexGuard<'_, ()>, FileLock), GoalError> {
        let local = lock(&self.write_lock)?;
        let shared = FileLock::acquire(&self.lock_file)?;
        Ok((local, shared))
    }

    fn goal_file(&self, goal_id: Uuid) -> PathBuf {
        self.goals_dir.join(format!("{}.json", goal_id))
    }

    fn staged_file(&self, goal_id: Uuid) -> PathBuf {
        self.goals_dir.join(format!("{}.json.tmp", goal_id))
    }

    fn read_goal(&self, path: &Path) -> Result<Option<PerformanceGoal>, GoalError> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path).map_err(|source| GoalError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map(Some).map_err(|e| {
            tracing::error!(path = %path.display(), "goal file is not valid JSON: {}", e);
            GoalError::from(e)
        })
    }

    fn read_all(&self) -> Result<Vec<PerformanceGoal>, GoalError> {
        let entries = fs::read_dir(&self.goals_dir).map_err(|source| GoalError::IoError {
            path: self.goals_dir.clone(),
            source,
        })?;

        let mut goals = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| GoalError::IoError {
                path: self.goals_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(goal) = self.read_goal(&path)? {
                    goals.push(goal);
                }
            }
        }
        Ok(sorted(goals))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<(), GoalError> {
        fs::write(path, contents).map_err(|source| GoalError::IoError {
            path: path.to_path_buf(),
            source,
        })
    }

    fn publish(&self) {
        if self.watchers.is_empty() {
            return;
        }
        match self.read_all() {
            Ok(all) => self.watchers.notify(&all),
            Err(e) => tracing::warn!("failed to refresh goal subscribers: {}", e),
        }
    }

    /// Stage, then rename, every goal in `goals`. All or nothing.
    fn write_atomically(&self, goals: &[PerformanceGoal]) -> Result<(), GoalError> {
        let mut staged = Vec::with_capacity(goals.len());
        for goal in goals {
            let tmp = self.staged_file(goal.goal_id);
            let result = serde_json::to_string_pretty(goal)
                .map_err(GoalError::from)
                .and_then(|json| self.write_file(&tmp, &json));
            if let Err(e) = result {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
            staged.push((tmp, self.goal_file(goal.goal_id)));
        }

        let mut previous: Vec<(PathBuf, Option<String>)> = Vec::with_capacity(staged.len());
        for (idx, (tmp, target)) in staged.iter().enumerate() {
            let before = fs::read_to_string(target).ok();
            if let Err(source) = fs::rename(tmp, target) {
                for (path, contents) in &previous {
                    let _ = match contents {
                        Some(contents) => fs::write(path, contents),
                        None => fs::remove_file(path),
                    };
                }
                for (tmp, _) in &staged[idx..] {
                    let _ = fs::remove_file(tmp);
                }
                return Err(GoalError::IoError {
                    path: target.clone(),
                    source,
                });
            }
            previous.push((target.clone(), before));
        }
        Ok(())
    }

    fn read_sweep_marks(&self) -> Result<HashMap<String, DateTime<Utc>>, GoalError> {
        if !self.sweep_file.exists() {
            return Ok(HashMap::new());
        }
        let json = fs::read_to_string(&self.sweep_file).map_err(|source| GoalError::IoError {
            path: self.sweep_file.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl GoalStore for JsonGoalStore {
    fn get(&self, goal_id: Uuid) -> Result<Option<PerformanceGoal>, GoalError> {
        self.read_goal(&self.goal_file(goal_id))
    }

    fn list(&self, filter: &GoalFilter) -> Result<Vec<PerformanceGoal>, GoalError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|g| filter.matches(g))
            .collect())
    }

    fn insert(&self, goal: &PerformanceGoal) -> Result<PerformanceGoal, GoalError> {
        let _guard = self.lock_writers()?;
        if self.goal_file(goal.goal_id).exists() {
            return Err(GoalError::AlreadyExists(goal.goal_id));
        }
        let mut stored = goal.clone();
        stored.version = 1;
        self.write_atomically(std::slice::from_ref(&stored))?;
        self.publish();
        Ok(stored)
    }

    fn save_if_version(
        &self,
        goal: &PerformanceGoal,
        expected_version: u64,
    ) -> Result<PerformanceGoal, GoalError> {
        let _guard = self.lock_writers()?;
        let current = self
            .get(goal.goal_id)?
            .ok_or(GoalError::NotFound(goal.goal_id))?;
        if current.version != expected_version {
            return Err(GoalError::VersionConflict {
                goal_id: goal.goal_id,
                expected: expected_version,
                found: current.version,
            });
        }
        let mut stored = goal.clone();
        stored.version = current.version + 1;
        self.write_atomically(std::slice::from_ref(&stored))?;
        self.publish();
        Ok(stored)
    }

    fn commit_batch(&self, writes: Vec<ConditionalWrite>) -> Result<BatchOutcome, GoalError> {
        let _guard = self.lock_writers()?;
        let mut outcome = BatchOutcome::default();

        for write in writes {
            match self.get(write.goal.goal_id)? {
                Some(current) if current.version == write.expected_version => {
                    let mut stored = write.goal;
                    stored.version = write.expected_version + 1;
                    outcome.committed.push(stored);
                }
                _ => outcome.conflicts.push(write.goal.goal_id),
            }
        }

        if !outcome.committed.is_empty() {
            self.write_atomically(&outcome.committed)?;
            self.publish();
        }
        Ok(outcome)
    }

    fn claim_sweep(
        &self,
        scope_key: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool, GoalError> {
        let _guard = self.lock_writers()?;
        let mut marks = self.read_sweep_marks()?;
        if marker_is_fresh(marks.get(scope_key), now, cooldown) {
            return Ok(false);
        }
        marks.insert(scope_key.to_string(), now);

        let tmp = self.sweep_file.with_extension("json.tmp");
        self.write_file(&tmp, &serde_json::to_string_pretty(&marks)?)?;
        fs::rename(&tmp, &self.sweep_file).map_err(|source| GoalError::IoError {
            path: self.sweep_file.clone(),
            source,
        })?;
        Ok(true)
    }

    fn subscribe(&self, filter: GoalFilter) -> Result<Receiver<Vec<PerformanceGoal>>, GoalError> {
        let all = self.read_all()?;
        self.watchers.add(filter, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::tests::{goal_between, now, today};
    use crate::goal::GoalStatus;
    use tempfile::tempdir;

    fn sample(employee: &str) -> PerformanceGoal {
        let mut goal = goal_between(today(), today() + Duration::days(10), 10.0);
        goal.employee_id = employee.to_string();
        goal
    }

    fn stores() -> (tempfile::TempDir, Vec<Box<dyn GoalStore>>) {
        let dir = tempdir().unwrap();
        let json = JsonGoalStore::new(dir.path()).unwrap();
        (dir, vec![Box::new(MemoryGoalStore::new()), Box::new(json)])
    }

    #[test]
    fn insert_sets_version_one_and_rejects_duplicates() {
        let (_dir, stores) = stores();
        for store in stores {
            let goal = sample("emp-1");
            let stored = store.insert(&goal).unwrap();
            assert_eq!(stored.version, 1);
            assert!(matches!(store.insert(&goal), Err(GoalError::AlreadyExists(_))));
            assert_eq!(store.get(goal.goal_id).unwrap().unwrap().version, 1);
        }
    }

    #[test]
    fn save_if_version_detects_stale_writer() {
        let (_dir, stores) = stores();
        for store in stores {
            let stored = store.insert(&sample("emp-1")).unwrap();

            let mut first = stored.clone();
            first.apply_progress(2.0, None, now()).unwrap();
            let saved = store.save_if_version(&first, stored.version).unwrap();
            assert_eq!(saved.version, 2);

            let mut stale = stored.clone();
            stale.cancel(now()).unwrap();
            let result = store.save_if_version(&stale, stored.version);
            assert!(matches!(
                result,
                Err(GoalError::VersionConflict {
                    expected: 1,
                    found: 2,
                    ..
                })
            ));
            let current = store.get(stored.goal_id).unwrap().unwrap();
            assert_eq!(current.status, GoalStatus::InProgress);
        }
    }

    #[test]
    fn save_if_version_on_missing_goal_is_not_found() {
        let (_dir, stores) = stores();
        for store in stores {
            let goal = sample("emp-1");
            assert!(matches!(
                store.save_if_version(&goal, 1),
                Err(GoalError::NotFound(_))
            ));
        }
    }

    #[test]
    fn commit_batch_skips_conflicts_and_commits_rest() {
        let (_dir, stores) = stores();
        for store in stores {
            let a = store.insert(&sample("emp-1")).unwrap();
            let b = store.insert(&sample("emp-1")).unwrap();

            // Someone updates `b` between read and batch write.
            let mut concurrent = b.clone();
            concurrent.apply_progress(10.0, None, now()).unwrap();
            store.save_if_version(&concurrent, b.version).unwrap();

            let mut a2 = a.clone();
            a2.cancel(now()).unwrap();
            let mut b2 = b.clone();
            b2.cancel(now()).unwrap();

            let outcome = store
                .commit_batch(vec![
                    ConditionalWrite {
                        goal: a2,
                        expected_version: a.version,
                    },
                    ConditionalWrite {
                        goal: b2,
                        expected_version: b.version,
                    },
                ])
                .unwrap();

            assert_eq!(outcome.committed.len(), 1);
            assert_eq!(outcome.conflicts, vec![b.goal_id]);
            assert_eq!(
                store.get(a.goal_id).unwrap().unwrap().status,
                GoalStatus::Cancelled
            );
            assert_eq!(
                store.get(b.goal_id).unwrap().unwrap().status,
                GoalStatus::Completed
            );
        }
    }

    #[test]
    fn list_filters_by_employee_and_status() {
        let (_dir, stores) = stores();
        for store in stores {
            store.insert(&sample("emp-1")).unwrap();
            let other = store.insert(&sample("emp-2")).unwrap();
            let mut cancelled = other.clone();
            cancelled.cancel(now()).unwrap();
            store.save_if_version(&cancelled, other.version).unwrap();

            assert_eq!(store.list(&GoalFilter::all()).unwrap().len(), 2);
            assert_eq!(store.list(&GoalFilter::for_employee("emp-1")).unwrap().len(), 1);
            let filter = GoalFilter::all().with_status("cancelled");
            let listed = store.list(&filter).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].employee_id, "emp-2");
        }
    }

    #[test]
    fn claim_sweep_honours_cooldown_per_scope() {
        let (_dir, stores) = stores();
        for store in stores {
            let cooldown = Duration::seconds(60);
            assert!(store.claim_sweep("all", now(), cooldown).unwrap());
            assert!(!store
                .claim_sweep("all", now() + Duration::seconds(30), cooldown)
                .unwrap());
            assert!(store
                .claim_sweep("employee:emp-1", now() + Duration::seconds(30), cooldown)
                .unwrap());
            assert!(store
                .claim_sweep("all", now() + Duration::seconds(61), cooldown)
                .unwrap());
        }
    }

    #[test]
    fn subscription_receives_initial_and_updated_sets() {
        let (_dir, stores) = stores();
        for store in stores {
            let existing = store.insert(&sample("emp-1")).unwrap();
            let rx = store.subscribe(GoalFilter::for_employee("emp-1")).unwrap();
            assert_eq!(rx.recv().unwrap().len(), 1);

            store.insert(&sample("emp-2")).unwrap();
            // A change elsewhere still pushes the (unchanged) matching set.
            assert_eq!(rx.recv().unwrap().len(), 1);

            store.insert(&sample("emp-1")).unwrap();
            let latest = rx.recv().unwrap();
            assert_eq!(latest.len(), 2);
            assert!(latest.iter().any(|g| g.goal_id == existing.goal_id));
        }
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let goal = sample("emp-1");
        {
            let store = JsonGoalStore::new(dir.path()).unwrap();
            store.insert(&goal).unwrap();
            store.claim_sweep("all", now(), Duration::seconds(60)).unwrap();
        }
        let store = JsonGoalStore::new(dir.path()).unwrap();
        let found = store.get(goal.goal_id).unwrap().unwrap();
        assert_eq!(found.title, goal.title);
        assert!(!store
            .claim_sweep("all", now() + Duration::seconds(1), Duration::seconds(60))
            .unwrap());
    }

    #[test]
    fn json_store_leaves_no_staged_files() {
        let dir = tempdir().unwrap();
        let store = JsonGoalStore::new(dir.path()).unwrap();
        let a = store.insert(&sample("emp-1")).unwrap();
        let mut a2 = a.clone();
        a2.cancel(now()).unwrap();
        store
            .commit_batch(vec![ConditionalWrite {
                goal: a2,
                expected_version: a.version,
            }])
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("goals"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn json_store_rejects_corrupt_goal_file_in_listing() {
        let dir = tempdir().unwrap();
        let store = JsonGoalStore::new(dir.path()).unwrap();
        store.insert(&sample("emp-1")).unwrap();
        fs::write(dir.path().join("goals").join("broken.json"), "{ not json").unwrap();

        assert!(matches!(
            store.list(&GoalFilter::all()),
            Err(GoalError::SerializationError(_))
        ));
        assert!(store.subscribe(GoalFilter::all()).is_err());
    }

    #[test]
    fn json_store_instances_sharing_a_dir_serialize_compare_and_swap() {
        let dir = tempdir().unwrap();
        let first = JsonGoalStore::new(dir.path()).unwrap();
        let second = JsonGoalStore::new(dir.path()).unwrap();

        for _ in 0..25 {
            let stored = first.insert(&sample("emp-1")).unwrap();
            let barrier = std::sync::Barrier::new(2);

            let (completed, cancelled) = std::thread::scope(|s| {
                let complete = s.spawn(|| {
                    let mut goal = first.get(stored.goal_id).unwrap().unwrap();
                    goal.apply_progress(10.0, None, now()).unwrap();
                    barrier.wait();
                    first.save_if_version(&goal, stored.version)
                });
                let cancel = s.spawn(|| {
                    let mut goal = second.get(stored.goal_id).unwrap().unwrap();
                    goal.cancel(now()).unwrap();
                    barrier.wait();
                    second.save_if_version(&goal, stored.version)
                });
                (complete.join().unwrap(), cancel.join().unwrap())
            });

            assert_eq!(
                completed.is_ok() as u8 + cancelled.is_ok() as u8,
                1,
                "exactly one writer may win"
            );
            let loser = if completed.is_ok() { cancelled } else { completed };
            assert!(matches!(
                loser,
                Err(GoalError::VersionConflict {
                    expected: 1,
                    found: 2,
                    ..
                })
            ));
            let current = second.get(stored.goal_id).unwrap().unwrap();
            assert_eq!(current.version, 2);
        }
    }

    #[test]
    fn json_store_instances_sharing_a_dir_claim_sweep_once() {
        let dir = tempdir().unwrap();
        let stores: Vec<JsonGoalStore> = (0..4)
            .map(|_| JsonGoalStore::new(dir.path()).unwrap())
            .collect();
        let barrier = std::sync::Barrier::new(stores.len());

        let claims: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = stores
                .iter()
                .map(|store| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        store
                            .claim_sweep("all", now(), Duration::seconds(60))
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(claims.iter().filter(|claimed| **claimed).count(), 1);
    }
}
