// store.rs - Persistence for rules, exceptions and meetings.
//
// The whole schedule is one document. Every change goes through
// `ScheduleStore::commit`, which applies a batch of operations to a copy and
// swaps it in only if every operation succeeded. Meeting approval relies on
// this: the status change and the reservation land together or not at all.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::availability::{compute_slots, AvailabilityRule, UnavailabilityException};
use crate::error::ScheduleError;
use crate::interval::TimeInterval;
use crate::meeting::Meeting;

/// Everything the scheduling engine persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub rules: Vec<AvailabilityRule>,
    #[serde(default)]
    pub exceptions: Vec<UnavailabilityException>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
}

impl ScheduleDocument {
    pub fn meeting(&self, meeting_id: Uuid) -> Option<&Meeting> {
        self.meetings.iter().find(|m| m.meeting_id == meeting_id)
    }

    /// Bookable slots for one owner on `date`.
    pub fn slots_for(&self, owner_id: &str, date: NaiveDate) -> Vec<TimeInterval> {
        let rules: Vec<AvailabilityRule> = self
            .rules
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        let exceptions: Vec<UnavailabilityException> = self
            .exceptions
            .iter()
            .filter(|e| e.owner_id == owner_id && e.date == date)
            .cloned()
            .collect();
        compute_slots(&rules, &exceptions, date)
    }

    fn apply(&mut self, op: ScheduleOp) -> Result<(), ScheduleError> {
        match op {
            ScheduleOp::PutRule(rule) => {
                if self.rules.iter().any(|r| r.rule_id == rule.rule_id) {
                    return Err(ScheduleError::AlreadyExists(rule.rule_id));
                }
                self.rules.push(rule);
            }
            ScheduleOp::DeleteRule(rule_id) => {
                let before = self.rules.len();
                self.rules.retain(|r| r.rule_id != rule_id);
                if self.rules.len() == before {
                    return Err(ScheduleError::RuleNotFound(rule_id));
                }
            }
            ScheduleOp::PutException(exception) => {
                if self
                    .exceptions
                    .iter()
                    .any(|e| e.exception_id == exception.exception_id)
                {
                    return Err(ScheduleError::AlreadyExists(exception.exception_id));
                }
                self.exceptions.push(exception);
            }
            ScheduleOp::Reserve(exception) => {
                if let Some(existing) = self.exceptions.iter().find(|e| {
                    e.blocks(&exception.owner_id, exception.date, &exception.interval)
                }) {
                    return Err(ScheduleError::SlotConflict {
                        date: exception.date,
                        interval: exception.interval.to_string(),
                        exception_id: existing.exception_id,
                    });
                }
                self.exceptions.push(exception);
            }
            ScheduleOp::DeleteException(exception_id) => {
                let before = self.exceptions.len();
                self.exceptions.retain(|e| e.exception_id != exception_id);
                if self.exceptions.len() == before {
                    return Err(ScheduleError::ExceptionNotFound(exception_id));
                }
            }
            ScheduleOp::ReleaseMeeting(meeting_id) => {
                self.exceptions
                    .retain(|e| e.meeting_id != Some(meeting_id));
            }
            ScheduleOp::InsertMeeting(mut meeting) => {
                if self.meeting(meeting.meeting_id).is_some() {
                    return Err(ScheduleError::AlreadyExists(meeting.meeting_id));
                }
                meeting.version = 1;
                self.meetings.push(meeting);
            }
            ScheduleOp::UpdateMeeting {
                mut meeting,
                expected_version,
            } => {
                let slot = self
                    .meetings
                    .iter_mut()
                    .find(|m| m.meeting_id == meeting.meeting_id)
                    .ok_or(ScheduleError::MeetingNotFound(meeting.meeting_id))?;
                if slot.version != expected_version {
                    return Err(ScheduleError::VersionConflict {
                        meeting_id: meeting.meeting_id,
                        expected: expected_version,
                        found: slot.version,
                    });
                }
                meeting.version = expected_version + 1;
                *slot = meeting;
            }
        }
        Ok(())
    }

    /// Apply every operation to a copy; replace `self` only if all succeed.
    pub fn apply_batch(&mut self, batch: ScheduleBatch) -> Result<(), ScheduleError> {
        let mut next = self.clone();
        for op in batch.ops {
            next.apply(op)?;
        }
        *self = next;
        Ok(())
    }
}

/// One change inside a [`ScheduleBatch`].
#[derive(Debug, Clone)]
pub enum ScheduleOp {
    PutRule(AvailabilityRule),
    DeleteRule(Uuid),
    PutException(UnavailabilityException),
    /// Insert an exception, failing with `SlotConflict` if the owner already
    /// has an overlapping exception on that date.
    Reserve(UnavailabilityException),
    DeleteException(Uuid),
    /// Drop every exception linked to this meeting.
    ReleaseMeeting(Uuid),
    InsertMeeting(Meeting),
    UpdateMeeting { meeting: Meeting, expected_version: u64 },
}

/// Operations committed together, in order, all or nothing.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBatch {
    ops: Vec<ScheduleOp>,
}

impl ScheduleBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, op: ScheduleOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Append every operation of `other` after this batch's own.
    pub fn append(mut self, other: ScheduleBatch) -> Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn put_rule(self, rule: AvailabilityRule) -> Self {
        self.push(ScheduleOp::PutRule(rule))
    }

    pub fn delete_rule(self, rule_id: Uuid) -> Self {
        self.push(ScheduleOp::DeleteRule(rule_id))
    }

    pub fn put_exception(self, exception: UnavailabilityException) -> Self {
        self.push(ScheduleOp::PutException(exception))
    }

    pub fn reserve(self, exception: UnavailabilityException) -> Self {
        self.push(ScheduleOp::Reserve(exception))
    }

    pub fn delete_exception(self, exception_id: Uuid) -> Self {
        self.push(ScheduleOp::DeleteException(exception_id))
    }

    pub fn release_meeting(self, meeting_id: Uuid) -> Self {
        self.push(ScheduleOp::ReleaseMeeting(meeting_id))
    }

    pub fn insert_meeting(self, meeting: Meeting) -> Self {
        self.push(ScheduleOp::InsertMeeting(meeting))
    }

    pub fn update_meeting(self, meeting: Meeting, expected_version: u64) -> Self {
        self.push(ScheduleOp::UpdateMeeting {
            meeting,
            expected_version,
        })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Persistence boundary for the schedule document.
pub trait ScheduleStore: Send + Sync {
    /// Snapshot of the current document.
    fn load(&self) -> Result<ScheduleDocument, ScheduleError>;

    /// Apply `batch` atomically.
    fn commit(&self, batch: ScheduleBatch) -> Result<(), ScheduleError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ScheduleError> {
    mutex
        .lock()
        .map_err(|_| ScheduleError::StoreUnavailable("schedule store lock poisoned".to_string()))
}

/// Exclusive advisory lock on `<file>.lock`, released on drop.
struct CommitLock {
    _file: File,
}

impl CommitLock {
    fn acquire(path: &Path) -> Result<Self, ScheduleError> {
        let io_error = |source: io::Error| ScheduleError::IoError {
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

/// In-memory schedule store.
#[derive(Default)]
pub struct MemoryScheduleStore {
    doc: Mutex<ScheduleDocument>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn load(&self) -> Result<ScheduleDocument, ScheduleError> {
        Ok(lock(&self.doc)?.clone())
    }

    fn commit(&self, batch: ScheduleBatch) -> Result<(), ScheduleError> {
        lock(&self.doc)?.apply_batch(batch)
    }
}

/// The schedule as a single pretty-printed JSON file.
///
/// Commits write `<file>.tmp` and rename it over the original, so readers
/// see either the old or the new document. Commits are serialized by an
/// internal lock within the process and by an exclusive flock on
/// `<file>.lock` across processes, held from the read to the rename.
pub struct JsonScheduleStore {
    path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonScheduleStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ScheduleError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            lock_path: path.with_extension("json.lock"),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ScheduleDocument, ScheduleError> {
        if !self.path.exists() {
            return Ok(ScheduleDocument::default());
        }
        let json = fs::read_to_string(&self.path).map_err(|source| ScheduleError::IoError {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write(&self, doc: &ScheduleDocument) -> Result<(), ScheduleError> {
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(&tmp, json).map_err(|source| ScheduleError::IoError {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            ScheduleError::IoError {
                path: self.path.clone(),
                source,
            }
        })
    }
}

impl ScheduleStore for JsonScheduleStore {
    fn load(&self) -> Result<ScheduleDocument, ScheduleError> {
        self.read()
    }

    fn commit(&self, batch: ScheduleBatch) -> Result<(), ScheduleError> {
        let _local = lock(&self.write_lock)?;
        let _shared = CommitLock::acquire(&self.lock_path)?;
        let mut doc = self.read()?;
        doc.apply_batch(batch)?;
        self.write(&doc)
    }
}
