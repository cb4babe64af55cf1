//! C2: the worker-level unit of work and its result slots (§3, §4.2).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::item::InputItem;

/// Terminal status of a completed job.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// Not yet completed.
    Pending,
    /// The coder ran to completion over the whole input.
    Ok,
    /// The caller's cancellation predicate fired before this job was claimed.
    Cancelled,
    /// The coder, or the I/O it depends on, failed; message is human-readable.
    Failed(String),
}

impl JobStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, JobStatus::Ok)
    }
}

/// Written once, by exactly one worker, between the job leaving the shared
/// queue and `completed` being set. Read-only for everyone after that.
#[derive(Debug, Default)]
pub struct JobResult {
    /// The main coder's output. When encryption is enabled this is the
    /// *pre-encryption* compressed bytes — the pack region actually carries
    /// `encrypted_bytes` instead; this field is kept so the folder's first
    /// `CodersUnpackSize` entry can report the main coder's real output
    /// length (§4.6's coder-chain contract).
    pub compressed_bytes: Vec<u8>,
    pub uncompressed_size: u64,
    pub crc: u32,
    pub coder_properties: Vec<u8>,
    /// Set only when the batch's password is set: the AES coder's ciphertext
    /// over `compressed_bytes`, i.e. what actually goes into the pack region.
    pub encrypted_bytes: Option<Vec<u8>>,
    /// The AES coder's property prelude, paired with `encrypted_bytes`.
    pub encryption_properties: Option<Vec<u8>>,
    pub status: JobStatus,
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Pending
    }
}

/// One input item plus its metadata and result slots.
///
/// `input` is behind a `Mutex<Option<_>>` rather than owned outright because
/// the worker that claims this job via the shared channel (see
/// `crate::workers`) needs to `take()` it exactly once; every other job field
/// is immutable after construction except `result`, which follows the same
/// take-once-then-read-only-forever discipline as `input`.
pub struct Job {
    pub index: usize,
    pub input: Mutex<Option<InputItem>>,
    pub name: Option<String>,
    pub declared_size: u64,
    pub attrs: u32,
    pub mtime: Option<u64>,
    pub user_tag: u64,
    pub result: Mutex<JobResult>,
    completed: AtomicBool,
}

impl Job {
    pub fn new(index: usize, item: InputItem) -> Self {
        Self {
            index,
            name: item.name.clone(),
            declared_size: item.declared_size,
            attrs: item.attrs,
            mtime: item.mtime,
            user_tag: item.user_tag,
            input: Mutex::new(Some(item)),
            result: Mutex::new(JobResult::default()),
            completed: AtomicBool::new(false),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Marks the job as terminal. Must only be called by the worker that
    /// claimed it, after `result` has been fully written.
    pub(crate) fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }
}
