//! C3: the worker pool. A fixed set of threads, spawned lazily on first use
//! and reused across batches, that pull job indices off a shared channel —
//! the channel itself doubling as both the atomic cursor and the "go" signal
//! (§4.3's remapping note, §9's "shared job index" Open Question).

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::coder::CoderFactory;
use crate::crc::CrcReader;
use crate::error::ArchiverError;
use crate::job::{Job, JobStatus};
use crate::progress::ProgressCallbacks;
use crate::stats::Statistics;

/// One unit of work handed to a worker thread: the job to run, plus the
/// per-batch context it needs to run it.
struct Task {
    job: Arc<Job>,
    factory: Arc<dyn CoderFactory>,
    level: u8,
    method_id: u64,
    password_utf16le: Option<Arc<Vec<u8>>>,
    callbacks: Arc<dyn ProgressCallbacks>,
    stats: Arc<Statistics>,
    progress_interval: std::time::Duration,
    /// Signaled once this job reaches a terminal state; `run_batch` waits on
    /// this rather than polling `Job::is_completed` (§4.4 step 8's "one-shot
    /// all done event", realized here as one completion message per job
    /// rather than a single shared latch, since the channel is already this
    /// pool's synchronization primitive of choice — see §9's remapping note).
    done: Sender<()>,
}

/// A job's freshly-computed results, before they're written into the shared
/// `job.result` slot under its lock.
struct JobOutcome {
    compressed_bytes: Vec<u8>,
    uncompressed_size: u64,
    crc: u32,
    coder_properties: Vec<u8>,
    encrypted_bytes: Option<Vec<u8>>,
    encryption_properties: Option<Vec<u8>>,
}

/// Runs a single job to completion, writing its outcome into `job.result`
/// and marking it completed. Never panics on a job-local failure — those are
/// recorded as [`JobStatus::Failed`] per §4.4's Partial-outcome contract.
fn compress_one_job(task: &Task) {
    let Task {
        job,
        factory,
        level,
        method_id,
        password_utf16le,
        callbacks,
        stats,
        progress_interval,
        done,
    } = task;

    callbacks.on_item_start(job.index, job.name.as_deref());
    stats.job_started();

    if callbacks.should_cancel() {
        job.result.lock().unwrap().status = JobStatus::Cancelled;
        stats.job_cancelled();
        job.mark_completed();
        let _ = done.send(());
        return;
    }

    let input_item = job.input.lock().unwrap().take();
    let Some(input_item) = input_item else {
        // Already taken by a previous (aborted) attempt; nothing to do.
        job.mark_completed();
        let _ = done.send(());
        return;
    };

    let outcome = (|| -> Result<JobOutcome, ArchiverError> {
        let mut coder = factory.create(*method_id, *level)?;
        let mut source = CrcReader::new(input_item.into_reader());
        let mut compressed = Vec::new();
        coder.code(&mut source, &mut compressed, Some(job.declared_size), None)?;
        let (crc, bytes_seen) = source.finish();
        let mut properties = Vec::new();
        coder
            .serialize_properties(&mut properties)
            .map_err(|e| ArchiverError::CoderError(e.to_string()))?;

        // Encryption is a second coder chained after the main one (§4.6's
        // "Encryption coupling"), never a property of the main coder itself.
        let (encrypted_bytes, encryption_properties) = match password_utf16le {
            Some(pw) => {
                let mut aes = factory.create(crate::coder::method_id::AES_256_SHA_256, *level)?;
                aes.set_password(pw.as_slice());
                let mut ciphertext = Vec::new();
                aes.code(
                    &mut io::Cursor::new(&compressed),
                    &mut ciphertext,
                    Some(compressed.len() as u64),
                    None,
                )?;
                let mut aes_properties = Vec::new();
                aes.serialize_properties(&mut aes_properties)
                    .map_err(|e| ArchiverError::CoderError(e.to_string()))?;
                (Some(ciphertext), Some(aes_properties))
            }
            None => (None, None),
        };

        Ok(JobOutcome {
            compressed_bytes: compressed,
            uncompressed_size: bytes_seen,
            crc,
            coder_properties: properties,
            encrypted_bytes,
            encryption_properties,
        })
    })();

    let mut result = job.result.lock().unwrap();
    match outcome {
        Ok(outcome) => {
            let pack_len = outcome
                .encrypted_bytes
                .as_ref()
                .map(|b| b.len())
                .unwrap_or(outcome.compressed_bytes.len());
            stats.job_completed_ok(outcome.uncompressed_size, pack_len as u64);
            callbacks.on_item_progress(job.index, outcome.uncompressed_size, pack_len as u64);
            result.compressed_bytes = outcome.compressed_bytes;
            result.uncompressed_size = outcome.uncompressed_size;
            result.crc = outcome.crc;
            result.coder_properties = outcome.coder_properties;
            result.encrypted_bytes = outcome.encrypted_bytes;
            result.encryption_properties = outcome.encryption_properties;
            result.status = JobStatus::Ok;
        }
        Err(e) => {
            stats.job_failed();
            callbacks.on_error(job.index, &e.to_string());
            result.status = JobStatus::Failed(e.to_string());
        }
    }
    tracing::trace!(index = job.index, status = ?result.status, "job completed");
    callbacks.on_item_complete(job.index, &result);
    drop(result);
    job.mark_completed();

    // Throttled detailed-stats emission (§3's `progress_interval_ms`,
    // §4.9): fired from the completing worker rather than polled by the
    // Coordinator, consistent with every other callback in this module.
    if stats.should_emit(*progress_interval) {
        callbacks.on_stats(&stats.detailed());
    }
    let _ = done.send(());
}

enum Message {
    Run(Task),
    Stop,
}

/// A pool of persistent worker threads. One instance backs a
/// [`crate::compressor::ParallelCompressor`]'s entire lifetime; batches are
/// submitted via [`WorkerPool::run_batch`] and reuse the same threads.
pub struct WorkerPool {
    sender: Sender<Message>,
    handles: Vec<JoinHandle<()>>,
    stopped: AtomicBool,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver): (Sender<Message>, Receiver<Message>) = unbounded();
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            handles.push(std::thread::spawn(move || {
                for message in receiver {
                    match message {
                        Message::Run(task) => compress_one_job(&task),
                        Message::Stop => break,
                    }
                }
            }));
        }
        Self {
            sender,
            handles,
            stopped: AtomicBool::new(false),
        }
    }

    /// Submits every job in `jobs` to the pool and blocks until the last one
    /// has reached a terminal state. The look-ahead prefetch of §4.4 step 6
    /// is the Coordinator's job (it needs to turn returned items into
    /// additional `Job`s before `jobs` is built) — by the time a slice
    /// reaches `run_batch`, look-ahead has already happened.
    ///
    /// Completion is observed via a dedicated channel rather than polling
    /// `Job::is_completed` (§4.4 step 8's "one-shot all done event"; §9's
    /// channel-as-synchronization-primitive remapping), so this call parks
    /// instead of busy-spinning while workers are still running.
    pub fn run_batch(
        &self,
        jobs: &[Arc<Job>],
        factory: Arc<dyn CoderFactory>,
        level: u8,
        method_id: u64,
        password_utf16le: Option<Arc<Vec<u8>>>,
        callbacks: Arc<dyn ProgressCallbacks>,
        stats: Arc<Statistics>,
        progress_interval: std::time::Duration,
    ) {
        if jobs.is_empty() {
            return;
        }
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(jobs.len());
        for job in jobs.iter() {
            let task = Task {
                job: Arc::clone(job),
                factory: Arc::clone(&factory),
                level,
                method_id,
                password_utf16le: password_utf16le.clone(),
                callbacks: Arc::clone(&callbacks),
                stats: Arc::clone(&stats),
                progress_interval,
                done: done_tx.clone(),
            };
            // An unbounded channel never blocks on send; a full stop call
            // only ever happens after `run_batch` returns, so this is safe.
            let _ = self.sender.send(Message::Run(task));
        }
        drop(done_tx);
        for _ in jobs {
            let _ = done_rx.recv();
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for _ in 0..self.handles.len() {
            let _ = self.sender.send(Message::Stop);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::DefaultCoderRegistry;
    use crate::coder::method_id;
    use crate::item::InputItem;
    use crate::progress::NullCallbacks;
    use std::io::Cursor;

    #[test]
    fn runs_a_batch_of_store_jobs_to_completion() {
        let pool = WorkerPool::new(2);
        let jobs: Vec<Arc<Job>> = (0..5)
            .map(|i| {
                let data = vec![i as u8; 64];
                let item = InputItem::new(Cursor::new(data)).with_declared_size(64);
                Arc::new(Job::new(i, item))
            })
            .collect();

        pool.run_batch(
            &jobs,
            Arc::new(DefaultCoderRegistry),
            0,
            method_id::COPY,
            None,
            Arc::new(NullCallbacks),
            Arc::new(Statistics::new()),
            std::time::Duration::from_millis(100),
        );

        for job in &jobs {
            assert!(job.is_completed());
            let result = job.result.lock().unwrap();
            assert!(result.status.is_ok());
            assert_eq!(result.uncompressed_size, 64);
        }
    }

    #[test]
    fn a_job_missing_its_input_completes_without_panicking() {
        let pool = WorkerPool::new(1);
        let item = InputItem::new(Cursor::new(Vec::<u8>::new()));
        let job = Arc::new(Job::new(0, item));
        // Simulate the input already having been taken by an earlier attempt.
        job.input.lock().unwrap().take();

        pool.run_batch(
            &[Arc::clone(&job)],
            Arc::new(DefaultCoderRegistry),
            0,
            method_id::COPY,
            None,
            Arc::new(NullCallbacks),
            Arc::new(Statistics::new()),
            std::time::Duration::from_millis(100),
        );
        assert!(job.is_completed());
    }
}
