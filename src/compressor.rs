//! C4: the coordinator — `ParallelCompressor`, the crate's public entry
//! point. Owns configuration, lazily spawns and reuses the worker pool,
//! dispatches to the solid path when configured, and drives the archive
//! assembler (§4.4).

use std::io::Write;
use std::sync::Arc;

use crate::archive::{ArchiveAssembler, AssemblyStats, EncryptionStage, FolderPlan};
use crate::coder::CoderFactory;
use crate::config::CompressorConfig;
use crate::crypto;
use crate::error::ArchiverError;
use crate::item::InputItem;
use crate::job::{Job, JobResult, JobStatus};
use crate::progress::{NullCallbacks, ProgressCallbacks};
use crate::solid;
use crate::stats::{DetailedStats, ShortStats, Statistics};
use crate::volume::VolumeWriter;
use crate::workers::WorkerPool;

/// Resource-exhaustion guard on batch size (§4.4's "Compress-batch"
/// precondition); one million items is accepted, one more is rejected.
const MAX_BATCH_ITEMS: usize = 1_000_000;

/// The outcome of one batch, per §7's "User-visible signals".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every job in the batch succeeded.
    Ok,
    /// At least one job did not reach `JobStatus::Ok`, but the archive is
    /// well-formed and contains every job that did.
    Partial,
}

/// Public entry point: the parallel multi-stream compression engine.
///
/// One instance drives one batch at a time (§4.4's "Concurrency contract");
/// multiple instances may run concurrently against independent worker pools.
/// Workers are spawned lazily on the first batch and reused for subsequent
/// ones.
pub struct ParallelCompressor {
    config: CompressorConfig,
    factory: Arc<dyn CoderFactory>,
    callbacks: Arc<dyn ProgressCallbacks>,
    workers: Option<WorkerPool>,
    stats: Arc<Statistics>,
}

impl ParallelCompressor {
    /// Builds a coordinator over the given coder registry, with no-op
    /// callbacks and default configuration (§3).
    pub fn new(factory: Arc<dyn CoderFactory>) -> Self {
        Self {
            config: CompressorConfig::new(),
            factory,
            callbacks: Arc::new(NullCallbacks),
            workers: None,
            stats: Arc::new(Statistics::new()),
        }
    }

    /// Mutable access to the configuration (§4.4's "Configure" operation).
    /// Setters are idempotent; per §4.4, mutating configuration while a
    /// batch is in flight on this same instance is undefined behavior at the
    /// specification level — this crate does not attempt to detect it.
    pub fn config_mut(&mut self) -> &mut CompressorConfig {
        &mut self.config
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Installs the progress/cancellation callbacks used by subsequent
    /// batches. Not retroactive to a batch already in flight.
    pub fn set_callbacks(&mut self, callbacks: Arc<dyn ProgressCallbacks>) {
        self.callbacks = callbacks;
    }

    /// The always-fresh short-form statistics (§4.4's "Query statistics").
    pub fn stats_short(&self) -> ShortStats {
        self.stats.short()
    }

    /// The full statistics struct, with throughput/ratio/ETA derived on
    /// demand (§3, §4.4).
    pub fn stats_detailed(&self) -> DetailedStats {
        self.stats.detailed()
    }

    fn ensure_workers(&mut self) {
        if self.workers.is_none() {
            tracing::debug!(worker_count = self.config.worker_count(), "spawning worker pool");
            self.workers = Some(WorkerPool::new(self.config.worker_count()));
        }
    }

    /// Compresses a single input item into `sink` as a one-file archive.
    ///
    /// §4.4 distinguishes an inline single-threaded path from falling
    /// through to `compress_batch` as a one-item batch; a one-worker pool
    /// has no parallelism overhead to avoid, so this crate always takes the
    /// batch path — the observable behavior is identical either way (see
    /// DESIGN.md).
    pub fn compress_single(
        &mut self,
        item: InputItem,
        sink: &mut dyn Write,
    ) -> Result<BatchOutcome, ArchiverError> {
        self.compress_batch(vec![item], sink)
    }

    /// The main operation (§4.4's "Compress-batch"). `sink` is ignored (but
    /// still required, to keep the call site explicit) when volumes are
    /// configured: output instead goes to `{volume_prefix}.NNN` files.
    pub fn compress_batch(
        &mut self,
        items: Vec<InputItem>,
        sink: &mut dyn Write,
    ) -> Result<BatchOutcome, ArchiverError> {
        self.config.validate()?;
        if items.is_empty() {
            return Err(ArchiverError::InvalidArgument(
                "a batch must contain at least one item".into(),
            ));
        }
        if items.len() > MAX_BATCH_ITEMS {
            return Err(ArchiverError::InvalidArgument(format!(
                "{} items exceeds the {MAX_BATCH_ITEMS}-item ceiling",
                items.len()
            )));
        }

        tracing::debug!(item_count = items.len(), solid = self.config.solid_mode(), "batch starting");

        let outcome = if self.config.solid_mode() {
            self.compress_batch_solid(items, sink)
        } else {
            self.compress_batch_parallel(items, sink)
        };

        match &outcome {
            Ok(outcome) => tracing::debug!(?outcome, "batch finished"),
            Err(e) => tracing::debug!(error = %e, "batch aborted"),
        }
        outcome
    }

    fn compress_batch_parallel(
        &mut self,
        items: Vec<InputItem>,
        sink: &mut dyn Write,
    ) -> Result<BatchOutcome, ArchiverError> {
        self.ensure_workers();

        let mut jobs: Vec<Arc<Job>> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Arc::new(Job::new(index, item)))
            .collect();

        // Look-ahead prefetch (§4.4 step 6): give the caller a chance to hand
        // over up to `2 * worker_count` additional items before the batch
        // size is locked in, so a caller backed by an expensive discovery
        // process (e.g. a directory walk) can keep the pool fed. Returned
        // items are appended as ordinary jobs with indices continuing on
        // from the batch's current length, and are counted in this batch's
        // totals like any other item (§9's "surfaced in the same stats
        // counters" decision).
        let lookahead = 2 * self.config.worker_count();
        let extra_items = self.callbacks.get_next_items(jobs.len(), lookahead);
        for item in extra_items {
            let index = jobs.len();
            jobs.push(Arc::new(Job::new(index, item)));
        }

        self.stats.reset_for_batch(jobs.len() as u64);

        let password_bytes = self
            .config
            .password()
            .map(|p| Arc::new(crypto::password_to_utf16le(p)));

        self.workers.as_ref().unwrap().run_batch(
            &jobs,
            Arc::clone(&self.factory),
            self.config.level(),
            self.config.method_id(),
            password_bytes,
            Arc::clone(&self.callbacks),
            Arc::clone(&self.stats),
            std::time::Duration::from_millis(self.config.progress_interval_ms()),
        );

        let mut assembler = ArchiveAssembler::new();
        let mut any_ok = false;
        let mut any_not_ok = false;

        for job in &jobs {
            let result = job.result.lock().unwrap();
            match &result.status {
                JobStatus::Ok => {
                    any_ok = true;
                    self.register_job_result(&mut assembler, job, &result);
                }
                _ => any_not_ok = true,
            }
        }

        if !any_ok {
            self.callbacks
                .on_error(usize::MAX, "all compression jobs failed");
            return Err(ArchiverError::Fatal("all compression jobs failed".into()));
        }

        self.write_archive(assembler, sink)?;
        Ok(if any_not_ok {
            BatchOutcome::Partial
        } else {
            BatchOutcome::Ok
        })
    }

    /// Registers one successful job's result with the assembler. A job whose
    /// CRC stream actually observed zero bytes gets no folder at all (§9's
    /// Open Question #1 decision): determined from the observed
    /// `uncompressed_size`, not the item's (possibly unknown) declared size.
    fn register_job_result(&self, assembler: &mut ArchiveAssembler, job: &Job, result: &JobResult) {
        if result.uncompressed_size == 0 {
            assembler.add_empty_item(job.name.clone(), job.attrs, job.mtime);
            return;
        }
        let encryption = result.encryption_properties.clone().map(|properties| EncryptionStage {
            properties,
            ciphertext: result
                .encrypted_bytes
                .clone()
                .expect("encryption_properties implies encrypted_bytes"),
        });
        let folder = FolderPlan::single(
            self.config.method_id(),
            result.coder_properties.clone(),
            result.compressed_bytes.clone(),
            result.crc,
            encryption,
        );
        assembler.add_folder_item(job.name.clone(), job.attrs, job.mtime, folder);
    }

    fn compress_batch_solid(
        &mut self,
        items: Vec<InputItem>,
        sink: &mut dyn Write,
    ) -> Result<BatchOutcome, ArchiverError> {
        self.stats.reset_for_batch(items.len() as u64);

        // Every item is read regardless of its declared size (`0` means
        // "unknown", not "empty" — see `InputItem::declared_size`); whether
        // an item ends up with its own substream or a bare `EMPTY_STREAM`
        // entry is decided below from the *observed* bytes each one produced
        // (§9's Open Question #1 decision), preserving original batch order
        // either way (§5).
        let password_bytes = self.config.password().map(crypto::password_to_utf16le);
        let result = solid::encode_solid_block(
            items,
            self.factory.as_ref(),
            self.config.method_id(),
            self.config.level(),
            password_bytes.as_deref(),
        )?;

        let mut assembler = ArchiveAssembler::new();

        if result.items.iter().all(|m| m.uncompressed_size == 0) {
            for meta in result.items {
                assembler.add_empty_item(meta.name, meta.attrs, meta.mtime);
                self.stats.job_completed_ok(0, 0);
            }
            self.write_archive(assembler, sink)?;
            return Ok(BatchOutcome::Ok);
        }

        let pack_len = result
            .encrypted
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(result.compressed.len()) as u64;

        let nonzero_sizes: Vec<u64> = result
            .items
            .iter()
            .filter(|m| m.uncompressed_size > 0)
            .map(|m| m.uncompressed_size)
            .collect();
        let nonzero_crcs: Vec<u32> = result
            .items
            .iter()
            .filter(|m| m.uncompressed_size > 0)
            .map(|m| m.crc)
            .collect();
        let encryption = result.encryption_properties.clone().map(|properties| EncryptionStage {
            properties,
            ciphertext: result
                .encrypted
                .clone()
                .expect("encryption_properties implies encrypted bytes"),
        });
        let folder = FolderPlan::solid(
            self.config.method_id(),
            result.coder_properties,
            result.compressed,
            nonzero_sizes,
            nonzero_crcs,
            encryption,
        );
        assembler.set_solid_folder(folder);

        // The solid block produces one compressed buffer for every nonzero
        // item combined; there is no per-item pack size to report, so the
        // whole of it is attributed to statistics against the last nonzero
        // item, and zero against every other one (including empty items).
        let nonzero_count = result.items.iter().filter(|m| m.uncompressed_size > 0).count();
        let mut emitted_nonzero = 0usize;
        for meta in result.items {
            if meta.uncompressed_size > 0 {
                emitted_nonzero += 1;
                let out_bytes_for_this_item = if emitted_nonzero == nonzero_count {
                    pack_len
                } else {
                    0
                };
                assembler.add_solid_substream(meta.name, meta.attrs, meta.mtime);
                self.stats
                    .job_completed_ok(meta.uncompressed_size, out_bytes_for_this_item);
            } else {
                assembler.add_empty_item(meta.name, meta.attrs, meta.mtime);
                self.stats.job_completed_ok(0, 0);
            }
        }

        let interval = std::time::Duration::from_millis(self.config.progress_interval_ms());
        if self.stats.should_emit(interval) {
            self.callbacks.on_stats(&self.stats.detailed());
        }

        self.write_archive(assembler, sink)?;
        Ok(BatchOutcome::Ok)
    }

    fn write_archive(
        &self,
        assembler: ArchiveAssembler,
        sink: &mut dyn Write,
    ) -> Result<AssemblyStats, ArchiverError> {
        match self.config.volumes() {
            Some((volume_size, prefix)) => {
                let mut volumes = VolumeWriter::create(prefix, volume_size)?;
                let stats = self.finish_assembler(assembler, &mut volumes)?;
                volumes.finish()?;
                Ok(stats)
            }
            None => self.finish_assembler(assembler, sink),
        }
    }

    fn finish_assembler<W: Write>(
        &self,
        assembler: ArchiveAssembler,
        sink: W,
    ) -> Result<AssemblyStats, ArchiverError> {
        match self.config.password() {
            Some(password) => {
                let password_bytes = crypto::password_to_utf16le(password);
                assembler.finish_encrypted(
                    sink,
                    self.factory.as_ref(),
                    self.config.method_id(),
                    self.config.level(),
                    &password_bytes,
                )
            }
            None => assembler.finish(sink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::{method_id, DefaultCoderRegistry};
    use std::io::Cursor;

    fn registry() -> Arc<dyn CoderFactory> {
        Arc::new(DefaultCoderRegistry)
    }

    fn item(data: &[u8], name: &str) -> InputItem {
        InputItem::new(Cursor::new(data.to_vec()))
            .with_name(name)
            .with_declared_size(data.len() as u64)
    }

    #[test]
    fn worker_count_zero_and_huge_coerce_at_config_time() {
        let mut compressor = ParallelCompressor::new(registry());
        compressor.config_mut().set_worker_count(0);
        assert_eq!(compressor.config().worker_count(), 1);
        compressor.config_mut().set_worker_count(1_000_000);
        assert_eq!(compressor.config().worker_count(), 256);
    }

    #[test]
    fn rejects_an_empty_batch() {
        let mut compressor = ParallelCompressor::new(registry());
        let mut out = Vec::new();
        let err = compressor.compress_batch(vec![], &mut out).unwrap_err();
        assert!(matches!(err, ArchiverError::InvalidArgument(_)));
    }

    #[test]
    fn two_item_non_solid_batch_produces_a_valid_signature_and_two_files() {
        let mut compressor = ParallelCompressor::new(registry());
        compressor
            .config_mut()
            .set_worker_count(2)
            .set_method_id(method_id::COPY);

        let items = vec![item(b"stream-a contents", "stream-A"), item(b"stream-b contents", "stream-B")];
        let mut out = Vec::new();
        let outcome = compressor.compress_batch(items, &mut out).unwrap();
        assert_eq!(outcome, BatchOutcome::Ok);
        assert_eq!(&out[0..6], &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]);
        assert_eq!(&out[6..8], &[0, 4]);

        let stats = compressor.stats_short();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn solid_mode_produces_one_folder_archive() {
        let mut compressor = ParallelCompressor::new(registry());
        compressor
            .config_mut()
            .set_solid_mode(true)
            .set_method_id(method_id::COPY);

        let items = vec![item(b"aaaa", "a"), item(b"bbbb", "b"), item(b"cc", "c")];
        let mut out = Vec::new();
        let outcome = compressor.compress_batch(items, &mut out).unwrap();
        assert_eq!(outcome, BatchOutcome::Ok);
        assert_eq!(&out[0..6], &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]);

        let stats = compressor.stats_short();
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.in_bytes, 10);
        assert_eq!(stats.out_bytes, 10); // store coder: ciphertext-free, byte-identical
    }

    #[test]
    fn fatal_when_every_job_fails() {
        struct AlwaysFailingReader;
        impl std::io::Read for AlwaysFailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk fell off"))
            }
        }

        let mut compressor = ParallelCompressor::new(registry());
        compressor.config_mut().set_method_id(method_id::COPY);
        let items = vec![InputItem::new(AlwaysFailingReader).with_name("doomed")];
        let mut out = Vec::new();
        let err = compressor.compress_batch(items, &mut out).unwrap_err();
        assert!(matches!(err, ArchiverError::Fatal(_)));
    }

    #[test]
    fn partial_when_some_jobs_fail() {
        struct FailingReader;
        impl std::io::Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            }
        }

        let mut compressor = ParallelCompressor::new(registry());
        compressor
            .config_mut()
            .set_worker_count(2)
            .set_method_id(method_id::COPY);

        let items = vec![
            item(b"ok bytes", "good"),
            InputItem::new(FailingReader).with_name("bad"),
        ];
        let mut out = Vec::new();
        let outcome = compressor.compress_batch(items, &mut out).unwrap();
        assert_eq!(outcome, BatchOutcome::Partial);

        let stats = compressor.stats_short();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn encrypted_batch_pack_region_does_not_contain_plaintext_repeats() {
        let mut compressor = ParallelCompressor::new(registry());
        compressor
            .config_mut()
            .set_method_id(method_id::COPY)
            .set_password("pw1");

        let items = vec![
            item(&[0x41; 1024], "file-A"),
            item(&[0x42; 1024], "file-B"),
            item(&[0x43; 1024], "file-C"),
        ];
        let mut out = Vec::new();
        let outcome = compressor.compress_batch(items, &mut out).unwrap();
        assert_eq!(outcome, BatchOutcome::Ok);

        assert!(!out.windows(16).any(|w| w == [0x41u8; 16]));
        assert!(!out.windows(16).any(|w| w == [0x42u8; 16]));
        assert!(!out.windows(16).any(|w| w == [0x43u8; 16]));

        let name_bytes: Vec<u8> = "file-B".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert!(
            !out.windows(name_bytes.len())
                .skip(32)
                .any(|w| w == name_bytes.as_slice()),
            "file name must not appear in plaintext past the signature header"
        );
    }

    #[test]
    fn zero_byte_item_has_no_folder_and_empty_stream() {
        let mut compressor = ParallelCompressor::new(registry());
        compressor.config_mut().set_method_id(method_id::COPY);
        let items = vec![item(b"", "empty.txt")];
        let mut out = Vec::new();
        let outcome = compressor.compress_batch(items, &mut out).unwrap();
        assert_eq!(outcome, BatchOutcome::Ok);
        // signature + 20-byte start header; next_header_offset must be 0
        // since no pack bytes were written for a zero-byte-only batch.
        let next_header_offset = u64::from_le_bytes(out[12..20].try_into().unwrap());
        assert_eq!(next_header_offset, 0);
    }

    #[test]
    fn on_stats_fires_at_least_once_per_batch_with_a_zero_interval() {
        #[derive(Default)]
        struct RecordStats {
            calls: std::sync::Mutex<Vec<u64>>,
        }
        impl crate::progress::ProgressCallbacks for RecordStats {
            fn on_stats(&self, stats: &DetailedStats) {
                self.calls.lock().unwrap().push(stats.completed);
            }
        }

        let mut compressor = ParallelCompressor::new(registry());
        compressor
            .config_mut()
            .set_method_id(method_id::COPY)
            .set_progress_interval_ms(0);
        let callbacks = Arc::new(RecordStats::default());
        compressor.set_callbacks(callbacks.clone());

        let items = vec![item(b"a", "a"), item(b"b", "b"), item(b"c", "c")];
        let mut out = Vec::new();
        compressor.compress_batch(items, &mut out).unwrap();

        let calls = callbacks.calls.lock().unwrap();
        assert!(!calls.is_empty(), "on_stats must fire when the throttle interval is zero");
    }

    #[test]
    fn look_ahead_items_are_appended_and_compressed_into_the_same_batch() {
        struct OneShotLookAhead {
            handed_out: std::sync::atomic::AtomicBool,
        }
        impl crate::progress::ProgressCallbacks for OneShotLookAhead {
            fn get_next_items(&self, cursor: usize, max_count: usize) -> Vec<InputItem> {
                assert_eq!(cursor, 2, "look-ahead must be offered the caller's own batch length");
                assert!(max_count > 0);
                if self
                    .handed_out
                    .swap(true, std::sync::atomic::Ordering::SeqCst)
                {
                    return Vec::new();
                }
                vec![item(b"prefetched", "prefetched")]
            }
        }

        let mut compressor = ParallelCompressor::new(registry());
        compressor.config_mut().set_method_id(method_id::COPY);
        compressor.set_callbacks(Arc::new(OneShotLookAhead {
            handed_out: std::sync::atomic::AtomicBool::new(false),
        }));

        let items = vec![item(b"one", "one"), item(b"two", "two")];
        let mut out = Vec::new();
        let outcome = compressor.compress_batch(items, &mut out).unwrap();
        assert_eq!(outcome, BatchOutcome::Ok);

        // The look-ahead item must be counted in this batch's totals, not
        // silently dropped.
        let stats = compressor.stats_short();
        assert_eq!(stats.completed, 3);
    }
}
