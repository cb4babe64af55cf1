//! # heptacore
//!
//! A parallel multi-stream archival compressor core: a library that ingests
//! a batch of independent byte streams, compresses them concurrently across
//! a worker pool, and emits a single archive conforming to the 7z container
//! format — optionally encrypted and optionally split across fixed-size
//! volumes.
//!
//! This crate is the compression *core* only. Reading/extracting archives,
//! a CLI, and an FFI shim are out of scope — see each module's docs for the
//! boundary it owns.
//!
//! ## Key modules
//!
//! - [`compressor`]: [`ParallelCompressor`], the public entry point.
//! - [`config`]: batch/coder configuration (worker count, level, password, …).
//! - [`item`]: [`InputItem`], one independent byte stream to compress.
//! - [`job`]: the per-item unit of work and its result slots.
//! - [`workers`]: the fixed worker-thread pool that drains jobs.
//! - [`solid`]: the alternate single-folder path for solid mode.
//! - [`archive`]: the 7z container assembler.
//! - [`coder`]: the `Coder`/`CoderFactory` capability and default registry.
//! - [`volume`]: the fixed-size multi-volume output splitter.
//! - [`progress`]: the caller-supplied progress/cancellation callbacks.
//! - [`stats`]: batch statistics, queryable in short or detailed form.
//! - [`crc`]: the rolling CRC-32 input wrapper.
//! - [`crypto`]: key derivation shared by the AES-256 coder.
//! - [`error`]: the crate's error taxonomy.
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! use heptacore::{coder::DefaultCoderRegistry, InputItem, ParallelCompressor};
//!
//! let mut compressor = ParallelCompressor::new(Arc::new(DefaultCoderRegistry));
//! compressor.config_mut().set_worker_count(4).set_level(6);
//!
//! let items = vec![
//!     InputItem::new(Cursor::new(b"hello".to_vec())).with_name("hello.txt"),
//! ];
//! let mut out = File::create("out.7z").unwrap();
//! compressor.compress_batch(items, &mut out).unwrap();
//! ```

pub mod archive;
pub mod coder;
pub mod compressor;
pub mod config;
pub mod crc;
pub mod crypto;
pub mod error;
pub mod item;
pub mod job;
pub mod progress;
pub mod solid;
pub mod stats;
pub mod volume;
pub mod workers;

pub use compressor::{BatchOutcome, ParallelCompressor};
pub use config::CompressorConfig;
pub use error::ArchiverError;
pub use item::InputItem;
pub use progress::{NullCallbacks, ProgressCallbacks};
pub use stats::{DetailedStats, ShortStats};
