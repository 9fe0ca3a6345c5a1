//! `redo-replay` turns a stream of Oracle-style redo log blocks into an
//! ordered sequence of logical change events: inserts, updates, deletes
//! and DDL, one per committed transaction, in commit-SCN order.
//!
//! The engine never talks to a database or a filesystem directly -- it
//! is handed a byte stream per log sequence number (see
//! [`replay_loop::LogSource`]) and a bootstrapped [`schema::SchemaDictionary`],
//! and it writes logical events to an [`output::OutputBuffer`] that a
//! separate sink thread drains.
//!
//! ## Getting started
//!
//! ```no_run
//! use std::sync::Arc;
//! use redo_replay::config::ReplayConfig;
//! use redo_replay::output::OutputBuffer;
//! use redo_replay::schema::SchemaDictionary;
//!
//! let config = ReplayConfig::default();
//! let dictionary = SchemaDictionary::new(config.flags.schema_keep);
//! let output = OutputBuffer::new(64);
//!
//! while let Some(message) = output.next_timeout(std::time::Duration::from_millis(10)) {
//!     println!("{} bytes", message.bytes.len());
//! }
//! ```

pub mod assembler;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod ids;
pub mod logfile;
pub mod output;
pub mod primitives;
pub mod record;
pub mod replay_loop;
pub mod schema;
pub mod system_tracker;
pub mod txn;
