//! Log-file reader (spec.md §4.2): streams fixed-size blocks of a redo
//! log, validates block headers and checksums, and reassembles logical
//! records that span blocks.

pub mod block;
pub mod reader;

pub use block::{BlockSize, DataBlockHeader, LogHeader};
pub use reader::{LogKind, LogReader, NextRecord, RawRecord, ReaderChecks};
