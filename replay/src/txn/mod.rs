//! Per-transaction accumulation: the chunked arena buffer (§4.5), the
//! scheduling heap (§4.6), and the rollback matcher (§4.7).

pub mod buffer;
pub mod chunk;
pub mod heap;
pub mod matcher;
pub mod transaction;

pub use buffer::TransactionBuffer;
pub use chunk::{RecordPair, CHUNK_CAPACITY_BYTES};
pub use heap::TransactionHeap;
pub use matcher::RollbackMatcher;
pub use transaction::{Transaction, TransactionFlags, TransactionState};
