//! Chunked Transfer Module
//!
//! Implements resumable large-file transfers with:
//! - Client-assigned chunk placement under one directory per identifier
//! - Duplicate detection via the merged file ("instant upload")
//! - Ordered, idempotent reassembly of chunks into the final file
//! - Byte-range extraction for resumable downloads
//!
//! Protocol Flow:
//! 1. Client asks check-chunk; server reports skip-upload or the chunk
//!    indices it already holds
//! 2. Client uploads only the missing chunks, in any order
//! 3. Client requests merge; server folds the chunks into the final file
//! 4. Downloads address the file by byte range or chunk index

pub mod chunk_store;
pub mod merge;
pub mod orchestrator;
pub mod paths;
pub mod range;
pub mod types;

pub use chunk_store::ChunkStore;
pub use merge::MergeEngine;
pub use orchestrator::{upload_state, DirectoryView, FsView, TransferOrchestrator};
pub use paths::PathResolver;
pub use range::ByteRange;
pub use types::*;
