//! Ferry Server Library
//!
//! Chunked file transfer: resumable uploads with instant-upload
//! deduplication, ordered chunk reassembly, and range-addressed downloads.
//!
//! # Modules
//!
//! - `transfer`: the chunked-transfer engine (paths, chunk store, merge,
//!   range extraction, orchestration)
//! - `routes`: the HTTP boundary around the engine
//! - `response`: the uniform result envelope

pub mod config;
pub mod response;
pub mod routes;
pub mod state;
pub mod transfer;
