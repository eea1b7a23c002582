//! Pure domain logic for the farmview backend.
//!
//! Contains the structural diff engine used to minimize WebSocket push
//! payloads and the job-status classifier that maps a job's task counters
//! to a narrative category.

pub mod diff;
pub mod status;
