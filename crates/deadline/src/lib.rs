//! Deadline Web Service client library.
//!
//! Wraps the render farm's REST API with typed requests, normalizes the
//! verbose upstream payloads down to what the frontend needs, and layers a
//! tiered freshness cache over the job lists so many concurrent viewers
//! don't hammer the web service.

pub mod api;
pub mod cache;
pub mod image_path;
pub mod normalize;
pub mod source;

pub use api::{DeadlineApi, DeadlineError};
pub use cache::{JobListKind, JobsCache};
pub use source::{DeadlineFarm, FarmSource};
