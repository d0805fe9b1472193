//! State module for archive jobs and archived resources
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle of one archive job (created, running, completed, failed)
//! - `ResourceKind`: Closed classification of a fetched resource by content type

mod job_status;
mod resource_kind;

// Re-export main types
pub use job_status::JobStatus;
pub use resource_kind::ResourceKind;
