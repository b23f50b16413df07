// Attempt lifecycle: naming, discovery, numbering and state of submitted
// attempts. The filesystem is the only store; every call re-reads it.

pub mod allocator;
pub mod paths;
pub mod registry;
pub mod status;
pub mod template;

pub use allocator::{allocate, submit, SubmissionLocks};
pub use paths::{path_for, Stage};
pub use registry::enumerate_attempts;
pub use status::{has_results, resolve_results, resolve_status, AttemptState};
