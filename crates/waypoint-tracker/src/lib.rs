//! Broken-link telemetry: the post-routing not-found phase and retention.

pub mod exclusion;
pub mod hasher;
pub mod recorder;
pub mod retention;

pub use exclusion::{ExclusionPolicy, IGNORED_EXTENSIONS, PLATFORM_PREFIXES};
pub use hasher::IpHasher;
pub use recorder::{Miss, MissRecorder, NotFoundRecorder, Recorded};
pub use retention::RetentionJob;
