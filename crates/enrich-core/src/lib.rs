pub mod partition;
pub mod provider;
pub mod record;
pub mod resume;

pub use partition::{BatchSpec, PartitionError, batch_count, slice};
pub use provider::{EnrichmentOutcome, Provider, Source};
pub use record::{RecordError, RunRecord, Tally, validate_operator};
pub use resume::should_skip;
