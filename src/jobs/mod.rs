//! Job queue and processing.
//!
//! The explicit state machine lives in the shared store: pending →
//! processing → (completed | failed), compare-and-set on every
//! transition, FIFO delivery with `next_retry_at`-gated retries, and a
//! one-shot recovery path for jobs orphaned by a crashed processor.

pub mod processor;
pub mod queue;
pub mod types;

pub use processor::{Processor, ProcessorConfig};
pub use queue::{JobQueue, QueueConfig, SubmitOutcome};
pub use types::{Job, JobError, JobResult, JobStatus, backoff_delay};
