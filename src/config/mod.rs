//! Service configuration
//!
//! A single typed [`ServiceConfig`] built from environment variables at
//! startup. Every tunable has a default; only `WORKER_SECRET` and
//! `METADATA_API_KEY` are required, because running without them yields a
//! service that is either unauthenticated or unable to enrich.

mod types;

pub use types::ServiceConfig;
