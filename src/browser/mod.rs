//! Headless browser lifecycle: discovery, launch, profile isolation, and
//! the page-leasing driver.

pub mod driver;
pub mod profile;
pub mod setup;

pub use driver::{BrowserDriver, DriverConfig, PageLease};
pub use profile::cleanup_stale_profiles;
