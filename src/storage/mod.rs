//! Persistence of dispatch reports.

mod results;

pub use results::{ResultStore, StoreSummary, StoredMetadata, StoredReport};
