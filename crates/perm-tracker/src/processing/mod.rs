pub mod estimate;
pub mod refresh;
pub mod schedule;
pub mod scrape;
pub mod store;

pub use estimate::{
    current_data, estimate_approval, ApprovalEstimate, CurrentProcessingData, EstimateError,
};
pub use refresh::refresh_processing_data;
pub use schedule::RefreshScheduler;
pub use scrape::{DolScraper, ExtractedFields, ProcessingTimeSource, ScrapeError};
pub use store::{DataSource, ProcessingTimeRecord, ProcessingTimeStore, SqliteStore, StoreError};
