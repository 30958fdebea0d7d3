use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::store::{DataSource, ProcessingTimeStore, StoreError};

/// Wire format for every date the estimator accepts or produces.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDateFormat,
    #[error("no processing time data available, try again later")]
    NoDataAvailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Approval projection for a single filing date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalEstimate {
    pub estimated_approval_date: String,
    pub average_processing_days: f64,
    pub last_updated: String,
    pub priority_date: String,
    pub data_source: DataSource,
}

/// The stored record as exposed to callers, without a filing date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentProcessingData {
    pub average_processing_days: f64,
    pub priority_date: String,
    pub last_updated: String,
    pub data_source: DataSource,
}

/// Strict `YYYY-MM-DD` validation; out-of-range components are rejected.
pub fn validate_filing_date(raw: &str) -> Result<NaiveDate, EstimateError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| EstimateError::InvalidDateFormat)
}

/// Project the approval date by adding the stored average (whole calendar
/// days, fractional part truncated) to the filing date. Input validation
/// happens before the store is touched.
pub async fn estimate_approval(
    filing_date: &str,
    store: &dyn ProcessingTimeStore,
) -> Result<ApprovalEstimate, EstimateError> {
    let filing = validate_filing_date(filing_date)?;
    let record = store
        .current()
        .await?
        .ok_or(EstimateError::NoDataAvailable)?;

    let approval = filing + Duration::days(record.average_days.trunc() as i64);

    Ok(ApprovalEstimate {
        estimated_approval_date: approval.format(DATE_FORMAT).to_string(),
        average_processing_days: record.average_days,
        last_updated: record.last_updated.format(DATE_FORMAT).to_string(),
        priority_date: record.priority_date,
        data_source: record.data_source,
    })
}

/// Read-only view of the current record; fails the same way as
/// `estimate_approval` when the store is empty.
pub async fn current_data(
    store: &dyn ProcessingTimeStore,
) -> Result<CurrentProcessingData, EstimateError> {
    let record = store
        .current()
        .await?
        .ok_or(EstimateError::NoDataAvailable)?;

    Ok(CurrentProcessingData {
        average_processing_days: record.average_days,
        priority_date: record.priority_date,
        last_updated: record.last_updated.format(DATE_FORMAT).to_string(),
        data_source: record.data_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::store::{ProcessingTimeRecord, SqliteStore};
    use chrono::{TimeZone, Utc};

    async fn seeded_store(average_days: f64) -> SqliteStore {
        let store = SqliteStore::in_memory().await.expect("store opens");
        store
            .replace(ProcessingTimeRecord {
                average_days,
                priority_date: "March 15, 2024".to_string(),
                last_updated: Utc
                    .with_ymd_and_hms(2024, 4, 1, 8, 30, 0)
                    .single()
                    .expect("valid"),
                data_source: DataSource::Live,
            })
            .await
            .expect("seed succeeds");
        store
    }

    #[tokio::test]
    async fn adds_average_days_to_filing_date() {
        let store = seeded_store(180.0).await;
        let estimate = estimate_approval("2024-01-01", &store)
            .await
            .expect("estimate succeeds");
        assert_eq!(estimate.estimated_approval_date, "2024-06-29");
        assert_eq!(estimate.average_processing_days, 180.0);
        assert_eq!(estimate.priority_date, "March 15, 2024");
        assert_eq!(estimate.last_updated, "2024-04-01");
        assert_eq!(estimate.data_source, DataSource::Live);
    }

    #[tokio::test]
    async fn fractional_days_are_truncated() {
        let store = seeded_store(180.9).await;
        let estimate = estimate_approval("2024-01-01", &store)
            .await
            .expect("estimate succeeds");
        assert_eq!(estimate.estimated_approval_date, "2024-06-29");
        assert_eq!(estimate.average_processing_days, 180.9);
    }

    #[tokio::test]
    async fn crosses_year_boundaries() {
        let store = seeded_store(365.0).await;
        let estimate = estimate_approval("2023-03-01", &store)
            .await
            .expect("estimate succeeds");
        assert_eq!(estimate.estimated_approval_date, "2024-02-29");
    }

    #[tokio::test]
    async fn rejects_malformed_filing_dates() {
        let store = seeded_store(180.0).await;
        for raw in ["01/01/2024", "2024-13-40", "", "yesterday", "2024-02-30"] {
            match estimate_approval(raw, &store).await {
                Err(EstimateError::InvalidDateFormat) => {}
                other => panic!("expected invalid date for {raw:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn empty_store_yields_no_data_available() {
        let store = SqliteStore::in_memory().await.expect("store opens");
        match estimate_approval("2024-01-01", &store).await {
            Err(EstimateError::NoDataAvailable) => {}
            other => panic!("expected no data, got {other:?}"),
        }
        match current_data(&store).await {
            Err(EstimateError::NoDataAvailable) => {}
            other => panic!("expected no data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn current_data_mirrors_the_stored_record() {
        let store = seeded_store(183.0).await;
        let data = current_data(&store).await.expect("read succeeds");
        assert_eq!(data.average_processing_days, 183.0);
        assert_eq!(data.priority_date, "March 15, 2024");
        assert_eq!(data.last_updated, "2024-04-01");
        assert_eq!(data.data_source, DataSource::Live);
    }
}
