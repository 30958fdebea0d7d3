use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, info};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const DAYS_LABEL: &str = "Average Number of Days";
const PRIORITY_LABEL: &str = "Analyst Review Priority Date";

/// Fields pulled from the DOL processing-times page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub average_days: f64,
    pub priority_date: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("failed to fetch source page: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("required fields missing from source page")]
    MissingFields,
}

/// Upstream source abstraction so refresh logic can be exercised offline.
#[async_trait]
pub trait ProcessingTimeSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ExtractedFields, ScrapeError>;
}

/// Scrapes the DOL processing-times page over HTTP.
pub struct DolScraper {
    client: reqwest::Client,
}

impl DolScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProcessingTimeSource for DolScraper {
    async fn fetch(&self, url: &str) -> Result<ExtractedFields, ScrapeError> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        extract_fields(&body)
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Extract both required fields from the page body. The table strategy is
/// authoritative; the free-text scan only runs when the page has no table at
/// all, not when a table is present but incomplete.
pub fn extract_fields(html: &str) -> Result<ExtractedFields, ScrapeError> {
    let document = Html::parse_document(html);
    match document.select(&selector("table")).next() {
        Some(table) => extract_from_table(table),
        None => {
            info!("no table found in source page, scanning free text");
            extract_from_text(&document)
        }
    }
}

fn extract_from_table(table: ElementRef<'_>) -> Result<ExtractedFields, ScrapeError> {
    let row_selector = selector("tr");
    let cell_selector = selector("td, th");

    let mut average_days = None;
    let mut priority_date = None;

    for row in table.select(&row_selector) {
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        if cells.len() < 2 {
            continue;
        }
        if cells[0].contains(DAYS_LABEL) {
            average_days = Some(parse_days_value(&cells[1]));
        } else if cells[0].contains(PRIORITY_LABEL) {
            priority_date = Some(cells[1].clone());
        }
    }

    match (average_days, priority_date) {
        (Some(average_days), Some(priority_date)) => Ok(ExtractedFields {
            average_days,
            priority_date,
        }),
        _ => {
            error!("source table is missing required rows");
            Err(ScrapeError::MissingFields)
        }
    }
}

/// Free-text strategy for markup changes that drop the table. Matches the
/// same two phrases case-insensitively across text-bearing elements.
fn extract_from_text(document: &Html) -> Result<ExtractedFields, ScrapeError> {
    static DAYS_RE: OnceLock<Regex> = OnceLock::new();
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    let days_re = DAYS_RE
        .get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*days?").expect("valid regex"));
    let date_re = DATE_RE
        .get_or_init(|| Regex::new(r"([A-Za-z]+\s+\d{1,2},?\s+\d{4})").expect("valid regex"));

    let days_needle = DAYS_LABEL.to_ascii_lowercase();
    let priority_needle = PRIORITY_LABEL.to_ascii_lowercase();

    let mut average_days = None;
    let mut priority_date = None;

    for element in document.select(&selector("div, section, p")) {
        let text = element.text().collect::<String>();
        let lowered = text.to_ascii_lowercase();

        if average_days.is_none() && lowered.contains(&days_needle) {
            if let Some(captures) = days_re.captures(&text) {
                average_days = captures[1].parse::<f64>().ok();
            }
        }
        if priority_date.is_none() && lowered.contains(&priority_needle) {
            if let Some(captures) = date_re.captures(&text) {
                priority_date = Some(captures[1].trim().to_string());
            }
        }
    }

    match (average_days, priority_date) {
        (Some(average_days), Some(priority_date)) => Ok(ExtractedFields {
            average_days,
            priority_date,
        }),
        _ => {
            error!("free-text scan could not locate both required fields");
            Err(ScrapeError::MissingFields)
        }
    }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse a value like "180 days" by stripping everything but digits and
/// periods. Unparsable text is a soft failure recorded as 0.0 so one garbled
/// cell does not discard the rest of the page.
fn parse_days_value(value: &str) -> f64 {
    let numeric: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match numeric.parse::<f64>() {
        Ok(days) => days,
        Err(_) => {
            error!(value, "could not parse average days from cell");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_PAGE: &str = r#"
        <html><body>
          <h1>Processing Times</h1>
          <table>
            <tr><th>Measure</th><th>Value</th></tr>
            <tr><td>Average Number of Days to Process PERM Applications</td><td>183 days</td></tr>
            <tr><td>Analyst Review Priority Date</td><td>March 15, 2024</td></tr>
          </table>
        </body></html>
    "#;

    const TEXT_PAGE: &str = r#"
        <html><body>
          <p>The current Average Number of Days to process applications is 183 days.</p>
          <p>The Analyst Review Priority Date is currently March 15, 2024.</p>
        </body></html>
    "#;

    #[test]
    fn table_strategy_extracts_both_fields() {
        let fields = extract_fields(TABLE_PAGE).expect("extraction succeeds");
        assert_eq!(fields.average_days, 183.0);
        assert_eq!(fields.priority_date, "March 15, 2024");
    }

    #[test]
    fn text_strategy_matches_table_strategy() {
        let from_table = extract_fields(TABLE_PAGE).expect("table extraction succeeds");
        let from_text = extract_fields(TEXT_PAGE).expect("text extraction succeeds");
        assert_eq!(from_table, from_text);
    }

    #[test]
    fn fractional_days_survive_both_strategies() {
        let table = r#"
            <table>
              <tr><td>Average Number of Days</td><td>182.5 days</td></tr>
              <tr><td>Analyst Review Priority Date</td><td>April 02, 2024</td></tr>
            </table>
        "#;
        let fields = extract_fields(table).expect("extraction succeeds");
        assert_eq!(fields.average_days, 182.5);

        let text = r#"
            <div>average number of days: 182.5 days</div>
            <div>analyst review priority date: April 02, 2024</div>
        "#;
        let fields = extract_fields(text).expect("extraction succeeds");
        assert_eq!(fields.average_days, 182.5);
        assert_eq!(fields.priority_date, "April 02, 2024");
    }

    #[test]
    fn malformed_days_cell_is_recorded_as_zero() {
        let page = r#"
            <table>
              <tr><td>Average Number of Days</td><td>approx. N/A</td></tr>
              <tr><td>Analyst Review Priority Date</td><td>March 15, 2024</td></tr>
            </table>
        "#;
        let fields = extract_fields(page).expect("extraction still succeeds");
        assert_eq!(fields.average_days, 0.0);
        assert_eq!(fields.priority_date, "March 15, 2024");
    }

    #[test]
    fn missing_priority_date_fails_the_extraction() {
        let page = r#"
            <table>
              <tr><td>Average Number of Days</td><td>183 days</td></tr>
            </table>
        "#;
        match extract_fields(page) {
            Err(ScrapeError::MissingFields) => {}
            other => panic!("expected missing fields, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_table_does_not_fall_back_to_free_text() {
        // A table exists but lacks the rows; the surrounding prose would
        // satisfy the free-text scan, which must not run.
        let page = r#"
            <p>Average Number of Days is 500 days, Analyst Review Priority Date July 1, 2020</p>
            <table><tr><td>Unrelated</td><td>rows</td></tr></table>
        "#;
        match extract_fields(page) {
            Err(ScrapeError::MissingFields) => {}
            other => panic!("expected missing fields, got {other:?}"),
        }
    }

    #[test]
    fn text_strategy_requires_both_fields() {
        let page = "<p>Average Number of Days to process is 183 days.</p>";
        match extract_fields(page) {
            Err(ScrapeError::MissingFields) => {}
            other => panic!("expected missing fields, got {other:?}"),
        }
    }
}
