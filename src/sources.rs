// 📥 Data Sources - where form responses come from
// Every source delivers a complete, ordered snapshot of its rows. The core
// treats the configured sources as one record set: payment sheet first,
// then application sheet, rows in original order.

use crate::error::Result;
use crate::record::Record;
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// RECORD SOURCE TRAIT
// ============================================================================

/// RecordSource - one sheet (or its CSV export)
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Label used as record provenance and in logs
    fn name(&self) -> &str;

    /// Fetch every data row, in sheet order
    async fn fetch_all_rows(&self) -> Result<Vec<Record>>;
}

/// Parse a CSV export (header row + data rows) into records
///
/// Header text is kept verbatim (trailing spaces matter). Completely empty
/// rows are dropped. When a header repeats, the first column wins.
pub fn records_from_csv<R: Read>(source: &str, reader: R) -> Result<Vec<Record>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let row = result?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        // +2: 1-indexed + header row
        let mut record = Record::new(source, index + 2);
        for (header, value) in headers.iter().zip(row.iter()) {
            record
                .fields
                .entry(header.to_string())
                .or_insert_with(|| value.to_string());
        }
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// CSV FILE SOURCE
// ============================================================================

/// Local CSV export (File → Download → CSV)
pub struct CsvFileSource {
    name: String,
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        CsvFileSource {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RecordSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_all_rows(&self) -> Result<Vec<Record>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records = records_from_csv(&self.name, bytes.as_slice())?;
        debug!(source = %self.name, path = %self.path.display(), rows = records.len(), "Read CSV file");
        Ok(records)
    }
}

// ============================================================================
// SHEET CSV-EXPORT SOURCE
// ============================================================================

/// Spreadsheet fetched over HTTP as CSV
///
/// The credential is opaque: when present it is sent as a bearer token.
pub struct SheetCsvSource {
    name: String,
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl SheetCsvSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        token: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        SheetCsvSource {
            name: name.into(),
            url: url.into(),
            token,
            client,
        }
    }
}

#[async_trait]
impl RecordSource for SheetCsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_all_rows(&self) -> Result<Vec<Record>> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let body = request.send().await?.error_for_status()?.bytes().await?;
        let records = records_from_csv(&self.name, body.as_ref())?;
        debug!(source = %self.name, rows = records.len(), "Fetched sheet export");
        Ok(records)
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Fixed rows, for tests and embedding
pub struct MemorySource {
    name: String,
    records: Vec<Record>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        MemorySource {
            name: name.into(),
            records,
        }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_all_rows(&self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Open a source from a location string
///
/// `http://` / `https://` → [`SheetCsvSource`], anything else is a file path.
pub fn open_source(
    name: &str,
    location: &str,
    token: Option<String>,
    client: reqwest::Client,
) -> Box<dyn RecordSource> {
    let lower = location.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Box::new(SheetCsvSource::new(name, location, token, client))
    } else {
        Box::new(CsvFileSource::new(name, location))
    }
}

/// Ordered collection of sources read as one logical record set
#[derive(Default)]
pub struct SourceSet {
    sources: Vec<Box<dyn RecordSource>>,
}

impl SourceSet {
    pub fn new(sources: Vec<Box<dyn RecordSource>>) -> Self {
        SourceSet { sources }
    }

    /// Builder pattern: append a source after the existing ones
    pub fn with_source(mut self, source: Box<dyn RecordSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fresh snapshot of every source, concatenated in configuration order
    ///
    /// Any failing source fails the whole fetch: a partial record set could
    /// pick an older record as "latest".
    pub async fn fetch_all(&self) -> Result<Vec<Record>> {
        let mut all = Vec::new();
        for source in &self.sources {
            let rows = source.fetch_all_rows().await?;
            info!(source = source.name(), rows = rows.len(), "Fetched records");
            all.extend(rows);
        }
        Ok(all)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAYMENT_CSV: &str = "Timestamp,Email Address,Member Name,Payment Month ,Any additional comments?\n\
        1/5/2025 10:00:00,a@x.com,Alice,1/2025,3 months\n\
        ,,,,\n\
        2/5/2025 11:00:00,b@x.com,Bob,,\n";

    #[test]
    fn test_records_from_csv_keeps_headers_verbatim() {
        let records = records_from_csv("payments", PAYMENT_CSV.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Payment Month "), Some("1/2025"));
        assert_eq!(records[0].row, 2);
        assert_eq!(records[0].source, "payments");
        // blank row 3 skipped, row numbers still match the sheet
        assert_eq!(records[1].row, 4);
        assert_eq!(records[1].get("Member Name"), Some("Bob"));
    }

    #[test]
    fn test_duplicate_header_first_column_wins() {
        let csv = "Email,Email\nfirst@x.com,second@x.com\n";
        let records = records_from_csv("dup", csv.as_bytes()).unwrap();

        assert_eq!(records[0].get("Email"), Some("first@x.com"));
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let csv = "Timestamp,Email,Name\n1/1/2025,a@x.com\n";
        let records = records_from_csv("short", csv.as_bytes()).unwrap();

        assert_eq!(records[0].get("Email"), Some("a@x.com"));
        assert_eq!(records[0].get("Name"), None);
    }

    #[tokio::test]
    async fn test_csv_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PAYMENT_CSV.as_bytes()).unwrap();

        let source = CsvFileSource::new("payments", file.path());
        let records = source.fetch_all_rows().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(source.name(), "payments");
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let source = CsvFileSource::new("payments", "/definitely/not/here.csv");
        assert!(source.fetch_all_rows().await.is_err());
    }

    #[tokio::test]
    async fn test_sheet_source_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAYMENT_CSV))
            .mount(&server)
            .await;

        let source = SheetCsvSource::new(
            "payments",
            format!("{}/export", server.uri()),
            Some("secret".to_string()),
            reqwest::Client::new(),
        );
        let records = source.fetch_all_rows().await.unwrap();

        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_sheet_source_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let source = SheetCsvSource::new("payments", server.uri(), None, reqwest::Client::new());
        assert!(source.fetch_all_rows().await.is_err());
    }

    #[tokio::test]
    async fn test_source_set_concatenates_in_order() {
        let payments = MemorySource::new("payments", vec![Record::new("payments", 2)]);
        let applications = MemorySource::new(
            "applications",
            vec![Record::new("applications", 2), Record::new("applications", 3)],
        );

        let set = SourceSet::default()
            .with_source(Box::new(payments))
            .with_source(Box::new(applications));
        let records = set.fetch_all().await.unwrap();

        let origins: Vec<String> = records.iter().map(Record::origin).collect();
        assert_eq!(origins, vec!["payments#2", "applications#2", "applications#3"]);
    }

    #[test]
    fn test_open_source_picks_kind() {
        let client = reqwest::Client::new();

        let web = open_source("p", "HTTPS://example.com/x.csv", None, client.clone());
        let file = open_source("a", "./applications.csv", None, client);

        assert_eq!(web.name(), "p");
        assert_eq!(file.name(), "a");
    }
}
