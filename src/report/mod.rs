use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DELIMITER: u8 = b',';

// opaque job token handed out by the report service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReportStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Running is the only state allowed to transition to itself.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running | Self::Complete | Self::Failed) => true,
            (Self::Running, Self::Running | Self::Complete | Self::Failed) => true,
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How rows whose field count differs from the header are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowPolicy {
    /// Pad short rows with empty values and drop extra trailing fields.
    #[default]
    Fill,
    /// Reject the whole report on the first ragged row.
    Strict,
}

#[derive(Debug, Error)]
pub enum MalformedReportError {
    #[error("report body has no header line")]
    MissingHeader,

    #[error("row on line {line} has {found} fields, header has {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("failed to read report body: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },
}

/// One data row. Values are stored positionally and resolved by name through
/// the header shared with the owning [`ResultSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRow {
    header: Arc<[String]>,
    values: Vec<String>,
}

impl ReportRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.header.iter().position(|h| h == column)?;
        self.values.get(idx).map(|v| v.as_str())
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn columns(&self) -> &[String] {
        &self.header
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Immutable, finite collection of rows sharing one header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultSet {
    header: Arc<[String]>,
    rows: Vec<ReportRow>,
}

impl ResultSet {
    /// Builds a result set from raw positional records, applying `policy` to
    /// records whose length differs from the header.
    pub fn from_records<I, R>(
        header: Vec<String>,
        records: I,
        policy: RowPolicy,
    ) -> Result<Self, MalformedReportError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = String>,
    {
        let header: Arc<[String]> = header
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>()
            .into();
        let mut rows = Vec::new();
        for (idx, record) in records.into_iter().enumerate() {
            // header is line 1
            let line = idx as u64 + 2;
            let values = fit_record(record.into_iter().collect(), header.len(), line, policy)?;
            rows.push(ReportRow {
                header: header.clone(),
                values,
            });
        }
        Ok(Self { header, rows })
    }

    /// Parses a delimiter-separated body whose first line is the header.
    ///
    /// There is no quoting or escaping: a delimiter or line break inside a
    /// value shifts every following column of that row. Blank lines yield no
    /// row.
    pub fn parse(
        text: &str,
        delimiter: u8,
        policy: RowPolicy,
    ) -> Result<Self, MalformedReportError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .quoting(false)
            .flexible(true)
            .has_headers(false)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record.map_err(|source| MalformedReportError::Csv { source })?,
            None => return Err(MalformedReportError::MissingHeader),
        };
        let header: Arc<[String]> = header
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>()
            .into();

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|source| MalformedReportError::Csv { source })?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let values = record.iter().map(|v| v.to_string()).collect();
            let values = fit_record(values, header.len(), line, policy)?;
            rows.push(ReportRow {
                header: header.clone(),
                values,
            });
        }

        tracing::debug!(
            target: "reportwatch.report",
            columns = header.len(),
            rows = rows.len(),
            "parsed report body"
        );
        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn fit_record(
    mut values: Vec<String>,
    expected: usize,
    line: u64,
    policy: RowPolicy,
) -> Result<Vec<String>, MalformedReportError> {
    let found = values.len();
    if found == expected {
        return Ok(values);
    }
    match policy {
        RowPolicy::Strict => Err(MalformedReportError::RaggedRow {
            line,
            expected,
            found,
        }),
        RowPolicy::Fill => {
            tracing::warn!(
                target: "reportwatch.report",
                line,
                expected,
                found,
                "ragged row coerced to header width"
            );
            values.resize(expected, String::new());
            Ok(values)
        }
    }
}
