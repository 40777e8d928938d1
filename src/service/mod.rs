pub mod http;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::report::{MalformedReportError, ReportId, ResultSet};

pub use http::{decode_poll_response, decode_submit_response, HttpReportService, HttpServiceConfig};

/// Outcome of one status check, decoded once at the service boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResponse {
    Running,
    Complete(ResultSet),
    Failed { reason: String },
}

/// The remote side of a report session.
///
/// Implementations turn wire responses into [`ReportId`] and [`PollResponse`]
/// values so nothing past this trait looks at content types or status codes.
pub trait ReportService: Send + Sync {
    fn submit(&self) -> BoxFuture<'_, Result<ReportId, SubmissionError>>;

    fn poll<'a>(&'a self, id: &'a ReportId) -> BoxFuture<'a, Result<PollResponse, PollError>>;
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to reach report service: {source}")]
    Transport {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("report service answered {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("unexpected submit response: {message}")]
    Decode { message: String },
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to reach report service: {source}")]
    Transport {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("report service answered {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("unexpected status response: {message}")]
    Decode { message: String },

    #[error("unexpected content type '{content_type}'")]
    UnexpectedContentType { content_type: String },

    #[error("unknown report status '{status}'")]
    UnknownStatus { status: String },

    #[error("report generation failed: {reason}")]
    Rejected { reason: String },

    #[error("malformed report: {source}")]
    Malformed {
        #[from]
        source: MalformedReportError,
    },

    #[error("report still running after {polls} status checks")]
    Exhausted { polls: u32 },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },
}
