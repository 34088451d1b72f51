use snafu::Snafu;
use stashcache_core::EntityKind;

#[derive(Debug, Snafu)]
pub enum UpstreamError {
    #[snafu(display("request to {url} failed: {source}"))]
    Request { url: String, source: reqwest::Error },
    #[snafu(display("upstream returned {status} for {url}"))]
    Status { url: String, status: reqwest::StatusCode },
    #[snafu(display("GraphQL errors for {kind}: {message}"))]
    GraphQl { kind: EntityKind, message: String },
    #[snafu(display("GraphQL response for {kind} had no `data` field"))]
    MissingData { kind: EntityKind },
    #[snafu(display("upstream did not report a total count for {kind} (§4.1 fatal)"))]
    MissingCount { kind: EntityKind },
}

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
