use snafu::Snafu;

pub const LOG_TARGET: &str = "stashcache::prober";

#[derive(Debug, Snafu)]
pub enum ProbeError {
    #[snafu(display("request to {url} failed: {source}"))]
    Request { url: String, source: reqwest::Error },
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
