use snafu::Snafu;

pub const LOG_TARGET: &str = "stashcache::query";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueryError {
    #[snafu(display("query failed"))]
    Db { source: sqlx::Error },

    #[snafu(display("filter field {field:?} is not valid for {kind}"))]
    UnknownField { kind: stashcache_core::EntityKind, field: String },
}

pub type QueryResult<T> = Result<T, QueryError>;

impl From<sqlx::Error> for QueryError {
    fn from(source: sqlx::Error) -> Self {
        QueryError::Db { source }
    }
}
