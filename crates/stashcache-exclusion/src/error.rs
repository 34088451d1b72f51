use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum ExclusionError {
    #[snafu(transparent)]
    Db { source: stashcache_db::DbError },
}

pub type ExclusionResult<T> = std::result::Result<T, ExclusionError>;
