//! Mapping from driver errors to [`StoreError`].

use domain::StoreError;

/// Classifies a sqlx failure. Pool and I/O trouble is retryable.
pub fn from_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

pub fn from_redis(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Database(err.to_string())
    }
}

pub fn from_json(err: serde_json::Error) -> StoreError {
    StoreError::Database(format!("corrupt document: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_mapping() {
        assert_eq!(from_sqlx(sqlx::Error::RowNotFound), StoreError::NotFound);
        assert!(from_sqlx(sqlx::Error::PoolTimedOut).is_transient());
        assert!(matches!(
            from_sqlx(sqlx::Error::ColumnNotFound("version".into())),
            StoreError::Database(_)
        ));
    }
}
