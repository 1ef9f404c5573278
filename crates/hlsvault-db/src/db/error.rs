//! Mapping from sqlx errors onto storage errors

use hlsvault_storage::StorageError;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Translate a database error for an operation on `name`.
pub fn map_sqlx_error(err: sqlx::Error, name: &str) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::NotFound(name.to_string()),
        sqlx::Error::Database(ref db_err)
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
        {
            StorageError::DuplicateName(name.to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StorageError::Unavailable(err.to_string()),
        other => StorageError::BackendError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound, "alpha.mp4"),
            StorageError::NotFound(name) if name == "alpha.mp4"
        ));
    }

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut, "alpha.mp4"),
            StorageError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed, "alpha.mp4"),
            StorageError::Unavailable(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_sqlx_error(sqlx::Error::Io(io), "alpha.mp4"),
            StorageError::Unavailable(_)
        ));
    }

    #[test]
    fn test_other_errors_are_backend_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::Protocol("bad frame".to_string()), "alpha.mp4"),
            StorageError::BackendError(_)
        ));
    }
}
