//! Shared Diesel error mapping for the diary repositories.
//!
//! Each repository supplies its own `connection` and `query` constructors so
//! the transient/permanent split stays identical across ports.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into a repository-specific connection error.
pub(crate) fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    connection(error.into_message())
}

/// Map Diesel errors into query or connection errors.
///
/// Closed connections and serialization failures are retryable and go to
/// `connection`; everything else goes to `query`.
pub(crate) fn map_basic_diesel_error<E, Q, C>(
    error: DieselError,
    operation: &str,
    query: Q,
    connection: C,
) -> E
where
    Q: FnOnce(String) -> E,
    C: FnOnce(String) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            %operation,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query(format!("{operation}: record not found")),
        DieselError::QueryBuilderError(_) => query(format!("{operation}: database query error")),
        DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::SerializationFailure,
            info,
        ) => connection(format!("{operation}: {}", info.message())),
        DieselError::BrokenTransactionManager => {
            connection(format!("{operation}: transaction manager is broken"))
        }
        DieselError::DatabaseError(_, info) => query(format!("{operation}: {}", info.message())),
        other => query(format!("{operation}: {other}")),
    }
}

/// Convert a domain counter to its `INT4` column value.
pub(crate) fn count_to_db(value: u32, column: &str) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("{column} {value} exceeds INT4 range"))
}

/// Convert an `INT4` column value to a domain counter.
pub(crate) fn count_from_db(value: i32, column: &str) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("negative {column} in database: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum Mapped {
        Query(String),
        Connection(String),
    }

    fn map(error: DieselError) -> Mapped {
        map_basic_diesel_error(error, "insert diary", Mapped::Query, Mapped::Connection)
    }

    #[rstest]
    fn not_found_is_query_error() {
        assert_eq!(
            map(DieselError::NotFound),
            Mapped::Query("insert diary: record not found".to_owned())
        );
    }

    #[rstest]
    fn broken_transaction_is_connection_error() {
        assert!(matches!(
            map(DieselError::BrokenTransactionManager),
            Mapped::Connection(_)
        ));
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let mapped = map_basic_pool_error(PoolError::checkout("timed out"), Mapped::Connection);
        assert_eq!(mapped, Mapped::Connection("timed out".to_owned()));
    }

    #[rstest]
    #[case(0, Ok(0))]
    #[case(-1, Err(()))]
    #[case(7, Ok(7))]
    fn counts_from_db_reject_negatives(#[case] raw: i32, #[case] expected: Result<u32, ()>) {
        assert_eq!(count_from_db(raw, "attempts").map_err(|_| ()), expected);
    }

    #[rstest]
    fn counts_to_db_reject_overflow() {
        assert!(count_to_db(u32::MAX, "current_streak").is_err());
        assert_eq!(count_to_db(3, "current_streak"), Ok(3));
    }
}
