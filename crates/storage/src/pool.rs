//! Connection pool construction.

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::error::{StorageError, StorageResult};

/// Connect a pool of at most `max_connections` to `database_url`.
///
/// `target` names the connection slot in error messages.
pub async fn connect_pool(
    target: &str,
    database_url: &str,
    max_connections: u32,
) -> StorageResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(60))
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection {
            target: target.to_string(),
            message: e.to_string(),
        })
}

/// Check that `name` is a plain SQL identifier and return it lowercased.
///
/// Archive table and element names are interpolated into queries, so anything
/// outside `[a-z0-9_]` is refused.
pub fn sql_ident(name: &str) -> StorageResult<String> {
    let lower = name.to_ascii_lowercase();
    let valid = !lower.is_empty()
        && lower
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(lower)
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_ident_lowercases() {
        assert_eq!(sql_ident("T_ADATA").unwrap(), "t_adata");
        assert_eq!(sql_ident("tam_12").unwrap(), "tam_12");
    }

    #[test]
    fn test_sql_ident_rejects_injection() {
        assert!(sql_ident("tam; DROP TABLE x").is_err());
        assert!(sql_ident("\"tam\"").is_err());
        assert!(sql_ident("").is_err());
    }
}
