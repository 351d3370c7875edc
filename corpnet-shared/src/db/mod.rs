//! Database layer for Corpnet
//!
//! - `pool`: PostgreSQL pool creation, health check and stats
//! - `migrations`: embedded schema migrations from the workspace `migrations/` directory
//!
//! Models live in the crate-level `models` module.
//!
//! # Example
//!
//! ```no_run
//! use corpnet_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
//! corpnet_shared::db::migrations::run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod pool;

/// Extracts the offending column from a Postgres constraint violation detail
///
/// Postgres reports unique and foreign key violations as
/// `Key (email)=(a@b.com) already exists.` or
/// `Key (lower(email::text))=(...)`. The innermost identifier inside the
/// parentheses is returned, so both forms yield `email`.
///
/// # Example
///
/// ```
/// use corpnet_shared::db::offending_column;
///
/// assert_eq!(offending_column("Key (sent_to)=(42) is not present"), Some("sent_to".to_string()));
/// assert_eq!(offending_column("something else"), None);
/// ```
pub fn offending_column(detail: &str) -> Option<String> {
    let start = detail.find("Key (")? + "Key (".len();
    let end = start + detail[start..].find(")=(")?;
    let key = &detail[start..end];

    // Composite keys report "event_id, user_id": the last column is the interesting one
    let last = key.rsplit(',').next()?.trim();

    // Expression indexes: lower(email::text) -> email
    let inner = last
        .rsplit('(')
        .next()
        .unwrap_or(last)
        .split([')', ':'])
        .next()
        .unwrap_or(last)
        .trim();

    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offending_column_plain() {
        assert_eq!(
            offending_column("Key (email)=(a@b.com) already exists."),
            Some("email".to_string())
        );
    }

    #[test]
    fn test_offending_column_expression_index() {
        assert_eq!(
            offending_column("Key (lower(email::text))=(a@b.com) already exists."),
            Some("email".to_string())
        );
    }

    #[test]
    fn test_offending_column_composite() {
        assert_eq!(
            offending_column("Key (event_id, user_id)=(1, 2) already exists."),
            Some("user_id".to_string())
        );
    }

    #[test]
    fn test_offending_column_missing() {
        assert_eq!(offending_column("new row violates check constraint"), None);
    }
}
