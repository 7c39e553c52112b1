//! Database pool construction.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Per-statement timeout applied to every pooled connection.
pub const QUERY_TIMEOUT_SECONDS: u32 = 5;

/// Connect a pool with the service's sizing and statement timeout.
pub async fn connect_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&add_query_timeout(database_url, QUERY_TIMEOUT_SECONDS))
        .await
}

/// Adds statement_timeout to the database URL.
pub fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}options=-c%20statement_timeout%3D{timeout_secs}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_query_timeout_without_params() {
        assert_eq!(
            add_query_timeout("postgres://localhost/nomnom", 5),
            "postgres://localhost/nomnom?options=-c%20statement_timeout%3D5s"
        );
    }

    #[test]
    fn test_add_query_timeout_with_params() {
        assert_eq!(
            add_query_timeout("postgres://localhost/nomnom?sslmode=require", 10),
            "postgres://localhost/nomnom?sslmode=require&options=-c%20statement_timeout%3D10s"
        );
    }
}
