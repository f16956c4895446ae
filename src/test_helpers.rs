use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::MigrationHarness;
use tempfile::TempDir;

use crate::db::{self, DbPool, MIGRATIONS};
use crate::models::feed::{Feed, NewFeed};

/// Create a test database with a temporary file
pub fn create_test_db() -> (TempDir, DbPool) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let pool = db::setup(db_path.to_str().expect("temp path is UTF-8"))
        .expect("Failed to set up test database");
    (temp_dir, pool)
}

/// Create an in-memory test database connection
pub fn get_test_db_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:")
        .unwrap_or_else(|_| panic!("Error connecting to in-memory SQLite database"));

    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
    conn
}

pub fn insert_test_feed(conn: &mut SqliteConnection, name: &str, url: &str) -> Feed {
    NewFeed::new(name, url, None)
        .insert(conn)
        .expect("Failed to insert test feed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{feeds, users};

    #[test]
    fn test_create_test_db() {
        let (_temp_dir, pool) = create_test_db();
        let mut conn = pool.get().expect("Failed to get connection");

        let user_count: i64 = users::table.count().first(&mut conn).expect("Failed to count users");
        assert_eq!(user_count, 0);
    }

    #[test]
    fn test_insert_test_feed() {
        let mut conn = get_test_db_connection();
        let feed = insert_test_feed(&mut conn, "Lane", "https://wagslane.dev/index.xml");
        assert_eq!(feed.last_fetched_at, None);

        let feed_count: i64 = feeds::table.count().first(&mut conn).unwrap();
        assert_eq!(feed_count, 1);
    }
}
