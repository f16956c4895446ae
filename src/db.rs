use diesel::{
    connection::SimpleConnection,
    r2d2::{self, ConnectionManager, CustomizeConnection, PooledConnection},
    SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Error)]
pub enum DbSetupError {
    #[error("could not open database: {0}")]
    Pool(#[from] r2d2::PoolError),
    #[error("failed to run migrations: {0}")]
    Migrations(String),
}

/// Per-connection pragmas. Schedulers in separate processes may share one
/// database file, so writers wait on the lock instead of failing.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn initialize_db_pool(database_url: &str) -> Result<DbPool, DbSetupError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), DbSetupError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DbSetupError::Migrations(e.to_string()))?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "Applied database migrations");
    }
    Ok(())
}

/// Open the pool and bring the schema up to date.
pub fn setup(database_url: &str) -> Result<DbPool, DbSetupError> {
    let pool = initialize_db_pool(database_url)?;
    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    Ok(pool)
}
