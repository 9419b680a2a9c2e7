//! Durable trivia storage backed by SQLite.
//!
//! Holds the question bank, the users, per-room statistics and alias edges.
//! Every handle shares one connection pool, and writes go through
//! transactions that are retried when another writer holds the lock.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;

pub mod aliases;
pub mod statistics;

pub use statistics::HallOfFameEntry;

const SCHEMA: &str = include_str!("schema.sql");

/// Base wait between retries of a contended write, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// How long a connection waits on a locked database before reporting contention
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the durable store. Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct TriviaStore {
    pool: SqlitePool,
    retry_attempts: u32,
}

impl TriviaStore {
    /// Open (creating if needed) the database file and apply the schema
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        info!("Opening trivia database at {}", config.database_path);

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, config.retry_attempts).await
    }

    /// A private in-memory database living on a single pooled connection
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, StoreConfig::default().retry_attempts).await
    }

    async fn with_pool(pool: SqlitePool, retry_attempts: u32) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        debug!("Trivia schema is in place");

        Ok(Self {
            pool,
            retry_attempts,
        })
    }

    /// Append a direct question to the question bank
    pub async fn insert_question(&self, question: &str, answer: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO Questions ( Question, Answer ) VALUES ( ?, ? )")
            .bind(question)
            .bind(answer)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append a word to the scrambled-word list
    pub async fn insert_scrambled_word(&self, word: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO ScrambledWords ( Word ) VALUES ( ? )")
            .bind(word)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Uniformly sample up to `limit` distinct rows of the question bank
    pub async fn random_questions(&self, limit: usize) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT Question, Answer FROM Questions ORDER BY RANDOM() LIMIT ?",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Uniformly sample up to `limit` distinct scrambled-word rows
    pub async fn random_words(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT Word FROM ScrambledWords ORDER BY RANDOM() LIMIT ?",
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Run `attempt` until it succeeds, retrying only lock contention.
    pub(crate) async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if is_contention(&e) => {
                    if attempts >= self.retry_attempts {
                        return Err(StoreError::Conflict {
                            operation,
                            attempts,
                        });
                    }

                    warn!(
                        "Contention during {} (attempt {}/{}): {}",
                        operation, attempts, self.retry_attempts, e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempts).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
impl TriviaStore {
    /// Remove a table so later writes to it fail
    pub(crate) async fn drop_table(&self, table: &str) {
        sqlx::raw_sql(&format!("DROP TABLE {table}"))
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes
fn is_contention(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

pub(crate) async fn find_user_id(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT Id FROM Users WHERE Name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn get_or_create_user_id(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT INTO Users ( Name ) VALUES ( ? ) ON CONFLICT ( Name ) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    sqlx::query_scalar::<_, i64>("SELECT Id FROM Users WHERE Name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

pub(crate) async fn get_or_create_game_id(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT INTO Games ( Name ) VALUES ( ? ) ON CONFLICT ( Name ) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    sqlx::query_scalar::<_, i64>("SELECT Id FROM Games WHERE Name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}
