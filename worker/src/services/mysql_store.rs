//! MySQL-backed record source and result sink

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{MySql, QueryBuilder, Row};
use tracing::debug;

use shared::{Record, RecordId};

use crate::config::{DatabaseConfig, WorkerConfig};
use crate::error::WorkerResult;
use crate::traits::{RecordSource, ResultSink};
use crate::types::TaskId;

/// Rows per INSERT statement, well below the placeholder limit
const INSERT_CHUNK: usize = 1000;
const MAX_CONNECTIONS: u32 = 4;

/// Record store backed by a MySQL connection pool
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    record_table: String,
    results_table: String,
}

impl MySqlStore {
    /// Connect using the worker configuration
    pub async fn connect(config: &WorkerConfig) -> WorkerResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(config.database.connect_timeout)
            .connect_with(connect_options(&config.database))
            .await?;

        Ok(Self::with_pool(pool, &config.record_table, &config.results_table))
    }

    pub fn with_pool(pool: MySqlPool, record_table: &str, results_table: &str) -> Self {
        Self {
            pool,
            record_table: record_table.to_string(),
            results_table: results_table.to_string(),
        }
    }
}

fn connect_options(db: &DatabaseConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .username(&db.user)
        .password(&db.password)
        .database(&db.database)
        .charset("utf8mb4")
}

/// `SELECT ... WHERE id IN (...) ORDER BY id` for the given ids
fn select_records<'a>(table: &str, ids: &'a [RecordId]) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT CAST(id AS SIGNED) AS id, title, dynasty, author, content_original FROM {table} WHERE id IN ("
    ));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");
    builder
}

/// Multi-row INSERT of `(quiz_poem2_id, match_names, task_id)`
fn insert_results<'a>(table: &str, task_id: TaskId, rows: &'a [(RecordId, String)]) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {table} (quiz_poem2_id, match_names, task_id) "
    ));
    builder.push_values(rows, |mut b, (id, result)| {
        b.push_bind(*id).push_bind(result.as_str()).push_bind(task_id);
    });
    builder
}

fn text_column(row: &MySqlRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn record_from_row(row: &MySqlRow) -> Result<Record, sqlx::Error> {
    Ok(Record::new(
        row.try_get::<i64, _>("id")?,
        text_column(row, "title")?,
        text_column(row, "dynasty")?,
        text_column(row, "author")?,
        text_column(row, "content_original")?,
    ))
}

#[async_trait]
impl RecordSource for MySqlStore {
    async fn fetch_by_ids(&self, ids: &[RecordId]) -> WorkerResult<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = select_records(&self.record_table, ids)
            .build()
            .fetch_all(&self.pool)
            .await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(requested = ids.len(), fetched = records.len(), "Fetched records");
        Ok(records)
    }
}

#[async_trait]
impl ResultSink for MySqlStore {
    async fn persist(&self, task_id: TaskId, results: &[(RecordId, String)]) -> WorkerResult<usize> {
        if results.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for chunk in results.chunks(INSERT_CHUNK) {
            written += insert_results(&self.results_table, task_id, chunk)
                .build()
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        debug!(task_id, rows = written, "Persisted results");
        Ok(written as usize)
    }
}
