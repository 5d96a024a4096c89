//! PostgreSQL driver backed by an sqlx connection pool.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use historias_db_mock::{QueryResult, Row as ResultRow};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

use super::{Driver, DriverError, ErrorChannel, ErrorReceiver};
use crate::config::{ConnectionConfig, ConnectionParams};

const PROBE_QUERY: &str = "SELECT NOW()";

/// [`Driver`] over a lazily connected `PgPool`.
///
/// No connection is opened until [`connect`](Driver::connect) or the first
/// query. Connection-level failures seen on any query are also reported on
/// the error channel, so the manager learns about a dropped database even
/// when the caller only sees a fallback result.
pub struct PgDriver {
    pool: PgPool,
    errors: ErrorChannel,
}

impl PgDriver {
    /// Builds the pool from the configuration's connection string (or
    /// individual parameters), pool size, idle timeout, connect timeout and
    /// TLS flag.
    pub fn new(config: &ConnectionConfig) -> Result<Self, DriverError> {
        let options = connect_options(config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections())
            .idle_timeout(Some(config.idle_timeout()))
            .acquire_timeout(config.connect_timeout())
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            errors: ErrorChannel::new(),
        })
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions, DriverError> {
    let options = match (config.connection_string(), config.params()) {
        (Some(url), _) => {
            PgConnectOptions::from_str(url).map_err(|e| DriverError::Config(e.to_string()))?
        }
        (None, Some(params)) => params_options(params),
        (None, None) => {
            return Err(DriverError::Config(
                "no connection string or host configured".to_string(),
            ))
        }
    };

    let ssl_mode = if config.use_tls() {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    };
    Ok(options.ssl_mode(ssl_mode))
}

fn params_options(params: &ConnectionParams) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(params.host())
        .port(params.port());
    if let Some(user) = params.user() {
        options = options.username(user);
    }
    if let Some(password) = params.password() {
        options = options.password(password);
    }
    if let Some(database) = params.database() {
        options = options.database(database);
    }
    options
}

impl std::fmt::Debug for PgDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDriver")
            .field("size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl Driver for PgDriver {
    fn connect(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(async move {
            sqlx::query(PROBE_QUERY)
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(|e| match classify(e) {
                    DriverError::Query(message) | DriverError::Lost(message) => {
                        DriverError::Connect(message)
                    }
                    other => other,
                })
        })
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Result<QueryResult, DriverError>> {
        Box::pin(async move {
            let query = params.iter().fold(sqlx::query(sql), bind_param);

            match query.fetch_all(&self.pool).await {
                Ok(rows) => {
                    let rows = rows.iter().map(row_to_json).collect();
                    Ok(QueryResult::from_rows(rows))
                }
                Err(e) => {
                    let error = classify(e);
                    if error.is_connection_level() {
                        self.errors.report(error.clone());
                    }
                    Err(error)
                }
            }
        })
    }

    fn end(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.pool.close())
    }

    fn take_errors(&self) -> Option<ErrorReceiver> {
        self.errors.take_receiver()
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

fn row_to_json(row: &PgRow) -> ResultRow {
    let mut out = ResultRow::new();
    for column in row.columns() {
        let value = column_value(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

fn column_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(index).map(Value::from),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            row.try_get::<String, _>(index).map(Value::from)
        }
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|t| Value::from(t.to_rfc3339_opts(SecondsFormat::Millis, true))),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|t| Value::from(t.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| Value::from(d.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        other => {
            tracing::debug!(
                column = index,
                type_name = other,
                "unsupported column type, returning null"
            );
            return Value::Null;
        }
    };

    decoded.unwrap_or(Value::Null)
}

fn classify(error: sqlx::Error) -> DriverError {
    match error {
        sqlx::Error::Configuration(e) => DriverError::Config(e.to_string()),
        sqlx::Error::PoolClosed => DriverError::Closed,
        sqlx::Error::PoolTimedOut => {
            DriverError::Connect("timed out acquiring a connection".to_string())
        }
        e @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed) => DriverError::Lost(e.to_string()),
        other => DriverError::Query(other.to_string()),
    }
}
