//! Tool executor: validates each call against the security policy, runs it
//! through the connection pool, and shapes the result.
//!
//! Read paths (select, catalog inspection) run under the pool's retry
//! wrapper so a transient disconnect is survived; write paths run directly
//! so a mutation is never replayed.

use crate::error::McpError;
use crate::format::{bind_value, rows_to_json};
use sqlgate_core::{Dialect, GatewayConfig};
use sqlgate_policy::{OperationKind, SecurityValidator};
use sqlgate_pool::{ConnectionPool, PoolError, SqlBackend, SqlPool};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::AnyConnection;
use sqlx::Row;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

const MAX_RETRIES: u32 = 2;

/// Executes tool calls against the backend.
pub struct ToolExecutor {
    pool: SqlPool,
    validator: SecurityValidator,
    dialect: Dialect,
    query_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ListTablesParams {
    #[serde(default)]
    database: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescribeTableParams {
    table: String,
    #[serde(default)]
    database: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectParams {
    query: String,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct InsertParams {
    table: String,
    data: Map<String, Value>,
    #[serde(default)]
    database: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateParams {
    table: String,
    data: Map<String, Value>,
    conditions: Map<String, Value>,
    #[serde(default)]
    database: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    table: String,
    conditions: Map<String, Value>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExecuteParams {
    query: String,
    #[serde(default)]
    params: Vec<Value>,
}

impl ToolExecutor {
    /// Build an executor from configuration.
    pub fn new(config: &GatewayConfig) -> Self {
        let dialect = config.database.backend;
        let backend = SqlBackend::new(&config.database);
        let pool = ConnectionPool::new(backend, &config.pool);
        let validator = SecurityValidator::new(config.security.clone(), dialect);
        Self {
            pool,
            validator,
            dialect,
            query_timeout: Duration::from_secs(config.database.query_timeout_seconds),
        }
    }

    /// The pool this executor runs on.
    pub fn pool(&self) -> &SqlPool {
        &self.pool
    }

    /// Dispatch a tool call by name.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };

        match name {
            "list_databases" => self.list_databases().await,
            "list_tables" => self.list_tables(parse(name, arguments)?).await,
            "describe_table" => self.describe_table(parse(name, arguments)?).await,
            "server_status" => self.server_status().await,
            "select" => self.select(parse(name, arguments)?).await,
            "insert" => self.insert(parse(name, arguments)?).await,
            "update" => self.update(parse(name, arguments)?).await,
            "delete" => self.delete(parse(name, arguments)?).await,
            "execute" => self.execute_query(parse(name, arguments)?).await,
            _ => Err(McpError::ToolNotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn list_databases(&self) -> Result<Value, McpError> {
        let rows = self
            .fetch_all_retry(self.dialect.list_databases_query().to_string(), vec![])
            .await?;

        let names: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>(0).ok())
            .collect();
        let system = self.dialect.system_databases();
        let user: Vec<&String> = names
            .iter()
            .filter(|name| !system.contains(&name.as_str()))
            .collect();

        tracing::info!(total = names.len(), user = user.len(), "listed databases");
        Ok(json!({
            "databases": user,
            "system_databases": system,
            "total_count": names.len(),
        }))
    }

    async fn list_tables(&self, params: ListTablesParams) -> Result<Value, McpError> {
        let database = params.database.as_deref();
        let (sql, binds) = self.dialect.list_tables_query(database)?;
        let rows = self.fetch_all_retry(sql, binds).await?;

        let names: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>(0).ok())
            .collect();

        let tables = match self.dialect {
            Dialect::MySql => self.mysql_table_details(&names, database).await?,
            Dialect::Postgres => names
                .iter()
                .map(|name| json!({ "name": name }))
                .collect(),
        };

        tracing::info!(
            database = database.unwrap_or("current"),
            table_count = names.len(),
            "listed tables"
        );
        Ok(json!({
            "database": params.database,
            "tables": tables,
            "table_count": names.len(),
        }))
    }

    /// Per-table size and engine detail from information_schema (MySQL).
    async fn mysql_table_details(
        &self,
        tables: &[String],
        database: Option<&str>,
    ) -> Result<Vec<Value>, McpError> {
        const INFO_SQL: &str = "SELECT table_rows, data_length, index_length, engine, \
             table_collation FROM information_schema.tables \
             WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?";

        let mut conn = self.pool.acquire().await?;
        let mut details = Vec::with_capacity(tables.len());
        for table in tables {
            let row = sqlx::query(INFO_SQL)
                .bind(database)
                .bind(table.as_str())
                .fetch_optional(&mut *conn)
                .await;
            details.push(match row {
                Ok(Some(row)) => {
                    let data_size = row.try_get::<Option<i64>, _>(1).ok().flatten().unwrap_or(0);
                    let index_size = row.try_get::<Option<i64>, _>(2).ok().flatten().unwrap_or(0);
                    json!({
                        "name": table,
                        "engine": row.try_get::<Option<String>, _>(3).ok().flatten().unwrap_or_else(|| "Unknown".into()),
                        "collation": row.try_get::<Option<String>, _>(4).ok().flatten().unwrap_or_else(|| "Unknown".into()),
                        "row_count": row.try_get::<Option<i64>, _>(0).ok().flatten().unwrap_or(0),
                        "data_size": data_size,
                        "index_size": index_size,
                        "total_size": data_size + index_size,
                    })
                }
                _ => json!({ "name": table, "engine": "Unknown", "collation": "Unknown" }),
            });
        }
        self.pool.release(conn).await;
        Ok(details)
    }

    async fn describe_table(&self, params: DescribeTableParams) -> Result<Value, McpError> {
        let database = params.database.as_deref();

        let (sql, binds) = self
            .dialect
            .describe_columns_query(&params.table, database)?;
        let column_rows = self.fetch_all_retry(sql, binds).await?;
        let columns = rows_to_json(&column_rows);

        let (sql, binds) = self.dialect.list_indexes_query(&params.table, database)?;
        let index_rows = self.fetch_all_retry(sql, binds).await?;
        let indexes = match self.dialect {
            Dialect::MySql => group_mysql_indexes(rows_to_json(&index_rows)),
            Dialect::Postgres => rows_to_json(&index_rows),
        };

        tracing::info!(
            table = %params.table,
            column_count = columns.len(),
            "described table"
        );
        Ok(json!({
            "table": params.table,
            "database": params.database,
            "columns": columns,
            "indexes": indexes,
            "column_count": columns.len(),
        }))
    }

    async fn server_status(&self) -> Result<Value, McpError> {
        let rows = self
            .fetch_all_retry(self.dialect.version_query().to_string(), vec![])
            .await?;
        let version = rows
            .first()
            .and_then(|row| row.try_get::<String, _>(0).ok())
            .unwrap_or_else(|| "unknown".to_string());

        let stats = self.pool.stats().await;
        let reachable = self.pool.test_connection().await;

        Ok(json!({
            "backend": self.dialect.to_string(),
            "server_version": version,
            "connection_pool_size": stats.max_size,
            "active_connections": stats.in_use,
            "total_connections": stats.total,
            "connection_test": reachable,
        }))
    }

    async fn select(&self, params: SelectParams) -> Result<Value, McpError> {
        self.validator
            .validate_query(&params.query, OperationKind::Select)?;

        let mut sql = params.query;
        if let Some(limit) = params.limit {
            if !has_limit_keyword(&sql) {
                sql = format!("{sql} LIMIT {limit}");
            }
        }

        let start = Instant::now();
        let rows = self.fetch_all_retry(sql.clone(), vec![]).await?;
        self.validator.check_result_limit(rows.len())?;

        tracing::info!(
            row_count = rows.len(),
            execution_time_ms = elapsed_ms(start),
            "select executed"
        );
        Ok(json!({
            "query": sql,
            "rows": rows_to_json(&rows),
            "row_count": rows.len(),
            "execution_time_ms": elapsed_ms(start),
        }))
    }

    async fn insert(&self, params: InsertParams) -> Result<Value, McpError> {
        self.validator.validate_query(
            &format!("INSERT INTO {}", params.table),
            OperationKind::Insert,
        )?;
        if params.data.is_empty() {
            return Err(McpError::InvalidArguments {
                tool: "insert".to_string(),
                reason: "no data to insert".to_string(),
            });
        }

        let table = self.qualified_table(&params.table, params.database.as_deref())?;
        let column_list = params
            .data
            .keys()
            .map(|column| self.dialect.quote_ident(column))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let placeholders = (1..=params.data.len())
            .map(|position| self.dialect.placeholder(position))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})");

        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let outcome = async {
            let mut query = sqlx::query(&sql);
            for value in params.data.values() {
                query = bind_value(query, value);
            }
            let result = self.bounded(query.execute(&mut *conn)).await?;
            let insert_id = self.last_insert_id(&mut conn).await;
            Ok::<_, McpError>((result.rows_affected(), insert_id))
        }
        .await;
        self.pool.release(conn).await;

        let (affected, insert_id) = outcome?;

        tracing::info!(
            table = %params.table,
            affected_rows = affected,
            "insert executed"
        );
        Ok(json!({
            "query": sql,
            "table": params.table,
            "database": params.database,
            "affected_rows": affected,
            "insert_id": insert_id,
            "execution_time_ms": elapsed_ms(start),
        }))
    }

    async fn update(&self, params: UpdateParams) -> Result<Value, McpError> {
        self.validator.validate_query(
            &format!("UPDATE {}", params.table),
            OperationKind::Update,
        )?;
        if params.data.is_empty() {
            return Err(McpError::InvalidArguments {
                tool: "update".to_string(),
                reason: "no data to update".to_string(),
            });
        }
        if params.conditions.is_empty() {
            return Err(sqlgate_policy::SecurityViolation::missing_where_clause("UPDATE").into());
        }

        let table = self.qualified_table(&params.table, params.database.as_deref())?;
        let mut position = 0;
        let set_clause = params
            .data
            .keys()
            .map(|column| {
                position += 1;
                Ok(format!(
                    "{} = {}",
                    self.dialect.quote_ident(column)?,
                    self.dialect.placeholder(position)
                ))
            })
            .collect::<Result<Vec<_>, McpError>>()?
            .join(", ");
        let where_clause = params
            .conditions
            .keys()
            .map(|column| {
                position += 1;
                Ok(format!(
                    "{} = {}",
                    self.dialect.quote_ident(column)?,
                    self.dialect.placeholder(position)
                ))
            })
            .collect::<Result<Vec<_>, McpError>>()?
            .join(" AND ");
        let sql = format!("UPDATE {table} SET {set_clause} WHERE {where_clause}");

        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let outcome = {
            let mut query = sqlx::query(&sql);
            for value in params.data.values().chain(params.conditions.values()) {
                query = bind_value(query, value);
            }
            self.bounded(query.execute(&mut *conn)).await
        };
        self.pool.release(conn).await;

        let affected = outcome?.rows_affected();

        tracing::info!(
            table = %params.table,
            affected_rows = affected,
            "update executed"
        );
        Ok(json!({
            "query": sql,
            "table": params.table,
            "database": params.database,
            "affected_rows": affected,
            "execution_time_ms": elapsed_ms(start),
        }))
    }

    async fn delete(&self, params: DeleteParams) -> Result<Value, McpError> {
        self.validator.validate_query(
            &format!("DELETE FROM {}", params.table),
            OperationKind::Delete,
        )?;
        if params.conditions.is_empty() {
            return Err(sqlgate_policy::SecurityViolation::missing_where_clause("DELETE").into());
        }

        let table = self.qualified_table(&params.table, params.database.as_deref())?;
        let mut position = 0;
        let where_clause = params
            .conditions
            .keys()
            .map(|column| {
                position += 1;
                Ok(format!(
                    "{} = {}",
                    self.dialect.quote_ident(column)?,
                    self.dialect.placeholder(position)
                ))
            })
            .collect::<Result<Vec<_>, McpError>>()?
            .join(" AND ");
        let mut sql = format!("DELETE FROM {table} WHERE {where_clause}");

        if let Some(limit) = params.limit {
            match self.dialect {
                Dialect::MySql => sql.push_str(&format!(" LIMIT {limit}")),
                Dialect::Postgres => {
                    return Err(McpError::InvalidArguments {
                        tool: "delete".to_string(),
                        reason: "limit is not supported on postgres".to_string(),
                    })
                }
            }
        }

        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let outcome = {
            let mut query = sqlx::query(&sql);
            for value in params.conditions.values() {
                query = bind_value(query, value);
            }
            self.bounded(query.execute(&mut *conn)).await
        };
        self.pool.release(conn).await;

        let affected = outcome?.rows_affected();

        tracing::info!(
            table = %params.table,
            affected_rows = affected,
            "delete executed"
        );
        Ok(json!({
            "query": sql,
            "table": params.table,
            "database": params.database,
            "affected_rows": affected,
            "execution_time_ms": elapsed_ms(start),
        }))
    }

    async fn execute_query(&self, params: ExecuteParams) -> Result<Value, McpError> {
        let operation = OperationKind::classify(&params.query);
        self.validator.validate_query(&params.query, operation)?;

        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let outcome = async {
            if operation.returns_rows() {
                let mut query = sqlx::query(&params.query);
                for value in &params.params {
                    query = bind_value(query, value);
                }
                let rows = self.bounded(query.fetch_all(&mut *conn)).await?;
                self.validator.check_result_limit(rows.len())?;
                Ok::<_, McpError>(json!({
                    "operation": operation.as_str(),
                    "rows": rows_to_json(&rows),
                    "row_count": rows.len(),
                }))
            } else {
                let mut query = sqlx::query(&params.query);
                for value in &params.params {
                    query = bind_value(query, value);
                }
                let result = self.bounded(query.execute(&mut *conn)).await?;
                let insert_id = if operation == OperationKind::Insert {
                    self.last_insert_id(&mut conn).await
                } else {
                    None
                };
                Ok(json!({
                    "operation": operation.as_str(),
                    "affected_rows": result.rows_affected(),
                    "insert_id": insert_id,
                }))
            }
        }
        .await;
        self.pool.release(conn).await;

        let mut response = outcome?;
        if let Some(object) = response.as_object_mut() {
            object.insert("query".to_string(), json!(params.query));
            object.insert("execution_time_ms".to_string(), json!(elapsed_ms(start)));
        }

        tracing::info!(operation = %operation, "statement executed");
        Ok(response)
    }

    /// Fetch rows under the pool's retry wrapper (read paths only).
    async fn fetch_all_retry(
        &self,
        sql: String,
        binds: Vec<String>,
    ) -> Result<Vec<sqlx::any::AnyRow>, McpError> {
        let pool = self.pool.clone();
        let sql = Arc::new(sql);
        let binds = Arc::new(binds);
        let query_timeout = self.query_timeout;

        pool.clone()
            .execute_with_retry(
                move || {
                    let pool = pool.clone();
                    let sql = sql.clone();
                    let binds = binds.clone();
                    async move {
                        let mut conn = pool.acquire().await?;
                        let mut query = sqlx::query(sql.as_str());
                        for bind in binds.iter() {
                            query = query.bind(bind.as_str());
                        }
                        let result =
                            tokio::time::timeout(query_timeout, query.fetch_all(&mut *conn)).await;
                        pool.release(conn).await;
                        match result {
                            Ok(rows) => rows.map_err(PoolError::from),
                            Err(_) => Err(PoolError::QueryTimeout {
                                seconds: query_timeout.as_secs(),
                            }),
                        }
                    }
                },
                MAX_RETRIES,
            )
            .await
            .map_err(McpError::from)
    }

    /// Bound a driver round trip by the configured query timeout. The
    /// caller still owns the connection and must release it afterwards;
    /// a timed-out session is probed before its next reuse.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, McpError> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(PoolError::from).map_err(McpError::from),
            Err(_) => Err(McpError::Pool(PoolError::QueryTimeout {
                seconds: self.query_timeout.as_secs(),
            })),
        }
    }

    async fn last_insert_id(&self, conn: &mut AnyConnection) -> Option<i64> {
        if self.dialect != Dialect::MySql {
            return None;
        }
        sqlx::query("SELECT LAST_INSERT_ID()")
            .fetch_one(&mut *conn)
            .await
            .ok()
            .and_then(|row| row.try_get::<i64, _>(0).ok())
            .filter(|id| *id != 0)
    }

    fn qualified_table(&self, table: &str, database: Option<&str>) -> Result<String, McpError> {
        Ok(match database {
            Some(db) => format!(
                "{}.{}",
                self.dialect.quote_ident(db)?,
                self.dialect.quote_ident(table)?
            ),
            None => self.dialect.quote_ident(table)?,
        })
    }
}

fn parse<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, McpError> {
    serde_json::from_value(arguments).map_err(|err| McpError::InvalidArguments {
        tool: tool.to_string(),
        reason: err.to_string(),
    })
}

fn has_limit_keyword(query: &str) -> bool {
    query
        .to_ascii_uppercase()
        .split_whitespace()
        .any(|token| token == "LIMIT")
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

/// Group MySQL `SHOW INDEX` rows by key name.
fn group_mysql_indexes(rows: Vec<Value>) -> Vec<Value> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: Map<String, Value> = Map::new();

    for row in rows {
        let Some(name) = row.get("Key_name").and_then(|v| v.as_str()).map(String::from) else {
            continue;
        };
        if !grouped.contains_key(&name) {
            order.push(name.clone());
            grouped.insert(
                name.clone(),
                json!({
                    "name": name,
                    "unique": row.get("Non_unique").and_then(|v| v.as_i64()) == Some(0),
                    "type": row.get("Index_type").cloned().unwrap_or(Value::Null),
                    "columns": [],
                }),
            );
        }
        if let Some(columns) = grouped
            .get_mut(&name)
            .and_then(|entry| entry.get_mut("columns"))
            .and_then(|columns| columns.as_array_mut())
        {
            columns.push(json!({
                "column": row.get("Column_name").cloned().unwrap_or(Value::Null),
                "sequence": row.get("Seq_in_index").cloned().unwrap_or(Value::Null),
            }));
        }
    }

    order
        .into_iter()
        .filter_map(|name| grouped.remove(&name))
        .collect()
}
