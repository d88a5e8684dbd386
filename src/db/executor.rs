use crate::db::pool::DuckDbConnectionManager;
use duckdb::types::ValueRef;
use r2d2::Pool;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

/// Candidate SQL failed static safety validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    Empty,
    MultipleStatements,
    Forbidden(String),
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::Empty => write!(f, "SQL is empty"),
            SqlError::MultipleStatements => {
                write!(f, "';' is forbidden, only a single SQL statement is allowed")
            }
            SqlError::Forbidden(token) => {
                write!(f, "forbidden DDL/DML/utility command in SQL: {}", token)
            }
        }
    }
}

impl Error for SqlError {}

/// Validated SQL executed but its result violates the single-numeric-scalar
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarsError {
    ColumnCount(usize),
    RowCount(usize),
    BooleanResult,
    UnsupportedType(String),
}

impl fmt::Display for ScalarsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarsError::ColumnCount(n) => write!(f, "expected 1 column, got {}", n),
            ScalarsError::RowCount(n) => write!(f, "expected 1 row, got {}", n),
            ScalarsError::BooleanResult => write!(f, "SQL returned a bool, expected a number"),
            ScalarsError::UnsupportedType(name) => {
                write!(f, "SQL returned type {}, expected a number", name)
            }
        }
    }
}

impl Error for ScalarsError {}

/// Any failure of a single scalar-query execution.
#[derive(Debug)]
pub enum ExecuteError {
    Sql(SqlError),
    Scalars(ScalarsError),
    Pool(r2d2::Error),
    Database(duckdb::Error),
    Timeout,
    Canceled(String),
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::Sql(e) => write!(f, "SQL validation error: {}", e),
            ExecuteError::Scalars(e) => write!(f, "scalar result error: {}", e),
            ExecuteError::Pool(e) => write!(f, "connection error: {}", e),
            ExecuteError::Database(e) => write!(f, "database error: {}", e),
            ExecuteError::Timeout => write!(f, "database query timed out"),
            ExecuteError::Canceled(msg) => write!(f, "query task canceled: {}", msg),
        }
    }
}

impl Error for ExecuteError {}

impl From<SqlError> for ExecuteError {
    fn from(e: SqlError) -> Self {
        ExecuteError::Sql(e)
    }
}

impl From<ScalarsError> for ExecuteError {
    fn from(e: ScalarsError) -> Self {
        ExecuteError::Scalars(e)
    }
}

impl From<r2d2::Error> for ExecuteError {
    fn from(e: r2d2::Error) -> Self {
        ExecuteError::Pool(e)
    }
}

impl From<duckdb::Error> for ExecuteError {
    fn from(e: duckdb::Error) -> Self {
        ExecuteError::Database(e)
    }
}

/// The single numeric value a generated query is allowed to produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
        }
    }
}

static FORBIDDEN_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|truncate|create|grant|revoke|copy|call|do|execute|set|show|listen|notify|vacuum|analyze)\b",
    )
    .unwrap()
});

/// Static allow-by-absence-of-denylist filter over candidate SQL.
///
/// Not a parser: a denylisted word inside a string literal or a comment-based
/// bypass is out of reach. Known limitation, kept as-is because hardening it
/// would change which queries the prompt's output is allowed to run.
pub fn validate_sql(sql: &str) -> Result<(), SqlError> {
    if sql.trim().is_empty() {
        return Err(SqlError::Empty);
    }

    if sql.contains(';') {
        return Err(SqlError::MultipleStatements);
    }

    if let Some(found) = FORBIDDEN_TOKENS.find(sql) {
        return Err(SqlError::Forbidden(found.as_str().to_string()));
    }

    Ok(())
}

fn coerce_scalar(value: ValueRef<'_>) -> Result<Scalar, ScalarsError> {
    match value {
        // A bool is representable as 0/1 but signals a malformed query.
        ValueRef::Boolean(_) => Err(ScalarsError::BooleanResult),
        ValueRef::TinyInt(v) => Ok(Scalar::Int(v as i64)),
        ValueRef::SmallInt(v) => Ok(Scalar::Int(v as i64)),
        ValueRef::Int(v) => Ok(Scalar::Int(v as i64)),
        ValueRef::BigInt(v) => Ok(Scalar::Int(v)),
        // sum() over integer columns yields HUGEINT in DuckDB.
        ValueRef::HugeInt(v) => Ok(match i64::try_from(v) {
            Ok(v) => Scalar::Int(v),
            Err(_) => Scalar::Float(v as f64),
        }),
        ValueRef::UTinyInt(v) => Ok(Scalar::Int(v as i64)),
        ValueRef::USmallInt(v) => Ok(Scalar::Int(v as i64)),
        ValueRef::UInt(v) => Ok(Scalar::Int(v as i64)),
        ValueRef::UBigInt(v) => Ok(match i64::try_from(v) {
            Ok(v) => Scalar::Int(v),
            Err(_) => Scalar::Float(v as f64),
        }),
        ValueRef::Float(v) => Ok(Scalar::Float(v as f64)),
        ValueRef::Double(v) => Ok(Scalar::Float(v)),
        ValueRef::Decimal(d) => d
            .to_f64()
            .map(Scalar::Float)
            .ok_or_else(|| ScalarsError::UnsupportedType("decimal".to_string())),
        other => Err(ScalarsError::UnsupportedType(format!(
            "{:?}",
            other.data_type()
        ))),
    }
}

/// Runs validated candidate SQL and coerces the result to a single numeric
/// scalar. The pooled connection is scoped to one call; the blocking DuckDB
/// work runs on a blocking task under an independent deadline.
pub struct QueryExecutor {
    pool: Pool<DuckDbConnectionManager>,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: Pool<DuckDbConnectionManager>, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub async fn execute_scalar(&self, sql: &str) -> Result<Scalar, ExecuteError> {
        validate_sql(sql)?;

        let pool = self.pool.clone();
        let sql = sql.to_string();
        let task = tokio::task::spawn_blocking(move || run_scalar_query(&pool, &sql));

        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(joined) => joined.map_err(|e| ExecuteError::Canceled(e.to_string()))?,
            Err(_) => Err(ExecuteError::Timeout),
        }
    }
}

fn run_scalar_query(
    pool: &Pool<DuckDbConnectionManager>,
    sql: &str,
) -> Result<Scalar, ExecuteError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    let columns = rows.as_ref().map_or(0, |s| s.column_count());
    if columns != 1 {
        return Err(ScalarsError::ColumnCount(columns).into());
    }

    let value = match rows.next()? {
        Some(row) => coerce_scalar(row.get_ref(0)?)?,
        None => return Err(ScalarsError::RowCount(0).into()),
    };

    // Bounded two-row fetch: a second row is enough to fail, the rest of the
    // result is never scanned.
    if rows.next()?.is_some() {
        return Err(ScalarsError::RowCount(2).into());
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2::Pool;

    fn test_pool() -> Pool<DuckDbConnectionManager> {
        let manager = DuckDbConnectionManager::new(":memory:".to_string());
        Pool::builder().max_size(1).build(manager).unwrap()
    }

    fn executor() -> QueryExecutor {
        QueryExecutor::new(test_pool(), Duration::from_secs(5))
    }

    #[test]
    fn rejects_empty_sql() {
        assert_eq!(validate_sql(""), Err(SqlError::Empty));
        assert_eq!(validate_sql("   \n\t  "), Err(SqlError::Empty));
    }

    #[test]
    fn rejects_semicolon_anywhere() {
        assert_eq!(
            validate_sql("SELECT 1; SELECT 2"),
            Err(SqlError::MultipleStatements)
        );
        assert_eq!(validate_sql("SELECT 1;"), Err(SqlError::MultipleStatements));
        assert_eq!(validate_sql(";"), Err(SqlError::MultipleStatements));
    }

    #[test]
    fn rejects_denylisted_keywords_case_insensitively() {
        for sql in [
            "DROP TABLE videos",
            "drop table videos",
            "Drop table videos",
            "SELECT 1 FROM videos WHERE 1=1 AND EXISTS (SELECT 1) UNION SELECT 2 -- delete",
            "insert into videos values (1)",
            "SET search_path TO public",
            "vacuum",
        ] {
            assert!(
                matches!(validate_sql(sql), Err(SqlError::Forbidden(_))),
                "expected rejection for {:?}",
                sql
            );
        }
    }

    #[test]
    fn denylisted_substring_inside_word_is_allowed() {
        assert_eq!(validate_sql("SELECT count(*) FROM dropdown"), Ok(()));
        assert_eq!(
            validate_sql("SELECT max(updated_at) AS value FROM videos"),
            Ok(())
        );
    }

    #[test]
    fn allows_plain_select() {
        assert_eq!(
            validate_sql("SELECT count(*) AS value FROM videos"),
            Ok(())
        );
    }

    #[tokio::test]
    async fn returns_integer_unchanged() {
        let value = executor().execute_scalar("SELECT 1").await.unwrap();
        assert_eq!(value, Scalar::Int(1));
        assert_eq!(value.to_string(), "1");
    }

    #[tokio::test]
    async fn widens_decimal_to_float() {
        let value = executor().execute_scalar("SELECT 12.5").await.unwrap();
        assert_eq!(value, Scalar::Float(12.5));
        assert_eq!(value.to_string(), "12.5");
    }

    #[tokio::test]
    async fn passes_double_through() {
        let value = executor()
            .execute_scalar("SELECT CAST(2.5 AS DOUBLE)")
            .await
            .unwrap();
        assert_eq!(value, Scalar::Float(2.5));
    }

    #[tokio::test]
    async fn sums_reaching_hugeint_still_coerce() {
        let value = executor()
            .execute_scalar("SELECT sum(x) FROM (SELECT CAST(2 AS INTEGER) AS x UNION ALL SELECT 3)")
            .await
            .unwrap();
        assert_eq!(value, Scalar::Int(5));
    }

    #[tokio::test]
    async fn rejects_boolean_result() {
        let err = executor().execute_scalar("SELECT TRUE").await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Scalars(ScalarsError::BooleanResult)
        ));
    }

    #[tokio::test]
    async fn rejects_text_result_naming_the_type() {
        let err = executor().execute_scalar("SELECT 'abc'").await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Scalars(ScalarsError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn rejects_two_columns() {
        let err = executor().execute_scalar("SELECT 1, 2").await.unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Scalars(ScalarsError::ColumnCount(2))
        ));
    }

    #[tokio::test]
    async fn rejects_zero_rows() {
        let err = executor()
            .execute_scalar("SELECT 1 WHERE 1=0")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Scalars(ScalarsError::RowCount(0))
        ));
    }

    #[tokio::test]
    async fn rejects_two_or_more_rows() {
        let err = executor()
            .execute_scalar("SELECT 1 UNION ALL SELECT 2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Scalars(ScalarsError::RowCount(2))
        ));
    }

    #[tokio::test]
    async fn validation_failure_short_circuits_execution() {
        let err = executor()
            .execute_scalar("DROP TABLE videos")
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Sql(SqlError::Forbidden(_))));
    }

    #[tokio::test]
    async fn counts_rows_in_a_seeded_table() {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE videos (id INTEGER);
                 INSERT INTO videos VALUES (1), (2), (3);",
            )
            .unwrap();
        }
        let executor = QueryExecutor::new(pool, Duration::from_secs(5));
        let value = executor
            .execute_scalar("SELECT count(*) AS value FROM videos")
            .await
            .unwrap();
        assert_eq!(value, Scalar::Int(3));
    }
}
