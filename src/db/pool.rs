use duckdb::Connection;
use r2d2::ManageConnection;

/// r2d2 adapter for DuckDB connections to the metrics database.
pub struct DuckDbConnectionManager {
    db_path: String,
}

impl DuckDbConnectionManager {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }
}

impl ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open(&self.db_path)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
