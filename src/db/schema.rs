use crate::db::pool::DuckDbConnectionManager;
use r2d2::Pool;

/// Store schema consumed read-only by generated SQL. Every snapshot row
/// references exactly one existing video. The same shape is described to the
/// model in the system prompt; the two must stay in sync.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS videos (
    id UUID PRIMARY KEY,
    creator_id TEXT NOT NULL,
    video_created_at TIMESTAMPTZ NOT NULL,
    views_count INTEGER NOT NULL,
    likes_count INTEGER NOT NULL,
    comments_count INTEGER NOT NULL,
    reports_count INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS video_snapshots (
    id UUID PRIMARY KEY,
    video_id UUID NOT NULL REFERENCES videos(id),
    views_count INTEGER NOT NULL,
    likes_count INTEGER NOT NULL,
    comments_count INTEGER NOT NULL,
    reports_count INTEGER NOT NULL,
    delta_views_count INTEGER NOT NULL,
    delta_likes_count INTEGER NOT NULL,
    delta_comments_count INTEGER NOT NULL,
    delta_reports_count INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_videos_creator_id ON videos (creator_id);
CREATE INDEX IF NOT EXISTS ix_videos_video_created_at ON videos (video_created_at);
CREATE INDEX IF NOT EXISTS ix_videos_views_count ON videos (views_count);
CREATE INDEX IF NOT EXISTS ix_video_snapshots_video_id ON video_snapshots (video_id);
CREATE INDEX IF NOT EXISTS ix_video_snapshots_created_at ON video_snapshots (created_at);
";

/// Applies the schema idempotently. Called once at startup before any
/// request is served.
pub fn apply_schema(pool: &Pool<DuckDbConnectionManager>) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    conn.execute_batch(SCHEMA_DDL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2::Pool;

    #[test]
    fn schema_applies_and_is_idempotent() {
        let manager = DuckDbConnectionManager::new(":memory:".to_string());
        let pool = Pool::builder().max_size(1).build(manager).unwrap();

        apply_schema(&pool).unwrap();
        apply_schema(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM videos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
