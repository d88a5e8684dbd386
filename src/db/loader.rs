use crate::db::pool::DuckDbConnectionManager;
use chrono::{DateTime, FixedOffset};
use duckdb::params;
use r2d2::Pool;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Seed file shape: `{"videos": [ { ...video fields..., "snapshots": [...] } ]}`.
#[derive(Debug, Deserialize)]
struct SeedFile {
    videos: Vec<SeedVideo>,
}

#[derive(Debug, Deserialize)]
struct SeedVideo {
    id: String,
    creator_id: String,
    video_created_at: String,
    views_count: i64,
    likes_count: i64,
    comments_count: i64,
    reports_count: i64,
    created_at: String,
    updated_at: String,
    #[serde(default)]
    snapshots: Vec<SeedSnapshot>,
}

#[derive(Debug, Deserialize)]
struct SeedSnapshot {
    id: String,
    video_id: String,
    views_count: i64,
    likes_count: i64,
    comments_count: i64,
    reports_count: i64,
    delta_views_count: i64,
    delta_likes_count: i64,
    delta_comments_count: i64,
    delta_reports_count: i64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Timestamp(chrono::ParseError),
    Pool(r2d2::Error),
    Database(duckdb::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "failed to read seed file: {}", e),
            LoadError::Parse(e) => write!(f, "failed to parse seed file: {}", e),
            LoadError::Timestamp(e) => write!(f, "bad timestamp in seed file: {}", e),
            LoadError::Pool(e) => write!(f, "connection error: {}", e),
            LoadError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Parse(e)
    }
}

impl From<chrono::ParseError> for LoadError {
    fn from(e: chrono::ParseError) -> Self {
        LoadError::Timestamp(e)
    }
}

impl From<r2d2::Error> for LoadError {
    fn from(e: r2d2::Error) -> Self {
        LoadError::Pool(e)
    }
}

impl From<duckdb::Error> for LoadError {
    fn from(e: duckdb::Error) -> Self {
        LoadError::Database(e)
    }
}

const INSERT_VIDEO: &str = "
INSERT INTO videos VALUES (
    CAST(? AS UUID), ?, CAST(? AS TIMESTAMPTZ), ?, ?, ?, ?,
    CAST(? AS TIMESTAMPTZ), CAST(? AS TIMESTAMPTZ)
)";

const INSERT_SNAPSHOT: &str = "
INSERT INTO video_snapshots VALUES (
    CAST(? AS UUID), CAST(? AS UUID), ?, ?, ?, ?, ?, ?, ?, ?,
    CAST(? AS TIMESTAMPTZ), CAST(? AS TIMESTAMPTZ)
)";

fn parse_ts(value: &str) -> Result<DateTime<FixedOffset>, LoadError> {
    Ok(DateTime::parse_from_rfc3339(value)?)
}

/// Imports a JSON seed file, videos first so snapshot foreign keys resolve.
/// With `truncate` both tables are cleared beforehand. Returns the resulting
/// (videos, snapshots) row counts.
pub fn load_seed_file(
    pool: &Pool<DuckDbConnectionManager>,
    path: &Path,
    truncate: bool,
) -> Result<(i64, i64), LoadError> {
    let payload = std::fs::read_to_string(path)?;
    let seed: SeedFile = serde_json::from_str(&payload)?;

    let conn = pool.get()?;

    if truncate {
        conn.execute_batch("DELETE FROM video_snapshots; DELETE FROM videos;")?;
    }

    let mut video_stmt = conn.prepare(INSERT_VIDEO)?;
    for video in &seed.videos {
        video_stmt.execute(params![
            video.id,
            video.creator_id,
            parse_ts(&video.video_created_at)?.to_rfc3339(),
            video.views_count,
            video.likes_count,
            video.comments_count,
            video.reports_count,
            parse_ts(&video.created_at)?.to_rfc3339(),
            parse_ts(&video.updated_at)?.to_rfc3339(),
        ])?;
    }

    let mut snapshot_stmt = conn.prepare(INSERT_SNAPSHOT)?;
    for video in &seed.videos {
        for snap in &video.snapshots {
            snapshot_stmt.execute(params![
                snap.id,
                snap.video_id,
                snap.views_count,
                snap.likes_count,
                snap.comments_count,
                snap.reports_count,
                snap.delta_views_count,
                snap.delta_likes_count,
                snap.delta_comments_count,
                snap.delta_reports_count,
                parse_ts(&snap.created_at)?.to_rfc3339(),
                parse_ts(&snap.updated_at)?.to_rfc3339(),
            ])?;
        }
    }

    let videos: i64 = conn.query_row("SELECT count(*) FROM videos", [], |row| row.get(0))?;
    let snapshots: i64 =
        conn.query_row("SELECT count(*) FROM video_snapshots", [], |row| row.get(0))?;

    info!("Seed loaded: videos={}, snapshots={}", videos, snapshots);
    Ok((videos, snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::apply_schema;
    use r2d2::Pool;

    const SEED: &str = r#"{
        "videos": [
            {
                "id": "7f9619ff-8b86-d011-b42d-00cf4fc964ff",
                "creator_id": "123",
                "video_created_at": "2025-06-01T10:00:00+00:00",
                "views_count": 10,
                "likes_count": 2,
                "comments_count": 1,
                "reports_count": 0,
                "created_at": "2025-06-01T10:00:00+00:00",
                "updated_at": "2025-06-01T10:00:00+00:00",
                "snapshots": [
                    {
                        "id": "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
                        "video_id": "7f9619ff-8b86-d011-b42d-00cf4fc964ff",
                        "views_count": 10,
                        "likes_count": 2,
                        "comments_count": 1,
                        "reports_count": 0,
                        "delta_views_count": 5,
                        "delta_likes_count": 1,
                        "delta_comments_count": 0,
                        "delta_reports_count": 0,
                        "created_at": "2025-06-01T11:00:00+00:00",
                        "updated_at": "2025-06-01T11:00:00+00:00"
                    }
                ]
            }
        ]
    }"#;

    fn seeded_pool() -> Pool<DuckDbConnectionManager> {
        let manager = DuckDbConnectionManager::new(":memory:".to_string());
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        apply_schema(&pool).unwrap();
        pool
    }

    #[test]
    fn loads_videos_and_snapshots() {
        let pool = seeded_pool();
        let dir = std::env::temp_dir();
        let path = dir.join("vidstat_seed_test.json");
        std::fs::write(&path, SEED).unwrap();

        let (videos, snapshots) = load_seed_file(&pool, &path, true).unwrap();
        assert_eq!(videos, 1);
        assert_eq!(snapshots, 1);

        // Truncate-and-reload keeps counts stable.
        let (videos, snapshots) = load_seed_file(&pool, &path, true).unwrap();
        assert_eq!(videos, 1);
        assert_eq!(snapshots, 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_bad_timestamp() {
        let pool = seeded_pool();
        let path = std::env::temp_dir().join("vidstat_seed_bad_ts.json");
        let seed = SEED.replace("2025-06-01T10:00:00+00:00", "вчера");
        std::fs::write(&path, seed).unwrap();

        assert!(matches!(
            load_seed_file(&pool, &path, true),
            Err(LoadError::Timestamp(_))
        ));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_malformed_seed() {
        let pool = seeded_pool();
        let dir = std::env::temp_dir();
        let path = dir.join("vidstat_seed_bad.json");
        std::fs::write(&path, r#"{"clips": []}"#).unwrap();

        assert!(matches!(
            load_seed_file(&pool, &path, true),
            Err(LoadError::Parse(_))
        ));

        std::fs::remove_file(&path).ok();
    }
}
