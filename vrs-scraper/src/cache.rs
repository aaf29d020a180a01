//! SQLite-backed cache of scraped stations.
//!
//! Rows are keyed by stop id and written with insert-or-ignore, so the first
//! record seen for an id wins and re-running a scrape only adds new stops.
//! The database file persists between runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::domain::{StationRecord, StopId};

/// Default cache file, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = "scrape_cache.db";

/// Header of the exported CSV.
pub const EXPORT_HEADER: [&str; 5] = ["id", "assnr", "name", "x", "y"];

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS stations (
    id INTEGER PRIMARY KEY,
    assnr INTEGER,
    name TEXT NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL
)";

/// Errors from the station cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Opening, creating or querying the database failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Writing the CSV export failed
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    /// The export file could not be created or flushed
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A row of the `stations` table. `x` is longitude, `y` latitude.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedStation {
    pub id: StopId,
    pub assnr: Option<i64>,
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl CachedStation {
    fn csv_fields(&self) -> [String; 5] {
        [
            self.id.to_string(),
            self.assnr.map(|a| a.to_string()).unwrap_or_default(),
            self.name.clone(),
            format!("{:.7}", self.x),
            format!("{:.7}", self.y),
        ]
    }
}

/// Persistent station store.
///
/// Holds a single connection: the scraper is the only writer for the
/// duration of a run.
#[derive(Debug, Clone)]
pub struct StationCache {
    pool: SqlitePool,
}

impl StationCache {
    /// Open (creating if needed) the cache at `path` and ensure the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.init().await?;

        tracing::info!(
            path = %path.display(),
            rows = cache.len().await?,
            "Opened station cache"
        );
        Ok(cache)
    }

    /// Create the `stations` table if it does not exist yet.
    pub async fn init(&self) -> Result<(), CacheError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a record unless its id is already present.
    ///
    /// Returns `true` if a row was written, `false` if the id was known.
    pub async fn insert(&self, record: &StationRecord) -> Result<bool, CacheError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO stations (id, assnr, name, x, y) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.assnr)
        .bind(record.name.as_str())
        .bind(record.longitude())
        .bind(record.latitude())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Look up a single row.
    pub async fn get(&self, id: StopId) -> Result<Option<CachedStation>, CacheError> {
        let row = sqlx::query_as::<_, CachedStation>(
            "SELECT id, assnr, name, x, y FROM stations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All rows in ascending id order.
    pub async fn all(&self) -> Result<Vec<CachedStation>, CacheError> {
        let rows = sqlx::query_as::<_, CachedStation>(
            "SELECT id, assnr, name, x, y FROM stations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Number of cached stations.
    pub async fn len(&self) -> Result<i64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }

    /// Write every row as CSV to `writer`, ordered by id.
    ///
    /// Returns the number of data rows written.
    pub async fn export_to<W: Write>(&self, writer: W) -> Result<usize, CacheError> {
        let rows = self.all().await?;

        let mut out = csv::Writer::from_writer(writer);
        out.write_record(EXPORT_HEADER)?;
        for row in &rows {
            out.write_record(row.csv_fields())?;
        }
        out.flush().map_err(csv::Error::from)?;

        Ok(rows.len())
    }

    /// Export the whole cache to a CSV file at `path`.
    pub async fn export_csv(&self, path: impl AsRef<Path>) -> Result<usize, CacheError> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let written = self.export_to(std::io::BufWriter::new(file)).await?;
        tracing::info!(path = %path.display(), rows = written, "Exported stations");
        Ok(written)
    }

    /// Close the underlying connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use tempfile::tempdir;

    fn record(id: StopId, name: &str, lon: f64, lat: f64) -> StationRecord {
        StationRecord::new(id, name, Point::new(lon, lat))
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let cache = StationCache::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(cache.is_empty().await.unwrap());

        // Initialising twice is harmless.
        cache.init().await.unwrap();
    }

    #[tokio::test]
    async fn insert_is_first_writer_wins() {
        let dir = tempdir().unwrap();
        let cache = StationCache::open(dir.path().join("cache.db")).await.unwrap();

        let first = record(7, "Ebertplatz", 6.957, 50.949).with_assnr(12);
        let second = record(7, "Somewhere else", 7.0, 51.0).with_assnr(99);

        assert!(cache.insert(&first).await.unwrap());
        assert!(!cache.insert(&second).await.unwrap());

        let row = cache.get(7).await.unwrap().unwrap();
        assert_eq!(row.name, "Ebertplatz");
        assert_eq!(row.assnr, Some(12));
        assert_eq!(row.x, 6.957);
        assert_eq!(row.y, 50.949);
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = StationCache::open(&path).await.unwrap();
            cache.insert(&record(1, "Neumarkt", 6.947, 50.936)).await.unwrap();
            cache.close().await;
        }

        let cache = StationCache::open(&path).await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 1);
        assert!(!cache.insert(&record(1, "Neumarkt", 6.947, 50.936)).await.unwrap());
    }

    #[tokio::test]
    async fn export_orders_by_id() {
        let dir = tempdir().unwrap();
        let cache = StationCache::open(dir.path().join("cache.db")).await.unwrap();

        for id in [5, 1, 3] {
            cache
                .insert(&record(id, &format!("Stop {id}"), 6.9, 50.9))
                .await
                .unwrap();
        }

        let mut buf = Vec::new();
        let written = cache.export_to(&mut buf).await.unwrap();
        assert_eq!(written, 3);

        let text = String::from_utf8(buf).unwrap();
        let ids: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, ["1", "3", "5"]);
    }

    #[tokio::test]
    async fn export_format() {
        let dir = tempdir().unwrap();
        let cache = StationCache::open(dir.path().join("cache.db")).await.unwrap();

        cache
            .insert(&record(900, "Köln Hbf, Gleis 1", 6.958_736_12, 50.943_029).with_assnr(4))
            .await
            .unwrap();
        cache
            .insert(&record(901, "Dom/Hbf", 6.958, 50.941))
            .await
            .unwrap();

        let out_path = dir.path().join("stations.csv");
        assert_eq!(cache.export_csv(&out_path).await.unwrap(), 2);

        let text = std::fs::read_to_string(&out_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,assnr,name,x,y");
        assert_eq!(lines[1], "900,4,\"Köln Hbf, Gleis 1\",6.9587361,50.9430290");
        assert_eq!(lines[2], "901,,Dom/Hbf,6.9580000,50.9410000");
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn export_of_empty_cache_has_header_only() {
        let dir = tempdir().unwrap();
        let cache = StationCache::open(dir.path().join("cache.db")).await.unwrap();

        let mut buf = Vec::new();
        assert_eq!(cache.export_to(&mut buf).await.unwrap(), 0);
        assert_eq!(String::from_utf8(buf).unwrap(), "id,assnr,name,x,y\n");
    }

    #[tokio::test]
    async fn unreachable_store_is_an_error() {
        let result = StationCache::open("/nonexistent/dir/cache.db").await;
        assert!(matches!(result, Err(CacheError::Database(_))));
    }
}
