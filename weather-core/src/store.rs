//! SQLite-backed storage of weather records and derived views.
//!
//! [`WeatherStore`] owns one connection and is blocking. [`SharedStore`]
//! wraps it for async callers; every call runs on the blocking pool.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use rusqlite::{
    Connection, params,
    functions::{Aggregate, Context, FunctionFlags},
    types::Value as SqlValue,
};

use crate::{
    error::{StoreError, ViewCreationError},
    model::WeatherRecord,
    schema::WEATHER_DATA,
    views::{STDDEV_FUNCTION, SqlDialect, ViewCatalog, ViewDefinition},
};

/// Where the database lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    Memory,
}

impl DatabaseTarget {
    /// Accepts `sqlite://<path>`, `sqlite:<path>`, a bare path, or `sqlite::memory:`.
    pub fn parse(conn_str: &str) -> Result<Self, StoreError> {
        let trimmed = conn_str.trim();
        if matches!(trimmed, ":memory:" | "sqlite::memory:" | "sqlite://:memory:") {
            return Ok(DatabaseTarget::Memory);
        }

        let path = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);

        if path.is_empty() || path.contains("://") {
            return Err(StoreError::UnsupportedTarget(conn_str.to_string()));
        }

        Ok(DatabaseTarget::File(PathBuf::from(path)))
    }
}

/// Columns and rows of a view, values dynamically typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ViewRows {
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn to_json(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(sql_to_json))
                    .collect()
            })
            .collect()
    }
}

fn sql_to_json(value: &SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => (*i).into(),
        SqlValue::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        SqlValue::Text(s) => serde_json::Value::String(s.clone()),
        SqlValue::Blob(b) => serde_json::Value::String(format!("<{} bytes>", b.len())),
    }
}

/// Running population variance (Welford).
#[derive(Debug, Default, Clone, Copy)]
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn population_stddev(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).sqrt())
    }
}

struct PopulationStdDev;

impl Aggregate<Welford, Option<f64>> for PopulationStdDev {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<Welford> {
        Ok(Welford::default())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Welford) -> rusqlite::Result<()> {
        if let Some(x) = ctx.get::<Option<f64>>(0)? {
            acc.push(x);
        }
        Ok(())
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<Welford>) -> rusqlite::Result<Option<f64>> {
        Ok(acc.and_then(|w| w.population_stddev()))
    }
}

/// One SQLite connection to the weather database.
pub struct WeatherStore {
    conn: Connection,
    dialect: SqlDialect,
}

impl std::fmt::Debug for WeatherStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherStore")
            .field("path", &self.conn.path())
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl WeatherStore {
    /// Open the database, creating the file (and parent directories) if absent.
    pub fn open(target: &DatabaseTarget) -> Result<Self, StoreError> {
        match target {
            DatabaseTarget::Memory => Self::open_in_memory(),
            DatabaseTarget::File(path) => Self::open_file(path),
        }
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn open_file(path: &Path) -> Result<Self, StoreError> {
        let existed = path.exists();
        if !existed {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self::from_connection(Connection::open(path)?)?;
        if existed {
            tracing::info!(path = %path.display(), "Database already exists");
        } else {
            tracing::info!(path = %path.display(), "Database created");
        }
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.create_aggregate_function(
            STDDEV_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            PopulationStdDev,
        )?;

        Ok(Self {
            conn,
            dialect: SqlDialect::SQLITE,
        })
    }

    /// Create the `weather_data` table and its indexes if absent.
    pub fn ensure_table(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&WEATHER_DATA.create_sql())?;
        Ok(())
    }

    /// Drop and recreate one view in a single transaction.
    ///
    /// A rejected definition leaves the previous version of the view in place.
    pub fn recreate_view(&mut self, view: &ViewDefinition) -> Result<(), ViewCreationError> {
        let sql = format!(
            "DROP VIEW IF EXISTS \"{name}\";\nCREATE VIEW \"{name}\" AS {query};",
            name = view.name,
            query = view.query(&self.dialect),
        );

        let result = self.conn.transaction().and_then(|tx| {
            tx.execute_batch(&sql)?;
            tx.commit()
        });

        result.map_err(|source| ViewCreationError {
            view: view.name.clone(),
            source,
        })
    }

    /// Recreate every view of the catalog, returning the ones that failed.
    pub fn recreate_views(&mut self, catalog: &ViewCatalog) -> Vec<ViewCreationError> {
        catalog
            .iter()
            .filter_map(|view| self.recreate_view(view).err())
            .collect()
    }

    /// Insert one record and commit, returning its row id.
    pub fn insert(&mut self, record: &WeatherRecord) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;

        // An early return drops `tx`, which rolls back.
        tx.execute(
            &WEATHER_DATA.insert_sql(),
            params![
                record.city_id,
                record.city_name,
                record.country,
                record.longitude,
                record.latitude,
                record.timestamp_text(),
                record.weather_type,
                record.weather_description,
                record.temperature,
                record.feels_like,
                record.temperature_min,
                record.temperature_max,
                record.pressure,
                record.humidity,
                record.visibility,
                record.wind_speed,
                record.wind_deg,
                record.rain_1h,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(id)
    }

    pub fn row_count(&self) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", WEATHER_DATA.name);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Stored DDL of a table or view, `None` if it does not exist.
    pub fn definition(&self, name: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT sql FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'view')")?;
        let mut rows = stmt.query(params![name])?;

        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Query a view of the catalog by name.
    pub fn query_view(&self, catalog: &ViewCatalog, name: &str) -> Result<ViewRows, StoreError> {
        let view = catalog
            .get(name)
            .ok_or_else(|| StoreError::UnknownView(name.to_string()))?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM \"{}\"", view.name))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ViewRows { columns, rows })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Async handle to a [`WeatherStore`].
///
/// Each call is one database round-trip on the blocking pool. The
/// connection closes when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<WeatherStore>>,
}

impl SharedStore {
    pub fn new(store: WeatherStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn open(target: DatabaseTarget) -> Result<Self, StoreError> {
        let store = tokio::task::spawn_blocking(move || WeatherStore::open(&target)).await??;
        Ok(Self::new(store))
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut WeatherStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&mut *store.lock())).await?
    }

    pub async fn ensure_table(&self) -> Result<(), StoreError> {
        self.with_store(|store| store.ensure_table()).await
    }

    pub async fn recreate_views(
        &self,
        catalog: ViewCatalog,
    ) -> Result<Vec<ViewCreationError>, StoreError> {
        self.with_store(move |store| Ok(store.recreate_views(&catalog)))
            .await
    }

    pub async fn insert(&self, record: WeatherRecord) -> Result<i64, StoreError> {
        self.with_store(move |store| store.insert(&record)).await
    }

    pub async fn row_count(&self) -> Result<u64, StoreError> {
        self.with_store(|store| store.row_count()).await
    }

    pub async fn query_view(&self, catalog: ViewCatalog, name: String) -> Result<ViewRows, StoreError> {
        self.with_store(move |store| store.query_view(&catalog, &name))
            .await
    }
}
