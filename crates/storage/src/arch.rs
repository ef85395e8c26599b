//! Archive (ARCH) source queries.
//!
//! Archive tables are wide: one column per element code, keyed by station
//! (`stnr`) and time (`dato`). Values and flags live in twin tables of the same
//! shape, and every family has an element-metadata table listing the valid
//! period of each (station, element) series.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::PgPool;

use obs_common::{RawObservation, TimeWindow};

use crate::error::{StorageError, StorageResult};
use crate::pool::sql_ident;

/// Columns of a data table that are not element codes.
pub const NON_ELEMENT_COLUMNS: [&str; 5] = ["dato", "stnr", "typeid", "season", "xxx"];

/// Where the station list of a table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationSource<'a> {
    /// An element table shared by several data tables, keyed by `table_name`.
    SharedElemTable {
        elem_table: &'a str,
        table_name: &'a str,
    },
    /// An element table owned by one data table.
    ElemTable(&'a str),
    /// No element table; scan the data table itself.
    DataTable(&'a str),
}

/// One series SELECT against a data table and, optionally, its flag table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub data_table: String,
    pub flag_table: Option<String>,
    pub station: i32,
    pub element: String,
    pub window: TimeWindow,
    /// Restrict to one calendar year.
    pub year: Option<i32>,
    /// Restrict to calendar-month seasons (`season BETWEEN 1 AND 12`).
    pub months_only: bool,
}

impl SeriesQuery {
    /// Build the SQL text; parameters are `$1` station, `$2`/`$3` window, `$4` year.
    pub fn to_sql(&self) -> StorageResult<String> {
        let element = sql_ident(&self.element)?;
        let data_table = sql_ident(&self.data_table)?;

        let mut filter = format!(
            "{element} IS NOT NULL AND stnr = $1 \
             AND ($2::timestamp IS NULL OR dato >= $2) \
             AND ($3::timestamp IS NULL OR dato < $3) \
             AND ($4::int IS NULL OR EXTRACT(year FROM dato) = $4)"
        );

        match &self.flag_table {
            Some(flag_table) => {
                let flag_table = sql_ident(flag_table)?;
                Ok(format!(
                    "SELECT dato AS time, d.{element}::text AS data, f.{element}::text AS flag \
                     FROM (SELECT dato, {element} FROM {data_table} WHERE {filter}) d \
                     FULL OUTER JOIN (SELECT dato, {element} FROM {flag_table} WHERE {filter}) f \
                     USING (dato) ORDER BY dato"
                ))
            }
            None => {
                if self.months_only {
                    filter.push_str(" AND season BETWEEN 1 AND 12");
                }
                Ok(format!(
                    "SELECT dato AS time, {element}::text AS data, ''::text AS flag \
                     FROM {data_table} WHERE {filter} ORDER BY dato"
                ))
            }
        }
    }
}

/// A row of an element-metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct TimespanRow {
    pub table_name: String,
    pub station: i32,
    pub element: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ArchSource: Send + Sync {
    /// Element columns of `data_table`, lowercased.
    async fn element_columns(&self, data_table: &str) -> StorageResult<Vec<String>>;

    async fn stations(&self, source: StationSource<'_>) -> StorageResult<Vec<i32>>;

    /// Inclusive `[min, max]` year of non-null `element` values for a station.
    async fn year_range(
        &self,
        table: &str,
        station: i32,
        element: &str,
    ) -> StorageResult<Option<(i32, i32)>>;

    /// Observations of one series, ordered by time.
    async fn fetch_series(&self, query: &SeriesQuery) -> StorageResult<Vec<RawObservation>>;

    async fn timespans(&self, elem_table: &str) -> StorageResult<Vec<TimespanRow>>;
}

/// [`ArchSource`] over a PostgreSQL proxy of the archive.
pub struct PgArchSource {
    pool: PgPool,
}

impl PgArchSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArchSource for PgArchSource {
    async fn element_columns(&self, data_table: &str) -> StorageResult<Vec<String>> {
        let table = sql_ident(data_table)?;
        let columns = sqlx::query_scalar::<_, String>(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_name::text = $1 AND column_name::text <> ALL($2) \
             AND column_name::text NOT LIKE '%kopi%' \
             ORDER BY ordinal_position",
        )
        .bind(&table)
        .bind(&NON_ELEMENT_COLUMNS[..])
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Element column query failed: {}", e)))?;

        Ok(columns.into_iter().map(|c| c.to_ascii_lowercase()).collect())
    }

    async fn stations(&self, source: StationSource<'_>) -> StorageResult<Vec<i32>> {
        let (sql, table_name) = match source {
            StationSource::SharedElemTable {
                elem_table,
                table_name,
            } => (
                format!(
                    "SELECT DISTINCT stnr FROM {} WHERE table_name = $1 ORDER BY stnr",
                    sql_ident(elem_table)?
                ),
                Some(table_name.to_ascii_uppercase()),
            ),
            StationSource::ElemTable(table) | StationSource::DataTable(table) => (
                format!("SELECT DISTINCT stnr FROM {} ORDER BY stnr", sql_ident(table)?),
                None,
            ),
        };

        let mut query = sqlx::query_scalar::<_, i32>(&sql);
        if let Some(table_name) = table_name {
            query = query.bind(table_name);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Database(format!("Station query failed: {}", e)))
    }

    async fn year_range(
        &self,
        table: &str,
        station: i32,
        element: &str,
    ) -> StorageResult<Option<(i32, i32)>> {
        let element = sql_ident(element)?;
        let sql = format!(
            "SELECT min(EXTRACT(year FROM dato))::int, max(EXTRACT(year FROM dato))::int \
             FROM {} WHERE {element} IS NOT NULL AND stnr = $1",
            sql_ident(table)?
        );

        let (min, max) = sqlx::query_as::<_, (Option<i32>, Option<i32>)>(&sql)
            .bind(station)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Database(format!("Year range query failed: {}", e)))?;

        Ok(min.zip(max))
    }

    async fn fetch_series(&self, query: &SeriesQuery) -> StorageResult<Vec<RawObservation>> {
        let sql = query.to_sql()?;
        let (from, to) = query.window.naive_bounds();

        let rows = sqlx::query_as::<_, (NaiveDateTime, Option<String>, Option<String>)>(&sql)
            .bind(query.station)
            .bind(from)
            .bind(to)
            .bind(query.year)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Database(format!("Series query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(time, data, flag)| {
                RawObservation::new(
                    Utc.from_utc_datetime(&time),
                    data.unwrap_or_default(),
                    flag.unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn timespans(&self, elem_table: &str) -> StorageResult<Vec<TimespanRow>> {
        let sql = format!(
            "SELECT table_name, stnr, elem_code, fdato, tdato FROM {}",
            sql_ident(elem_table)?
        );

        let rows = sqlx::query_as::<
            _,
            (String, i32, String, Option<NaiveDateTime>, Option<NaiveDateTime>),
        >(&sql)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Timespan query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(table_name, station, element, from, to)| TimespanRow {
                table_name,
                station,
                element,
                from: from.map(|t| Utc.from_utc_datetime(&t)),
                to: to.map(|t| Utc.from_utc_datetime(&t)),
            })
            .collect())
    }
}
