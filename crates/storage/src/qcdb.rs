//! QC store (QCDB) source queries.
//!
//! The QC store is narrow: one row per (label, obstime) in either the numeric
//! `data` table or the `text_data` table. The same queries serve the live and
//! the historical instance.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::PgPool;

use obs_common::{Label, QcdbDataRecord, QcdbTextRecord, TimeWindow};

use crate::error::{StorageError, StorageResult};

const WINDOW_FILTER: &str = "($1::timestamp IS NULL OR obstime >= $1) \
     AND ($2::timestamp IS NULL OR obstime < $2)";

/// A row of `station_metadata`; a NULL param applies to every param of the station.
#[derive(Debug, Clone, PartialEq)]
pub struct QcdbTimespanRow {
    pub station_id: i32,
    pub param_id: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait QcdbSource: Send + Sync {
    /// Distinct labels of the numeric table inside `window`.
    async fn data_labels(&self, window: &TimeWindow) -> StorageResult<Vec<Label>>;

    /// Distinct labels of the text table inside `window`; sensor and level are absent.
    async fn text_labels(&self, window: &TimeWindow) -> StorageResult<Vec<Label>>;

    async fn fetch_data(
        &self,
        label: &Label,
        window: &TimeWindow,
    ) -> StorageResult<Vec<QcdbDataRecord>>;

    async fn fetch_text(
        &self,
        label: &Label,
        window: &TimeWindow,
    ) -> StorageResult<Vec<QcdbTextRecord>>;

    async fn timespans(&self) -> StorageResult<Vec<QcdbTimespanRow>>;
}

/// [`QcdbSource`] over one PostgreSQL QC store instance.
pub struct PgQcdbSource {
    pool: PgPool,
}

impl PgQcdbSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Sensor as stored in the QC store: a single character.
fn sensor_to_db(sensor: Option<i32>) -> Option<String> {
    sensor.map(|s| s.to_string())
}

fn to_utc(t: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&t)
}

type DataRow = (
    NaiveDateTime,
    f64,
    NaiveDateTime,
    f64,
    Option<String>,
    Option<String>,
    Option<String>,
);

#[async_trait]
impl QcdbSource for PgQcdbSource {
    async fn data_labels(&self, window: &TimeWindow) -> StorageResult<Vec<Label>> {
        let (from, to) = window.naive_bounds();
        let rows = sqlx::query_as::<_, (i32, i32, i32, Option<i32>, Option<i32>)>(&format!(
            "SELECT DISTINCT stationid, typeid, paramid, sensor::int, level FROM data \
             WHERE {WINDOW_FILTER}"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Data label query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(station, type_id, param, sensor, level)| {
                Label::new(station, type_id, param, sensor, level)
            })
            .collect())
    }

    async fn text_labels(&self, window: &TimeWindow) -> StorageResult<Vec<Label>> {
        let (from, to) = window.naive_bounds();
        let rows = sqlx::query_as::<_, (i32, i32, i32)>(&format!(
            "SELECT DISTINCT stationid, typeid, paramid FROM text_data WHERE {WINDOW_FILTER}"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Text label query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(station, type_id, param)| Label::text(station, type_id, param))
            .collect())
    }

    async fn fetch_data(
        &self,
        label: &Label,
        window: &TimeWindow,
    ) -> StorageResult<Vec<QcdbDataRecord>> {
        let (from, to) = window.naive_bounds();
        let rows = sqlx::query_as::<_, DataRow>(&format!(
            "SELECT obstime, original, tbtime, corrected, controlinfo, useinfo, cfailed FROM data \
             WHERE {WINDOW_FILTER} AND stationid = $3 AND typeid = $4 AND paramid = $5 \
             AND sensor IS NOT DISTINCT FROM $6 AND level IS NOT DISTINCT FROM $7 \
             ORDER BY obstime"
        ))
        .bind(from)
        .bind(to)
        .bind(label.station_id)
        .bind(label.type_id)
        .bind(label.param_id)
        .bind(sensor_to_db(label.sensor))
        .bind(label.level)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Data series query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(
                |(obstime, original, tbtime, corrected, controlinfo, useinfo, cfailed)| {
                    QcdbDataRecord {
                        obstime: to_utc(obstime),
                        original,
                        tbtime: to_utc(tbtime),
                        corrected,
                        controlinfo: controlinfo.unwrap_or_default(),
                        useinfo: useinfo.unwrap_or_default(),
                        cfailed: cfailed.unwrap_or_default(),
                    }
                },
            )
            .collect())
    }

    async fn fetch_text(
        &self,
        label: &Label,
        window: &TimeWindow,
    ) -> StorageResult<Vec<QcdbTextRecord>> {
        let (from, to) = window.naive_bounds();
        let rows = sqlx::query_as::<_, (NaiveDateTime, Option<String>, NaiveDateTime)>(&format!(
            "SELECT obstime, original, tbtime FROM text_data \
             WHERE {WINDOW_FILTER} AND stationid = $3 AND typeid = $4 AND paramid = $5 \
             ORDER BY obstime"
        ))
        .bind(from)
        .bind(to)
        .bind(label.station_id)
        .bind(label.type_id)
        .bind(label.param_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Text series query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(obstime, original, tbtime)| QcdbTextRecord {
                obstime: to_utc(obstime),
                original: original.unwrap_or_default(),
                tbtime: to_utc(tbtime),
            })
            .collect())
    }

    async fn timespans(&self) -> StorageResult<Vec<QcdbTimespanRow>> {
        let rows = sqlx::query_as::<
            _,
            (i32, Option<i32>, Option<NaiveDateTime>, Option<NaiveDateTime>),
        >("SELECT stationid, paramid, fromtime, totime FROM station_metadata")
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Station metadata query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(station_id, param_id, from, to)| QcdbTimespanRow {
                station_id,
                param_id,
                from: from.map(to_utc),
                to: to.map(to_utc),
            })
            .collect())
    }
}
