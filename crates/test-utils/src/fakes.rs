//! In-memory implementations of the storage traits.
//!
//! The fakes record everything they are asked to do so tests can assert on
//! the exact rows an import wrote or the queries a dump issued.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use obs_common::{
    DestFlagRow, DestTextRow, DestValueRow, Label, QcdbDataRecord, QcdbTextRecord,
    RawObservation, TimeWindow,
};
use storage::{
    label_candidates, ArchSource, Destination, QcdbSource, QcdbTimespanRow, SeriesQuery,
    StationSource, StorageError, StorageResult, TimespanRow,
};

// ============================================================================
// Destination
// ============================================================================

/// A timeseries created through [`Destination::resolve_or_create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSeries {
    pub id: i32,
    pub label: Label,
    pub from_time: DateTime<Utc>,
    pub to_time: Option<DateTime<Utc>>,
}

/// Destination that skips rows already present, like the default conflict policy.
///
/// Each file's rows are committed together, so a failing flag insert leaves
/// nothing behind.
#[derive(Default)]
pub struct MemoryDestination {
    series: Mutex<Vec<CreatedSeries>>,
    resolve_calls: AtomicUsize,
    fail_flags: bool,
    tables: Mutex<DestTables>,
}

#[derive(Default)]
struct DestTables {
    values: Vec<DestValueRow>,
    texts: Vec<DestTextRow>,
    flags: Vec<DestFlagRow>,
    value_keys: HashSet<(i32, DateTime<Utc>)>,
    text_keys: HashSet<(i32, DateTime<Utc>)>,
    flag_keys: HashSet<(i32, DateTime<Utc>)>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every batch that carries flag rows.
    pub fn failing_flags() -> Self {
        Self {
            fail_flags: true,
            ..Self::default()
        }
    }

    /// Register a label stored exactly as given, as an earlier migration might have.
    pub fn with_label(self, label: Label, from_time: DateTime<Utc>) -> Self {
        {
            let mut series = self.series.lock().unwrap();
            let id = series.len() as i32 + 1;
            series.push(CreatedSeries {
                id,
                label,
                from_time,
                to_time: None,
            });
        }
        self
    }

    pub fn series(&self) -> Vec<CreatedSeries> {
        self.series.lock().unwrap().clone()
    }

    /// Number of `resolve_or_create` calls, including lookups of existing labels.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn values(&self) -> Vec<DestValueRow> {
        self.tables.lock().unwrap().values.clone()
    }

    pub fn texts(&self) -> Vec<DestTextRow> {
        self.tables.lock().unwrap().texts.clone()
    }

    pub fn flags(&self) -> Vec<DestFlagRow> {
        self.tables.lock().unwrap().flags.clone()
    }
}

/// Rows of `rows` whose key is neither committed nor earlier in the batch.
fn new_rows<R: Clone>(
    keys: &HashSet<(i32, DateTime<Utc>)>,
    rows: &[R],
    key: impl Fn(&R) -> (i32, DateTime<Utc>),
) -> Vec<R> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| {
            let k = key(row);
            !keys.contains(&k) && seen.insert(k)
        })
        .cloned()
        .collect()
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn resolve_or_create(
        &self,
        label: &Label,
        from_time: DateTime<Utc>,
        to_time: Option<DateTime<Utc>>,
    ) -> StorageResult<i32> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let mut series = self.series.lock().unwrap();
        for (sensor, level) in label_candidates(label) {
            let candidate = Label {
                sensor,
                level,
                ..*label
            };
            if let Some(existing) = series.iter().find(|s| s.label == candidate) {
                return Ok(existing.id);
            }
        }
        let id = series.len() as i32 + 1;
        series.push(CreatedSeries {
            id,
            label: label.normalized(),
            from_time,
            to_time,
        });
        Ok(id)
    }

    async fn insert_observations(
        &self,
        values: &[DestValueRow],
        texts: &[DestTextRow],
        flags: &[DestFlagRow],
    ) -> StorageResult<u64> {
        let mut tables = self.tables.lock().unwrap();

        let values = new_rows(&tables.value_keys, values, |r| (r.timeseries, r.obstime));
        let texts = new_rows(&tables.text_keys, texts, |r| (r.timeseries, r.obstime));
        if self.fail_flags && !flags.is_empty() {
            return Err(StorageError::Copy {
                table: "flags.kvdata".to_string(),
                message: "flag insert rejected".to_string(),
            });
        }
        let flags = new_rows(&tables.flag_keys, flags, |r| (r.timeseries, r.obstime));

        let inserted = (values.len() + texts.len()) as u64;
        for row in values {
            tables.value_keys.insert((row.timeseries, row.obstime));
            tables.values.push(row);
        }
        for row in texts {
            tables.text_keys.insert((row.timeseries, row.obstime));
            tables.texts.push(row);
        }
        for row in flags {
            tables.flag_keys.insert((row.timeseries, row.obstime));
            tables.flags.push(row);
        }
        Ok(inserted)
    }
}

// ============================================================================
// Archive source
// ============================================================================

/// Archive holding whole series keyed by `(TABLE, station, element)`.
///
/// Station lookups through an owned element table return every station the
/// fake knows about.
#[derive(Default)]
pub struct MemoryArchSource {
    series: BTreeMap<(String, i32, String), Vec<RawObservation>>,
    columns: HashMap<String, Vec<String>>,
    timespans: HashMap<String, Vec<TimespanRow>>,
    panic_on: Option<String>,
    fail_on: Option<String>,
    queries: Mutex<Vec<SeriesQuery>>,
}

impl MemoryArchSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series; the element becomes a column of `table`.
    pub fn with_series(
        mut self,
        table: &str,
        station: i32,
        element: &str,
        rows: Vec<RawObservation>,
    ) -> Self {
        let table = table.to_ascii_uppercase();
        let element = element.to_ascii_lowercase();
        let columns = self.columns.entry(table.clone()).or_default();
        if !columns.contains(&element) {
            columns.push(element.clone());
        }
        self.series.insert((table, station, element), rows);
        self
    }

    pub fn with_timespans(mut self, elem_table: &str, rows: Vec<TimespanRow>) -> Self {
        self.timespans.insert(elem_table.to_string(), rows);
        self
    }

    /// Panic inside `fetch_series` for `element`.
    pub fn panic_on(mut self, element: &str) -> Self {
        self.panic_on = Some(element.to_ascii_lowercase());
        self
    }

    /// Fail `fetch_series` for `element` with a database error.
    pub fn fail_on(mut self, element: &str) -> Self {
        self.fail_on = Some(element.to_ascii_lowercase());
        self
    }

    /// Every series query issued so far.
    pub fn queries(&self) -> Vec<SeriesQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn rows(&self, table: &str, station: i32, element: &str) -> &[RawObservation] {
        self.series
            .get(&(table.to_ascii_uppercase(), station, element.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn stations_of(&self, table: Option<&str>) -> Vec<i32> {
        let stations: std::collections::BTreeSet<i32> = self
            .series
            .keys()
            .filter(|(t, _, _)| table.map_or(true, |table| t.eq_ignore_ascii_case(table)))
            .map(|(_, station, _)| *station)
            .collect();
        stations.into_iter().collect()
    }
}

#[async_trait]
impl ArchSource for MemoryArchSource {
    async fn element_columns(&self, data_table: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .columns
            .get(&data_table.to_ascii_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn stations(&self, source: StationSource<'_>) -> StorageResult<Vec<i32>> {
        Ok(match source {
            StationSource::SharedElemTable { table_name, .. } => self.stations_of(Some(table_name)),
            StationSource::DataTable(table) => self.stations_of(Some(table)),
            StationSource::ElemTable(_) => self.stations_of(None),
        })
    }

    async fn year_range(
        &self,
        table: &str,
        station: i32,
        element: &str,
    ) -> StorageResult<Option<(i32, i32)>> {
        let rows = self.rows(table, station, element);
        let years = rows.iter().map(|r| r.obstime.year());
        Ok(years.clone().min().zip(years.max()))
    }

    async fn fetch_series(&self, query: &SeriesQuery) -> StorageResult<Vec<RawObservation>> {
        self.queries.lock().unwrap().push(query.clone());
        if self.panic_on.as_deref() == Some(query.element.as_str()) {
            panic!("archive connection dropped while reading {}", query.element);
        }
        if self.fail_on.as_deref() == Some(query.element.as_str()) {
            return Err(StorageError::Database(format!(
                "relation {} is locked",
                query.data_table
            )));
        }

        Ok(self
            .rows(&query.data_table, query.station, &query.element)
            .iter()
            .filter(|r| query.window.contains(&r.obstime))
            .filter(|r| query.year.map_or(true, |year| r.obstime.year() == year))
            .cloned()
            .collect())
    }

    async fn timespans(&self, elem_table: &str) -> StorageResult<Vec<TimespanRow>> {
        Ok(self.timespans.get(elem_table).cloned().unwrap_or_default())
    }
}

// ============================================================================
// QC store source
// ============================================================================

/// QC store holding numeric and text series by label.
#[derive(Default)]
pub struct MemoryQcdbSource {
    data: BTreeMap<Label, Vec<QcdbDataRecord>>,
    text: BTreeMap<Label, Vec<QcdbTextRecord>>,
    timespans: Vec<QcdbTimespanRow>,
    label_queries: AtomicUsize,
}

impl MemoryQcdbSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, label: Label, rows: Vec<QcdbDataRecord>) -> Self {
        self.data.insert(label, rows);
        self
    }

    pub fn with_text(mut self, label: Label, rows: Vec<QcdbTextRecord>) -> Self {
        self.text.insert(label, rows);
        self
    }

    pub fn with_timespan(mut self, row: QcdbTimespanRow) -> Self {
        self.timespans.push(row);
        self
    }

    /// Number of label enumeration queries issued so far.
    pub fn label_queries(&self) -> usize {
        self.label_queries.load(Ordering::SeqCst)
    }
}

fn labels_in<R>(
    series: &BTreeMap<Label, Vec<R>>,
    window: &TimeWindow,
    obstime: impl Fn(&R) -> DateTime<Utc>,
) -> Vec<Label> {
    series
        .iter()
        .filter(|(_, rows)| rows.iter().any(|r| window.contains(&obstime(r))))
        .map(|(label, _)| *label)
        .collect()
}

#[async_trait]
impl QcdbSource for MemoryQcdbSource {
    async fn data_labels(&self, window: &TimeWindow) -> StorageResult<Vec<Label>> {
        self.label_queries.fetch_add(1, Ordering::SeqCst);
        Ok(labels_in(&self.data, window, |r| r.obstime))
    }

    async fn text_labels(&self, window: &TimeWindow) -> StorageResult<Vec<Label>> {
        self.label_queries.fetch_add(1, Ordering::SeqCst);
        Ok(labels_in(&self.text, window, |r| r.obstime))
    }

    async fn fetch_data(
        &self,
        label: &Label,
        window: &TimeWindow,
    ) -> StorageResult<Vec<QcdbDataRecord>> {
        Ok(self
            .data
            .get(label)
            .map(|rows| {
                rows.iter()
                    .filter(|r| window.contains(&r.obstime))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_text(
        &self,
        label: &Label,
        window: &TimeWindow,
    ) -> StorageResult<Vec<QcdbTextRecord>> {
        Ok(self
            .text
            .get(label)
            .map(|rows| {
                rows.iter()
                    .filter(|r| window.contains(&r.obstime))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn timespans(&self) -> StorageResult<Vec<QcdbTimespanRow>> {
        Ok(self.timespans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hourly_observations, utc};

    #[tokio::test]
    async fn test_destination_reuses_ids() {
        let dest = MemoryDestination::new();
        let label = Label::new(18700, 501, 211, Some(0), Some(0));
        let first = dest.resolve_or_create(&label, utc(2020, 1, 1, 0), None).await.unwrap();
        let second = dest.resolve_or_create(&label, utc(2021, 1, 1, 0), None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(dest.series().len(), 1);
        assert_eq!(dest.resolve_calls(), 2);
    }

    #[tokio::test]
    async fn test_destination_skips_duplicates() {
        let dest = MemoryDestination::new();
        let row = DestValueRow {
            timeseries: 1,
            obstime: utc(2020, 1, 1, 0),
            value: Some(1.0),
        };
        let rows = [row.clone(), row];
        assert_eq!(dest.insert_observations(&rows, &[], &[]).await.unwrap(), 1);
        assert_eq!(dest.insert_observations(&rows, &[], &[]).await.unwrap(), 0);
        assert_eq!(dest.values().len(), 1);
    }

    #[tokio::test]
    async fn test_destination_failed_flags_roll_back_values() {
        let dest = MemoryDestination::failing_flags();
        let obstime = utc(2020, 1, 1, 0);
        let value = DestValueRow {
            timeseries: 1,
            obstime,
            value: Some(1.0),
        };
        let flag = DestFlagRow {
            timeseries: 1,
            obstime,
            original: Some(1.0),
            corrected: Some(1.0),
            controlinfo: "0000000000000000".to_string(),
            useinfo: "0000000000000000".to_string(),
            cfailed: None,
        };

        assert!(dest.insert_observations(&[value], &[], &[flag]).await.is_err());
        assert!(dest.values().is_empty());
        assert!(dest.flags().is_empty());
    }

    #[tokio::test]
    async fn test_destination_matches_exact_zero_label_first() {
        let exact = Label::new(18700, 501, 211, Some(0), Some(0));
        let dest = MemoryDestination::new().with_label(exact, utc(2000, 1, 1, 0));

        let id = dest.resolve_or_create(&exact, utc(2020, 1, 1, 0), None).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(dest.series().len(), 1);
    }

    #[tokio::test]
    async fn test_arch_source_year_filter() {
        let source = MemoryArchSource::new().with_series(
            "T_MINUTE_DATA",
            18700,
            "ta",
            hourly_observations(utc(2000, 12, 31, 22), 4),
        );
        assert_eq!(
            source.year_range("T_MINUTE_DATA", 18700, "ta").await.unwrap(),
            Some((2000, 2001))
        );

        let query = SeriesQuery {
            data_table: "T_MINUTE_DATA".to_string(),
            flag_table: None,
            station: 18700,
            element: "ta".to_string(),
            window: TimeWindow::unbounded(),
            year: Some(2001),
            months_only: false,
        };
        assert_eq!(source.fetch_series(&query).await.unwrap().len(), 2);
        assert_eq!(source.queries().len(), 1);
    }
}
