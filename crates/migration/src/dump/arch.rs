//! Archive table dumps.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use obs_common::{AllowList, TimeWindow};
use storage::{ArchSource, SeriesQuery};

use super::{needs_dump, write_dump_file, DumpOptions, DumpSummary, SeriesOutcome};
use crate::error::Result;
use crate::manifest::{arch_manifest_path, arch_series_path, write_manifest, ArchManifestRow};
use crate::notify::CrashNotifier;
use crate::progress::station_bar;
use crate::tables::{ArchTable, DumpStrategy};
use crate::worker::run_batch;

/// Dump every selected (station, element) series of `table`.
#[instrument(skip_all, fields(table = table.name))]
pub async fn dump_arch_table(
    source: Arc<dyn ArchSource>,
    table: &'static ArchTable,
    stations: &AllowList<i32>,
    elements: &AllowList<String>,
    opts: &DumpOptions,
    notifier: Arc<dyn CrashNotifier>,
) -> Result<DumpSummary> {
    let element_list = table_elements(source.as_ref(), table, elements).await?;
    let station_list = table_stations(source.as_ref(), table, stations).await?;

    let manifest: Vec<ArchManifestRow> = station_list
        .iter()
        .flat_map(|&station| {
            element_list.iter().map(move |element| ArchManifestRow {
                station,
                element: element.clone(),
            })
        })
        .collect();
    write_manifest(&arch_manifest_path(&opts.path, table), &manifest)?;

    info!(
        stations = station_list.len(),
        elements = element_list.len(),
        strategy = %table.dump,
        "Dumping archive table"
    );

    let semaphore = Arc::new(Semaphore::new(opts.max_conn.max(1)));
    let bar = station_bar(station_list.len(), table.name, opts.show_progress);
    let mut summary = DumpSummary::default();

    for &station in &station_list {
        let tasks = element_list
            .iter()
            .map(|element| {
                let job = SeriesJob {
                    source: source.clone(),
                    table,
                    station,
                    element: element.clone(),
                    root: opts.path.clone(),
                    window: opts.window,
                    overwrite: opts.overwrite,
                };
                (job.name(), job.run())
            })
            .collect();

        let results = run_batch(&semaphore, tasks, &notifier).await?;
        summary.absorb(results);
        bar.inc(1);
    }

    bar.finish_with_message(format!("{} done", table.name));
    info!(
        written = summary.written,
        rows = summary.rows,
        existing = summary.existing,
        empty = summary.empty,
        failed = summary.failed,
        panicked = summary.panicked,
        "Archive table dumped"
    );
    Ok(summary)
}

/// Element columns to dump, lowercased and filtered.
async fn table_elements(
    source: &dyn ArchSource,
    table: &ArchTable,
    requested: &AllowList<String>,
) -> Result<Vec<String>> {
    let available = match table.fixed_elements() {
        Some(fixed) => fixed.iter().map(|e| e.to_string()).collect(),
        None => source.element_columns(table.name).await?,
    };

    let requested: AllowList<String> = requested
        .values()
        .iter()
        .map(|e| e.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .into();
    let (kept, missing) = requested.select_from(available);
    for element in missing {
        warn!(table = table.name, element = %element, "Requested element not found in table");
    }
    Ok(kept)
}

async fn table_stations(
    source: &dyn ArchSource,
    table: &ArchTable,
    requested: &AllowList<i32>,
) -> Result<Vec<i32>> {
    let available = source.stations(table.station_source()).await?;
    let (kept, missing) = requested.select_from(available);
    for station in missing {
        warn!(table = table.name, station, "Requested station not found in table");
    }
    Ok(kept)
}

/// One (station, element) series of an archive table.
struct SeriesJob {
    source: Arc<dyn ArchSource>,
    table: &'static ArchTable,
    station: i32,
    element: String,
    root: PathBuf,
    window: TimeWindow,
    overwrite: bool,
}

impl SeriesJob {
    fn name(&self) -> String {
        format!("{} - {} - {}", self.table.name, self.station, self.element)
    }

    async fn run(self) -> DumpSummary {
        match self.table.dump {
            DumpStrategy::ByYear => self.run_by_year().await,
            _ => DumpSummary::from_outcome(self.dump(None).await),
        }
    }

    async fn run_by_year(self) -> DumpSummary {
        let mut summary = DumpSummary::default();
        let years = match self.year_range().await {
            Ok(Some(range)) => range,
            Ok(None) => {
                warn!(series = %self.name(), "EMPTY_QUERY");
                summary.empty = 1;
                return summary;
            }
            Err(e) => {
                warn!(series = %self.name(), error = %e, "Could not determine year range");
                summary.failed = 1;
                return summary;
            }
        };

        for year in years.0..=years.1 {
            if !year_overlaps(&self.window, year) {
                continue;
            }
            summary += DumpSummary::from_outcome(self.dump(Some(year)).await);
        }
        summary
    }

    /// Inclusive year range over the data and flag tables.
    async fn year_range(&self) -> Result<Option<(i32, i32)>> {
        let mut range = self
            .source
            .year_range(self.table.name, self.station, &self.element)
            .await?;

        if let Some(flag_table) = self.table.dump_flag_table() {
            let flags = self
                .source
                .year_range(flag_table, self.station, &self.element)
                .await?;
            range = match (range, flags) {
                (Some((a0, a1)), Some((b0, b1))) => Some((a0.min(b0), a1.max(b1))),
                (range, flags) => range.or(flags),
            };
        }
        Ok(range)
    }

    async fn dump(&self, year: Option<i32>) -> SeriesOutcome {
        let path = arch_series_path(&self.root, self.table, self.station, year, &self.element);
        if !needs_dump(&path, self.overwrite) {
            return SeriesOutcome::Exists;
        }

        let name = match year {
            Some(year) => format!("{} - {}", self.name(), year),
            None => self.name(),
        };

        let query = SeriesQuery {
            data_table: self.table.name.to_string(),
            flag_table: self.table.dump_flag_table().map(str::to_string),
            station: self.station,
            element: self.element.clone(),
            window: self.window,
            year,
            months_only: self.table.dump == DumpStrategy::HomogenMonth,
        };

        match self.source.fetch_series(&query).await {
            Ok(rows) => write_dump_file(&path, &rows, &name),
            Err(e) => {
                warn!(series = %name, error = %e, "Series query failed");
                SeriesOutcome::Failed
            }
        }
    }
}

/// Whether calendar `year` intersects `window`.
fn year_overlaps(window: &TimeWindow, year: i32) -> bool {
    let starts_after = window.to.is_some_and(|to| {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .is_some_and(|start| start >= to)
    });
    let ends_before = window.from.is_some_and(|from| from.year() > year);
    !starts_after && !ends_before
}
