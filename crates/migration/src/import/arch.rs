//! Archive table imports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use obs_common::{AllowList, ElementKey, Label, RawObservation};
use storage::Destination;

use super::{
    count_inserted, insert_batch, read_series_blocking, series_files, station_dirs, FileOutcome,
    ImportContext, ImportOptions, ImportSummary, RowBounds, SkipReason,
};
use crate::cache::MetadataCache;
use crate::convert::{convert_arch, ArchContext, ConvertedBatch};
use crate::error::Result;
use crate::manifest::arch_table_dir;
use crate::notify::CrashNotifier;
use crate::progress::station_bar;
use crate::tables::ArchTable;
use crate::worker::run_batch;

/// Element codes that are never migrated.
const INVALID_ELEMENTS: [&str; 9] = [
    "TYPEID",
    "TAM_NORMAL_9120",
    "RRA_NORMAL_9120",
    "OT",
    "OTN",
    "OTX",
    "DD06",
    "DD12",
    "DD18",
];

/// Whether an (uppercased) element code may be imported.
pub fn is_importable_element(element: &str) -> bool {
    !INVALID_ELEMENTS.contains(&element) && !element.contains("KOPI")
}

/// Element code of a dump file: its uppercased stem.
fn element_code(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_ascii_uppercase())
}

/// Import the dump of one archive table.
#[instrument(skip_all, fields(table = table.name))]
pub async fn import_arch_table(
    dest: Arc<dyn Destination>,
    cache: Arc<MetadataCache>,
    table: &'static ArchTable,
    stations: &AllowList<i32>,
    elements: &AllowList<String>,
    opts: &ImportOptions,
    notifier: Arc<dyn CrashNotifier>,
) -> Result<ImportSummary> {
    if !table.should_import() {
        info!("Table is not imported, skipping");
        return Ok(ImportSummary::default());
    }

    let table_dir = arch_table_dir(&opts.path, table);
    if !table_dir.is_dir() {
        warn!(path = %table_dir.display(), "No dump found for table");
        return Ok(ImportSummary::default());
    }

    let elements: AllowList<String> = elements
        .values()
        .iter()
        .map(|e| e.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .into();

    let dirs: Vec<_> = station_dirs(&table_dir)?
        .into_iter()
        .filter(|(station, _)| stations.allows(station))
        .collect();

    let shared = ImportContext::new(dest, opts);
    let semaphore = Arc::new(Semaphore::new(opts.max_workers.max(1)));
    let bar = station_bar(dirs.len(), table.name, opts.show_progress);
    let mut summary = ImportSummary::default();

    for (station, dir) in dirs {
        let tasks = series_files(&dir, 2)
            .into_iter()
            .filter_map(|path| {
                let element = element_code(&path)?;
                elements.allows(&element).then(|| ArchFileJob {
                    shared: shared.clone(),
                    cache: cache.clone(),
                    table,
                    station,
                    element,
                    path,
                })
            })
            .map(|job| (job.name(), job.run()))
            .collect();

        let results = run_batch(&semaphore, tasks, &notifier).await?;
        summary.absorb(results);
        bar.inc(1);
    }

    summary.inserted = shared.total_inserted();
    bar.finish_with_message(format!("{}: {} rows", table.name, summary.inserted));
    info!(
        inserted = summary.inserted,
        imported = summary.imported,
        skipped = summary.skipped,
        failed = summary.failed,
        panicked = summary.panicked,
        "Archive table imported"
    );
    Ok(summary)
}

/// One archive series file.
struct ArchFileJob {
    shared: ImportContext,
    cache: Arc<MetadataCache>,
    table: &'static ArchTable,
    station: i32,
    element: String,
    path: PathBuf,
}

impl ArchFileJob {
    fn name(&self) -> String {
        format!("{} - {} - {}", self.table.name, self.station, self.element)
    }

    async fn run(self) -> FileOutcome {
        let name = self.name();
        match self.import().await {
            Ok(FileOutcome::Inserted(rows)) => {
                debug!(series = %name, rows, "Imported series");
                FileOutcome::Inserted(rows)
            }
            Ok(FileOutcome::Skipped(reason)) => {
                warn!(series = %name, reason = %reason, "Skipped series");
                FileOutcome::Skipped(reason)
            }
            Ok(outcome) => outcome,
            Err(e) => {
                error!(series = %name, error = %e, "Failed to import series");
                FileOutcome::Failed(e.to_string())
            }
        }
    }

    async fn import(&self) -> Result<FileOutcome> {
        if !is_importable_element(&self.element) {
            return Ok(FileOutcome::Skipped(SkipReason::InvalidElement));
        }

        let key = ElementKey::new(self.table.name, &self.element);
        let Some(info) = self.cache.element(&key) else {
            return Ok(FileOutcome::Skipped(SkipReason::MissingMetadata));
        };

        if !self
            .cache
            .timeseries_is_open(self.station, info.type_id, info.param_id)
        {
            return Ok(FileOutcome::Skipped(SkipReason::Restricted));
        }

        let span = self.cache.arch_timespan(&key, self.station);
        let bounds = RowBounds {
            span,
            window: self.shared.window,
            until_year: self.table.import_until,
        };
        let rows: Vec<RawObservation> = read_series_blocking(
            self.path.clone(),
            self.shared.sep,
            self.shared.has_header,
            bounds,
        )
        .await?;

        let Some(first) = rows.first() else {
            return Ok(FileOutcome::Skipped(SkipReason::NoRows));
        };

        let label = Label::new(
            self.station,
            info.type_id,
            info.param_id,
            info.sensor,
            info.level,
        );
        let from_time = info.valid_from.or(span.from).unwrap_or(first.obstime);
        let timeseries = self
            .shared
            .dest
            .resolve_or_create(&label, from_time, span.to)
            .await?;

        let ctx = ArchContext {
            timeseries,
            element: &self.element,
            is_scalar: info.is_scalar,
            offset: self.cache.offset(&key),
        };
        let mut batch = ConvertedBatch::with_capacity(rows.len());
        for obs in &rows {
            batch.push(convert_arch(self.table.convert, &ctx, obs)?);
        }

        let inserted = insert_batch(self.shared.dest.as_ref(), &batch).await?;
        count_inserted(&self.shared.inserted, inserted);
        Ok(FileOutcome::Inserted(inserted))
    }
}
