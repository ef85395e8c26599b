//! QC store family dumps.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use obs_common::{Label, LabelFilter, TimeWindow};
use storage::QcdbSource;

use super::{needs_dump, write_dump_file, DumpOptions, DumpSummary, SeriesOutcome};
use crate::error::Result;
use crate::manifest::{qcdb_manifest_path, qcdb_series_path, read_manifest, write_manifest};
use crate::notify::CrashNotifier;
use crate::progress::station_bar;
use crate::tables::{QcdbDb, QcdbTable};
use crate::worker::run_batch;

/// Dump every label of one QC store family that passes `filter`.
#[instrument(skip_all, fields(db = %db, table = %table))]
pub async fn dump_qcdb_table(
    source: Arc<dyn QcdbSource>,
    db: QcdbDb,
    table: QcdbTable,
    filter: &LabelFilter,
    opts: &DumpOptions,
    notifier: Arc<dyn CrashNotifier>,
) -> Result<DumpSummary> {
    let labels = family_labels(source.as_ref(), db, table, opts).await?;

    let mut by_station: BTreeMap<i32, Vec<Label>> = BTreeMap::new();
    for label in labels.into_iter().filter(|l| filter.allows(l)) {
        by_station.entry(label.station_id).or_default().push(label);
    }

    info!(stations = by_station.len(), "Dumping QC store family");

    let semaphore = Arc::new(Semaphore::new(opts.max_conn.max(1)));
    let bar = station_bar(
        by_station.len(),
        &format!("{}/{}", db, table),
        opts.show_progress,
    );
    let mut summary = DumpSummary::default();

    for labels in by_station.into_values() {
        let tasks = labels
            .into_iter()
            .map(|label| {
                let job = LabelJob {
                    source: source.clone(),
                    db,
                    table,
                    label,
                    root: opts.path.clone(),
                    window: opts.window,
                    overwrite: opts.overwrite,
                };
                (job.label.to_string(), job.run())
            })
            .collect();

        let results = run_batch(&semaphore, tasks, &notifier).await?;
        summary.absorb(results);
        bar.inc(1);
    }

    bar.finish_with_message(format!("{}/{} done", db, table));
    info!(
        written = summary.written,
        rows = summary.rows,
        existing = summary.existing,
        empty = summary.empty,
        failed = summary.failed,
        panicked = summary.panicked,
        "QC store family dumped"
    );
    Ok(summary)
}

/// Labels of a family: the existing manifest, or a fresh query written to one.
async fn family_labels(
    source: &dyn QcdbSource,
    db: QcdbDb,
    table: QcdbTable,
    opts: &DumpOptions,
) -> Result<Vec<Label>> {
    let manifest = qcdb_manifest_path(&opts.path, db, table);
    if manifest.exists() && !opts.update_labels {
        let labels: Vec<Label> = read_manifest(&manifest)?;
        info!(labels = labels.len(), path = %manifest.display(), "Reusing label manifest");
        return Ok(labels);
    }

    let mut labels = match table {
        QcdbTable::Data => source.data_labels(&opts.window).await?,
        QcdbTable::Text => source.text_labels(&opts.window).await?,
    };
    labels.sort();
    labels.dedup();

    write_manifest(&manifest, &labels)?;
    info!(labels = labels.len(), path = %manifest.display(), "Wrote label manifest");
    Ok(labels)
}

struct LabelJob {
    source: Arc<dyn QcdbSource>,
    db: QcdbDb,
    table: QcdbTable,
    label: Label,
    root: PathBuf,
    window: TimeWindow,
    overwrite: bool,
}

impl LabelJob {
    async fn run(self) -> DumpSummary {
        DumpSummary::from_outcome(self.dump().await)
    }

    async fn dump(&self) -> SeriesOutcome {
        let path = qcdb_series_path(&self.root, self.db, self.table, &self.label);
        if !needs_dump(&path, self.overwrite) {
            return SeriesOutcome::Exists;
        }

        let name = format!("{}/{} - {}", self.db, self.table, self.label);
        let written = match self.table {
            QcdbTable::Data => self
                .source
                .fetch_data(&self.label, &self.window)
                .await
                .map(|rows| write_dump_file(&path, &rows, &name)),
            QcdbTable::Text => self
                .source
                .fetch_text(&self.label, &self.window)
                .await
                .map(|rows| write_dump_file(&path, &rows, &name)),
        };

        written.unwrap_or_else(|e| {
            warn!(series = %name, error = %e, "Series query failed");
            SeriesOutcome::Failed
        })
    }
}
