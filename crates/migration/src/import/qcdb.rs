//! QC store family imports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use chrono::{DateTime, Utc};

use obs_common::{CsvRecord, Label, LabelFilter, QcdbDataRecord, QcdbTextRecord};
use storage::Destination;

use super::{
    count_inserted, insert_batch, read_series_blocking, series_files, station_dirs, FileOutcome,
    ImportContext, ImportOptions, ImportSummary, RowBounds, SkipReason, Timed,
};
use crate::cache::MetadataCache;
use crate::convert::{convert_qcdb_data, convert_qcdb_text, ConvertedBatch};
use crate::error::Result;
use crate::manifest::qcdb_family_dir;
use crate::notify::CrashNotifier;
use crate::progress::station_bar;
use crate::tables::{QcdbDb, QcdbTable};
use crate::worker::run_batch;

/// Import the dump of one QC store family.
#[instrument(skip_all, fields(db = %db, table = %table))]
pub async fn import_qcdb_table(
    dest: Arc<dyn Destination>,
    cache: Arc<MetadataCache>,
    db: QcdbDb,
    table: QcdbTable,
    filter: &LabelFilter,
    opts: &ImportOptions,
    notifier: Arc<dyn CrashNotifier>,
) -> Result<ImportSummary> {
    let family_dir = qcdb_family_dir(&opts.path, db, table);
    if !family_dir.is_dir() {
        warn!(path = %family_dir.display(), "No dump found for family");
        return Ok(ImportSummary::default());
    }

    let dirs: Vec<_> = station_dirs(&family_dir)?
        .into_iter()
        .filter(|(station, _)| filter.stations.allows(station))
        .collect();

    let shared = ImportContext::new(dest, opts);
    let semaphore = Arc::new(Semaphore::new(opts.max_workers.max(1)));
    let bar = station_bar(dirs.len(), &format!("{}/{}", db, table), opts.show_progress);
    let mut summary = ImportSummary::default();

    for (_, dir) in dirs {
        let mut tasks = Vec::new();
        for path in series_files(&dir, 1) {
            let label = match label_of(&path) {
                Ok(label) => label,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Invalid dump filename");
                    summary.failed += 1;
                    continue;
                }
            };
            if !filter.allows(&label) {
                continue;
            }

            let job = LabelFileJob {
                shared: shared.clone(),
                cache: cache.clone(),
                db,
                table,
                label,
                path,
            };
            tasks.push((job.name(), job.run()));
        }

        let results = run_batch(&semaphore, tasks, &notifier).await?;
        summary.absorb(results);
        bar.inc(1);
    }

    summary.inserted = shared.total_inserted();
    bar.finish_with_message(format!("{}/{}: {} rows", db, table, summary.inserted));
    info!(
        inserted = summary.inserted,
        imported = summary.imported,
        skipped = summary.skipped,
        failed = summary.failed,
        panicked = summary.panicked,
        "QC store family imported"
    );
    Ok(summary)
}

fn label_of(path: &Path) -> Result<Label> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    Ok(Label::from_filename(name)?)
}

/// One QC store series file.
struct LabelFileJob {
    shared: ImportContext,
    cache: Arc<MetadataCache>,
    db: QcdbDb,
    table: QcdbTable,
    label: Label,
    path: PathBuf,
}

impl LabelFileJob {
    fn name(&self) -> String {
        format!("{}/{} - {}", self.db, self.table, self.label)
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
        let label = &self.label;
        if !self
            .cache
            .timeseries_is_open(label.station_id, label.type_id, label.param_id)
        {
            return Ok(FileOutcome::Skipped(SkipReason::Restricted));
        }

        let span = self.cache.qcdb_timespan(label.station_id, label.param_id);
        let bounds = RowBounds {
            span,
            window: self.shared.window,
            until_year: None,
        };

        let batch = match self.table {
            QcdbTable::Data => {
                let rows: Vec<QcdbDataRecord> = self.read(bounds).await?;
                let Some(first) = rows.first() else {
                    return Ok(FileOutcome::Skipped(SkipReason::NoRows));
                };
                let timeseries = self.resolve(span.from.unwrap_or(first.obstime), span.to).await?;

                let mut batch = ConvertedBatch::with_capacity(rows.len());
                for rec in &rows {
                    batch.push(convert_qcdb_data(timeseries, label.param_id, rec)?);
                }
                batch
            }
            QcdbTable::Text => {
                let rows: Vec<QcdbTextRecord> = self.read(bounds).await?;
                let Some(first) = rows.first() else {
                    return Ok(FileOutcome::Skipped(SkipReason::NoRows));
                };
                let timeseries = self.resolve(span.from.unwrap_or(first.obstime), span.to).await?;

                let mut batch = ConvertedBatch::with_capacity(rows.len());
                for rec in &rows {
                    batch.push(convert_qcdb_text(timeseries, label.param_id, rec)?);
                }
                batch
            }
        };

        let inserted = insert_batch(self.shared.dest.as_ref(), &batch).await?;
        count_inserted(&self.shared.inserted, inserted);
        Ok(FileOutcome::Inserted(inserted))
    }

    async fn read<T>(&self, bounds: RowBounds) -> Result<Vec<T>>
    where
        T: CsvRecord + Timed + Send + 'static,
    {
        read_series_blocking(
            self.path.clone(),
            self.shared.sep,
            self.shared.has_header,
            bounds,
        )
        .await
    }

    async fn resolve(
        &self,
        from_time: DateTime<Utc>,
        to_time: Option<DateTime<Utc>>,
    ) -> Result<i32> {
        Ok(self
            .shared
            .dest
            .resolve_or_create(&self.label, from_time, to_time)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_of_path() {
        let label = label_of(Path::new("/d/qcdb/data/18700/18700_501_211_0_0.csv")).unwrap();
        assert_eq!(label, Label::new(18700, 501, 211, Some(0), Some(0)));

        let text = label_of(Path::new("/d/qcdb/text/18700/18700_501_1000__.csv")).unwrap();
        assert_eq!(text, Label::text(18700, 501, 1000));

        assert!(label_of(Path::new("/d/qcdb/data/18700/18700_501.csv")).is_err());
    }
}
