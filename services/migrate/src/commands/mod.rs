//! Command handlers.
//!
//! Every table (or QC store family) runs as its own spawned task with logs
//! redirected to `{path}/{family}_{phase}_log.txt`. A failing or panicking
//! table is reported and the loop moves on to the next one.

pub mod check;
pub mod dump;
pub mod import;
pub mod list;

use std::fmt::Debug;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use migration::notify::join_error_message;
use migration::{ArchTable, CrashNotifier, LogNotifier};

use crate::logging::LogSink;

/// Phase name used in log file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dump,
    Import,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Dump => "dump",
            Phase::Import => "import",
        }
    }
}

/// Run one table to completion with its logs redirected.
///
/// Returns `None` when the table failed or panicked; both are logged and
/// a panic is also reported through `notifier`.
pub async fn run_table<T, F>(
    sink: &LogSink,
    log_dir: &Path,
    family: &str,
    phase: Phase,
    notifier: &Arc<dyn CrashNotifier>,
    task: F,
) -> Option<T>
where
    T: Debug + Send + 'static,
    F: Future<Output = migration::Result<T>> + Send + 'static,
{
    let guard = match sink.redirect(log_dir, family, phase.as_str()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!(family, error = %e, "Could not open table log file, logging to stderr");
            None
        }
    };

    let outcome = match tokio::spawn(task).await {
        Ok(Ok(summary)) => {
            info!(family, phase = phase.as_str(), summary = ?summary, "Table finished");
            Some(summary)
        }
        Ok(Err(e)) => {
            error!(family, phase = phase.as_str(), error = %e, "Table failed");
            None
        }
        Err(e) => {
            let message = join_error_message(e);
            error!(family, phase = phase.as_str(), error = %message, "Table panicked");
            notifier.notify(
                &format!("Migration {} of {} panicked", phase.as_str(), family),
                &message,
            );
            None
        }
    };

    drop(guard);
    outcome
}

/// Registry entries for the requested table names, or every table when none
/// were requested. Unknown names are warned about and skipped.
pub fn select_arch_tables(requested: &[String]) -> Vec<&'static ArchTable> {
    if requested.is_empty() {
        return ArchTable::all().iter().collect();
    }

    let mut selected: Vec<&'static ArchTable> = Vec::new();
    for name in requested {
        match ArchTable::find(name) {
            Some(table) if !selected.contains(&table) => selected.push(table),
            Some(_) => {}
            None => warn!(table = %name, "Unknown archive table, skipping"),
        }
    }
    selected
}

pub fn notifier(recipients: &[String]) -> Arc<dyn CrashNotifier> {
    Arc::new(LogNotifier::new(recipients.to_vec()))
}

/// Log family name of a QC store table, e.g. `qcdb_hist_data`.
pub fn qcdb_family(db: migration::QcdbDb, table: migration::QcdbTable) -> String {
    format!("{}_{}", db.dir_name(), table.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{MigrationError, QcdbDb, QcdbTable};

    #[test]
    fn test_select_arch_tables() {
        let all = select_arch_tables(&[]);
        assert_eq!(all.len(), ArchTable::all().len());

        let picked = select_arch_tables(&[
            "t_adata".to_string(),
            "T_NOPE".to_string(),
            "T_ADATA".to_string(),
        ]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "T_ADATA");
    }

    #[test]
    fn test_qcdb_family() {
        assert_eq!(qcdb_family(QcdbDb::Historical, QcdbTable::Text), "qcdb_hist_text");
    }

    async fn explode() -> migration::Result<usize> {
        panic!("table exploded")
    }

    #[tokio::test]
    async fn test_run_table_survives_failure_and_panic() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::default();
        let notifier = notifier(&[]);

        let ok = run_table(&sink, dir.path(), "T_ADATA", Phase::Dump, &notifier, async {
            Ok::<_, MigrationError>(3usize)
        })
        .await;
        assert_eq!(ok, Some(3));

        let failed: Option<usize> = run_table(
            &sink,
            dir.path(),
            "T_ADATA",
            Phase::Import,
            &notifier,
            async { Err(MigrationError::Task("boom".to_string())) },
        )
        .await;
        assert!(failed.is_none());

        let panicked = run_table(&sink, dir.path(), "T_MDATA", Phase::Dump, &notifier, explode()).await;
        assert!(panicked.is_none());

        assert!(dir.path().join("T_ADATA_dump_log.txt").exists());
        assert!(dir.path().join("T_MDATA_dump_log.txt").exists());
    }
}
