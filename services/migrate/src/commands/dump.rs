//! `migrate dump arch|qcdb`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use migration::dump::{dump_arch_table, dump_qcdb_table};
use migration::{DumpOptions, DumpSummary};
use storage::{connect_pool, ArchSource, PgArchSource, PgQcdbSource, QcdbSource};

use crate::cli::{ArchDumpArgs, CommonArgs, DumpArgs, QcdbDumpArgs};
use crate::commands::{notifier, qcdb_family, run_table, select_arch_tables, Phase};
use crate::config::{MigrateConfig, Slot};
use crate::logging::LogSink;

fn dump_options(common: &CommonArgs, dump: &DumpArgs, update_labels: bool) -> DumpOptions {
    DumpOptions {
        path: common.path.clone(),
        window: common.window(),
        overwrite: dump.overwrite,
        max_conn: dump.max_conn.max(1),
        update_labels,
        show_progress: !common.quiet,
    }
}

pub async fn arch(args: ArchDumpArgs, config: &MigrateConfig, sink: &LogSink) -> Result<()> {
    let tables = select_arch_tables(&args.selection.tables);
    let opts = dump_options(&args.common, &args.dump, false);
    let notifier = notifier(&args.common.email);

    let pool = connect_pool(
        Slot::Arch.name(),
        config.require(Slot::Arch)?,
        opts.max_conn as u32,
    )
    .await
    .context("Failed to connect to the archive")?;
    let source: Arc<dyn ArchSource> = Arc::new(PgArchSource::new(pool));

    let stations = args.selection.station_list();
    let elements = args.selection.element_list();
    let mut total = DumpSummary::default();

    for table in tables {
        let task = {
            let source = source.clone();
            let stations = stations.clone();
            let elements = elements.clone();
            let opts = opts.clone();
            let notifier = notifier.clone();
            async move { dump_arch_table(source, table, &stations, &elements, &opts, notifier).await }
        };

        let summary = run_table(sink, &opts.path, table.name, Phase::Dump, &notifier, task).await;
        if let Some(summary) = summary {
            print_summary(table.name, &summary);
            total += summary;
        }
    }

    info!(summary = ?total, "Archive dump finished");
    Ok(())
}

pub async fn qcdb(args: QcdbDumpArgs, config: &MigrateConfig, sink: &LogSink) -> Result<()> {
    let opts = dump_options(&args.common, &args.dump, args.update_labels);
    let filter = args.selection.filter();
    let notifier = notifier(&args.common.email);
    let mut total = DumpSummary::default();

    for db in args.selection.dbs() {
        let slot = Slot::Qcdb(db);
        let pool = connect_pool(slot.name(), config.require(slot)?, opts.max_conn as u32)
            .await
            .with_context(|| format!("Failed to connect to {}", slot.name()))?;
        let source: Arc<dyn QcdbSource> = Arc::new(PgQcdbSource::new(pool));

        for table in args.selection.tables() {
            let family = qcdb_family(db, table);
            let task = {
                let source = source.clone();
                let filter = filter.clone();
                let opts = opts.clone();
                let notifier = notifier.clone();
                async move { dump_qcdb_table(source, db, table, &filter, &opts, notifier).await }
            };

            if let Some(summary) =
                run_table(sink, &opts.path, &family, Phase::Dump, &notifier, task).await
            {
                print_summary(&family, &summary);
                total += summary;
            }
        }
    }

    info!(summary = ?total, "QC store dump finished");
    Ok(())
}

fn print_summary(family: &str, summary: &DumpSummary) {
    println!(
        "{}: {} series written ({} rows), {} existing, {} empty, {} failed, {} panicked",
        family,
        summary.written,
        summary.rows,
        summary.existing,
        summary.empty,
        summary.failed,
        summary.panicked
    );
}
