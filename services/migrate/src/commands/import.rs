//! `migrate import arch|qcdb`.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use migration::import::{import_arch_table, import_qcdb_table};
use migration::{ImportOptions, ImportSummary, MetadataCache, ProductOffsets};
use storage::{
    connect_pool, ArchSource, Catalog, CatalogSnapshot, ConflictPolicy, DestStore, Destination,
    PgArchSource, PgQcdbSource, QcdbSource,
};

use crate::cli::{parse_sep, ArchImportArgs, CommonArgs, ImportArgs, QcdbImportArgs};
use crate::commands::{notifier, qcdb_family, run_table, select_arch_tables, Phase};
use crate::config::{MigrateConfig, Slot};
use crate::logging::LogSink;

fn import_options(common: &CommonArgs, import: &ImportArgs) -> Result<ImportOptions> {
    let sep = parse_sep(&import.sep).map_err(|e| anyhow!(e))?;
    Ok(ImportOptions {
        path: common.path.clone(),
        window: common.window(),
        sep,
        has_header: import.header,
        max_workers: import.max_workers.max(1),
        show_progress: !common.quiet,
    })
}

fn conflict_policy(import: &ImportArgs) -> ConflictPolicy {
    if import.strict_copy {
        ConflictPolicy::Strict
    } else {
        ConflictPolicy::Skip
    }
}

async fn catalog_snapshot(config: &MigrateConfig) -> Result<CatalogSnapshot> {
    let catalog = Catalog::connect(config.require(Slot::Catalog)?, config.catalog_timeout)
        .await
        .context("Failed to reach the source catalog")?;
    Ok(catalog.snapshot().await?)
}

async fn destination(
    config: &MigrateConfig,
    opts: &ImportOptions,
    import: &ImportArgs,
) -> Result<Arc<dyn Destination>> {
    let pool = connect_pool(
        Slot::Dest.name(),
        config.require(Slot::Dest)?,
        opts.max_workers as u32,
    )
    .await
    .context("Failed to connect to the destination")?;
    Ok(Arc::new(DestStore::new(pool, conflict_policy(import))))
}

pub async fn arch(args: ArchImportArgs, config: &MigrateConfig, sink: &LogSink) -> Result<()> {
    let opts = import_options(&args.common, &args.import)?;
    let tables = select_arch_tables(&args.selection.tables);
    let notifier = notifier(&args.common.email);

    let offsets_path = args.offsets.as_ref().unwrap_or(&config.offsets_path);
    let offsets = ProductOffsets::load(offsets_path)
        .with_context(|| format!("Failed to load product offsets from {}", offsets_path.display()))?;

    let stations = args.selection.station_list();
    let elements = args.selection.element_list();

    let snapshot = catalog_snapshot(config).await?;
    let arch_pool = connect_pool(Slot::Arch.name(), config.require(Slot::Arch)?, 2)
        .await
        .context("Failed to connect to the archive")?;
    let arch: Arc<dyn ArchSource> = Arc::new(PgArchSource::new(arch_pool));
    let cache = MetadataCache::load_arch(
        snapshot,
        arch.as_ref(),
        &tables,
        &stations,
        &elements,
        offsets,
    )
    .await
    .context("Failed to load archive metadata")?;
    let cache = Arc::new(cache);

    let dest = destination(config, &opts, &args.import).await?;
    let mut total = ImportSummary::default();

    for table in tables {
        let task = {
            let dest = dest.clone();
            let cache = cache.clone();
            let stations = stations.clone();
            let elements = elements.clone();
            let opts = opts.clone();
            let notifier = notifier.clone();
            async move {
                import_arch_table(dest, cache, table, &stations, &elements, &opts, notifier).await
            }
        };

        if let Some(summary) =
            run_table(sink, &opts.path, table.name, Phase::Import, &notifier, task).await
        {
            print_summary(table.name, &summary);
            total += summary;
        }
    }

    info!(summary = ?total, "Archive import finished");
    Ok(())
}

pub async fn qcdb(args: QcdbImportArgs, config: &MigrateConfig, sink: &LogSink) -> Result<()> {
    let opts = import_options(&args.common, &args.import)?;
    let filter = args.selection.filter();
    let notifier = notifier(&args.common.email);

    let snapshot = catalog_snapshot(config).await?;
    let dest = destination(config, &opts, &args.import).await?;
    let mut total = ImportSummary::default();

    for db in args.selection.dbs() {
        let slot = Slot::Qcdb(db);
        let pool = connect_pool(slot.name(), config.require(slot)?, 2)
            .await
            .with_context(|| format!("Failed to connect to {}", slot.name()))?;
        let source: Arc<dyn QcdbSource> = Arc::new(PgQcdbSource::new(pool));
        let cache = MetadataCache::load_qcdb(snapshot.clone(), source.as_ref())
            .await
            .with_context(|| format!("Failed to load {} metadata", slot.name()))?;
        let cache = Arc::new(cache);

        for table in args.selection.tables() {
            let family = qcdb_family(db, table);
            let task = {
                let dest = dest.clone();
                let cache = cache.clone();
                let filter = filter.clone();
                let opts = opts.clone();
                let notifier = notifier.clone();
                async move {
                    import_qcdb_table(dest, cache, db, table, &filter, &opts, notifier).await
                }
            };

            if let Some(summary) =
                run_table(sink, &opts.path, &family, Phase::Import, &notifier, task).await
            {
                print_summary(&family, &summary);
                total += summary;
            }
        }
    }

    info!(summary = ?total, "QC store import finished");
    Ok(())
}

fn print_summary(family: &str, summary: &ImportSummary) {
    println!(
        "{}: {} rows inserted from {} files, {} skipped, {} failed, {} panicked",
        family,
        summary.inserted,
        summary.imported,
        summary.skipped,
        summary.failed,
        summary.panicked
    );
}
