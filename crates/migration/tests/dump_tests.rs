//! Dump engine tests against in-memory sources.

use std::sync::Arc;

use obs_common::{AllowList, Label, LabelFilter, TimeWindow};

use migration::dump::{dump_arch_table, dump_qcdb_table};
use migration::manifest::{arch_manifest_path, qcdb_manifest_path, read_manifest, ArchManifestRow};
use migration::{ArchTable, CrashNotifier, DumpOptions, DumpSummary, LogNotifier, QcdbDb, QcdbTable};
use test_utils::fixtures::{params, stations};
use test_utils::{
    hourly_observations, qcdb_data_records, qcdb_text_records, read_lines, utc, DumpTree,
    MemoryArchSource, MemoryQcdbSource,
};

fn notifier() -> Arc<dyn CrashNotifier> {
    Arc::new(LogNotifier::default())
}

fn options(tree: &DumpTree) -> DumpOptions {
    DumpOptions {
        path: tree.root().to_path_buf(),
        max_conn: 2,
        ..DumpOptions::default()
    }
}

fn table(name: &str) -> &'static ArchTable {
    ArchTable::find(name).expect("table is registered")
}

async fn dump_arch(
    source: &Arc<MemoryArchSource>,
    name: &str,
    elements: &AllowList<String>,
    opts: &DumpOptions,
) -> DumpSummary {
    dump_arch_table(
        source.clone(),
        table(name),
        &AllowList::default(),
        elements,
        opts,
        notifier(),
    )
    .await
    .unwrap()
}

// ============================================================================
// Archive dumps
// ============================================================================

#[tokio::test]
async fn test_arch_dump_writes_manifest_and_series() {
    let tree = DumpTree::new();
    let rows = hourly_observations(utc(2000, 1, 1, 0), 3);
    let source = Arc::new(
        MemoryArchSource::new()
            .with_series("T_ADATA", stations::BLINDERN, "ta", rows.clone())
            .with_series("T_ADATA", stations::FLORIDA, "ta", rows),
    );

    let summary = dump_arch(&source, "T_ADATA", &AllowList::default(), &options(&tree)).await;

    assert_eq!(summary.written, 2);
    assert_eq!(summary.rows, 6);

    let manifest: Vec<ArchManifestRow> =
        read_manifest(&arch_manifest_path(tree.root(), table("T_ADATA"))).unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest[0].station, stations::BLINDERN);
    assert_eq!(manifest[0].element, "ta");

    let lines = read_lines(&tree.root().join("arch/T_ADATA/18700/ta.csv"));
    assert_eq!(lines[0], "3");
    assert_eq!(lines[1], "2000-01-01_00:00:00,0,");

    let query = &source.queries()[0];
    assert_eq!(query.flag_table.as_deref(), Some("T_AFLAG"));
    assert_eq!(query.year, None);
    assert!(!query.months_only);
}

#[tokio::test]
async fn test_arch_dump_keeps_existing_files() {
    let tree = DumpTree::new();
    let existing = tree.write_raw("arch/T_ADATA/18700/ta.csv", "1\n2000-01-01_00:00:00,9,\n");
    let source = Arc::new(MemoryArchSource::new().with_series(
        "T_ADATA",
        stations::BLINDERN,
        "ta",
        hourly_observations(utc(2000, 1, 1, 0), 3),
    ));

    let summary = dump_arch(&source, "T_ADATA", &AllowList::default(), &options(&tree)).await;
    assert_eq!(summary.existing, 1);
    assert!(source.queries().is_empty());
    assert_eq!(read_lines(&existing)[0], "1");

    let opts = DumpOptions {
        overwrite: true,
        ..options(&tree)
    };
    let summary = dump_arch(&source, "T_ADATA", &AllowList::default(), &opts).await;
    assert_eq!(summary.written, 1);
    assert_eq!(read_lines(&existing)[0], "3");
}

#[tokio::test]
async fn test_arch_dump_empty_query_writes_no_file() {
    let tree = DumpTree::new();
    let source = Arc::new(MemoryArchSource::new().with_series(
        "T_ADATA",
        stations::BLINDERN,
        "ta",
        hourly_observations(utc(2000, 1, 1, 0), 3),
    ));
    let opts = DumpOptions {
        window: TimeWindow::new(Some(utc(2010, 1, 1, 0)), None),
        ..options(&tree)
    };

    let summary = dump_arch(&source, "T_ADATA", &AllowList::default(), &opts).await;

    assert_eq!(summary.empty, 1);
    assert_eq!(summary.written, 0);
    assert!(!tree.root().join("arch/T_ADATA/18700/ta.csv").exists());
}

#[tokio::test]
async fn test_arch_dump_by_year_partitions_files() {
    let tree = DumpTree::new();
    let source = Arc::new(MemoryArchSource::new().with_series(
        "T_MINUTE_DATA",
        stations::BLINDERN,
        "ta",
        hourly_observations(utc(2000, 12, 31, 22), 4),
    ));

    let summary =
        dump_arch(&source, "T_MINUTE_DATA", &AllowList::default(), &options(&tree)).await;

    assert_eq!(summary.written, 2);
    assert_eq!(summary.rows, 4);
    let dir = tree.root().join("arch/T_MINUTE_DATA/18700");
    assert_eq!(read_lines(&dir.join("2000/ta.csv"))[0], "2");
    assert_eq!(read_lines(&dir.join("2001/ta.csv"))[0], "2");

    let years: Vec<_> = source.queries().iter().map(|q| q.year).collect();
    assert_eq!(years, vec![Some(2000), Some(2001)]);
}

#[tokio::test]
async fn test_arch_dump_by_year_respects_window() {
    let tree = DumpTree::new();
    let source = Arc::new(MemoryArchSource::new().with_series(
        "T_MINUTE_DATA",
        stations::BLINDERN,
        "ta",
        hourly_observations(utc(2000, 12, 31, 22), 4),
    ));
    let opts = DumpOptions {
        window: TimeWindow::new(Some(utc(2001, 1, 1, 0)), None),
        ..options(&tree)
    };

    let summary = dump_arch(&source, "T_MINUTE_DATA", &AllowList::default(), &opts).await;

    assert_eq!(summary.written, 1);
    assert!(!tree.root().join("arch/T_MINUTE_DATA/18700/2000").exists());
}

#[tokio::test]
async fn test_arch_dump_homogen_month_uses_fixed_elements() {
    let tree = DumpTree::new();
    let source = Arc::new(MemoryArchSource::new().with_series(
        "T_HOMOGEN_MONTH",
        stations::BLINDERN,
        "rr",
        hourly_observations(utc(1990, 1, 1, 0), 2),
    ));

    let summary =
        dump_arch(&source, "T_HOMOGEN_MONTH", &AllowList::default(), &options(&tree)).await;

    // `tam` has no data in the source.
    assert_eq!(summary.written, 1);
    assert_eq!(summary.empty, 1);
    assert!(source.queries().iter().all(|q| q.months_only && q.flag_table.is_none()));
}

#[tokio::test]
async fn test_arch_dump_element_allow_list() {
    let tree = DumpTree::new();
    let rows = hourly_observations(utc(2000, 1, 1, 0), 1);
    let source = Arc::new(
        MemoryArchSource::new()
            .with_series("T_ADATA", stations::BLINDERN, "ta", rows.clone())
            .with_series("T_ADATA", stations::BLINDERN, "rr_1", rows),
    );

    let elements = AllowList::new(vec!["TA".to_string(), "missing".to_string()]);
    let summary = dump_arch(&source, "T_ADATA", &elements, &options(&tree)).await;

    assert_eq!(summary.written, 1);
    assert!(tree.root().join("arch/T_ADATA/18700/ta.csv").exists());
    assert!(!tree.root().join("arch/T_ADATA/18700/rr_1.csv").exists());
}

#[tokio::test]
async fn test_arch_dump_survives_panicking_and_failing_series() {
    let tree = DumpTree::new();
    let rows = hourly_observations(utc(2000, 1, 1, 0), 2);
    let source = Arc::new(
        MemoryArchSource::new()
            .with_series("T_ADATA", stations::BLINDERN, "ta", rows.clone())
            .with_series("T_ADATA", stations::BLINDERN, "rr_1", rows.clone())
            .with_series("T_ADATA", stations::BLINDERN, "po", rows)
            .panic_on("rr_1")
            .fail_on("po"),
    );

    let summary = dump_arch(&source, "T_ADATA", &AllowList::default(), &options(&tree)).await;

    assert_eq!(summary.written, 1);
    assert_eq!(summary.panicked, 1);
    assert_eq!(summary.failed, 1);
    assert!(tree.root().join("arch/T_ADATA/18700/ta.csv").exists());
}

// ============================================================================
// QC store dumps
// ============================================================================

fn data_label(param: i32) -> Label {
    Label::new(stations::BLINDERN, params::TYPE_SYNOP, param, Some(0), Some(0))
}

async fn dump_qcdb(
    source: &Arc<MemoryQcdbSource>,
    table: QcdbTable,
    filter: &LabelFilter,
    opts: &DumpOptions,
) -> DumpSummary {
    dump_qcdb_table(source.clone(), QcdbDb::Historical, table, filter, opts, notifier())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_qcdb_dump_writes_manifest_and_label_files() {
    let tree = DumpTree::new();
    let source = Arc::new(
        MemoryQcdbSource::new()
            .with_data(data_label(params::TA), qcdb_data_records(utc(2020, 1, 1, 0), 3))
            .with_data(data_label(params::RR_1), qcdb_data_records(utc(2020, 1, 1, 0), 1)),
    );

    let summary = dump_qcdb(&source, QcdbTable::Data, &LabelFilter::default(), &options(&tree)).await;

    assert_eq!(summary.written, 2);
    assert_eq!(summary.rows, 4);

    let manifest: Vec<Label> = read_manifest(&qcdb_manifest_path(
        tree.root(),
        QcdbDb::Historical,
        QcdbTable::Data,
    ))
    .unwrap();
    assert_eq!(manifest, vec![data_label(params::RR_1), data_label(params::TA)]);

    let lines = read_lines(&tree.root().join("qcdb_hist/data/18700/18700_501_211_0_0.csv"));
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("2020-01-01T00:00:00Z,0,"));
}

#[tokio::test]
async fn test_qcdb_dump_reuses_manifest_unless_updated() {
    let tree = DumpTree::new();
    let source = Arc::new(MemoryQcdbSource::new().with_text(
        Label::text(stations::BLINDERN, params::TYPE_SYNOP, params::WEATHER_TEXT),
        qcdb_text_records(utc(2020, 1, 1, 0), &["RA"]),
    ));

    dump_qcdb(&source, QcdbTable::Text, &LabelFilter::default(), &options(&tree)).await;
    let second = dump_qcdb(&source, QcdbTable::Text, &LabelFilter::default(), &options(&tree)).await;
    assert_eq!(source.label_queries(), 1);
    assert_eq!(second.existing, 1);

    let opts = DumpOptions {
        update_labels: true,
        ..options(&tree)
    };
    dump_qcdb(&source, QcdbTable::Text, &LabelFilter::default(), &opts).await;
    assert_eq!(source.label_queries(), 2);

    assert!(tree
        .root()
        .join("qcdb_hist/text/18700/18700_501_1000__.csv")
        .exists());
}

#[tokio::test]
async fn test_qcdb_dump_filter_keeps_full_manifest() {
    let tree = DumpTree::new();
    let source = Arc::new(
        MemoryQcdbSource::new()
            .with_data(data_label(params::TA), qcdb_data_records(utc(2020, 1, 1, 0), 1))
            .with_data(data_label(params::RR_1), qcdb_data_records(utc(2020, 1, 1, 0), 1)),
    );
    let filter = LabelFilter {
        params: AllowList::new(vec![params::TA]),
        ..LabelFilter::default()
    };

    let summary = dump_qcdb(&source, QcdbTable::Data, &filter, &options(&tree)).await;

    assert_eq!(summary.written, 1);
    let manifest: Vec<Label> = read_manifest(&qcdb_manifest_path(
        tree.root(),
        QcdbDb::Historical,
        QcdbTable::Data,
    ))
    .unwrap();
    assert_eq!(manifest.len(), 2);
}
