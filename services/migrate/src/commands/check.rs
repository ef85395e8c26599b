//! `migrate check overlap|non-scalars`.

use anyhow::{Context, Result};
use tracing::info;

use migration::check::{load_family_manifests, overlap, scalar_mismatches};
use storage::Catalog;

use crate::cli::CheckArgs;
use crate::config::{MigrateConfig, Slot};

pub fn overlaps(args: CheckArgs) -> Result<()> {
    let (data, text) = load_family_manifests(&args.path, args.db)
        .with_context(|| format!("Failed to read the {} manifests", args.db))?;

    let triples = overlap(&data, &text);
    info!(db = %args.db, overlapping = triples.len(), "Checked data/text overlap");

    println!("station,type,param");
    for (station, type_id, param) in triples {
        println!("{},{},{}", station, type_id, param);
    }
    Ok(())
}

pub async fn non_scalars(args: CheckArgs, config: &MigrateConfig) -> Result<()> {
    let (data, text) = load_family_manifests(&args.path, args.db)
        .with_context(|| format!("Failed to read the {} manifests", args.db))?;

    let catalog = Catalog::connect(config.require(Slot::Catalog)?, config.catalog_timeout)
        .await
        .context("Failed to reach the source catalog")?;
    let non_scalar = catalog.non_scalar_params().await?;

    let mismatch = scalar_mismatches(&data, &text, &non_scalar);
    if mismatch.is_empty() {
        println!("No scalar mismatches in {}", args.db);
        return Ok(());
    }

    println!("Non-scalar params in data: {}", join(&mismatch.non_scalar_in_data));
    println!("Scalar params in text: {}", join(&mismatch.scalar_in_text));
    Ok(())
}

fn join(params: &[i32]) -> String {
    params
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
