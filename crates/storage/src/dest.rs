//! Destination gateway: timeseries labels and bulk observation inserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};

use obs_common::{DestFlagRow, DestTextRow, DestValueRow, Label};

use crate::copy::{encode_rows, CopyRow};
use crate::error::{StorageError, StorageResult};

const LOOKUP_SQL: &str = "SELECT timeseries FROM labels.met \
     WHERE station_id = $1 AND param_id = $2 AND type_id = $3 \
     AND lvl IS NOT DISTINCT FROM $4 AND sensor IS NOT DISTINCT FROM $5";

/// What a bulk insert does with rows already present in the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Stage the batch and insert with `ON CONFLICT DO NOTHING`.
    #[default]
    Skip,
    /// COPY straight into the target; a duplicate aborts the batch.
    Strict,
}

#[async_trait]
pub trait Destination: Send + Sync {
    /// Return the timeseries id of `label`, creating the timeseries if needed.
    ///
    /// Existing labels are matched by [`label_candidates`]; a new label is
    /// stored in its destination form (see [`Label::dest_sensor_level`]).
    async fn resolve_or_create(
        &self,
        label: &Label,
        from_time: DateTime<Utc>,
        to_time: Option<DateTime<Utc>>,
    ) -> StorageResult<i32>;

    /// Insert the rows of one file in a single transaction.
    ///
    /// Either every stream is written or none is. Returns the observation rows
    /// inserted (values and text); flag rows are not counted.
    async fn insert_observations(
        &self,
        values: &[DestValueRow],
        texts: &[DestTextRow],
        flags: &[DestFlagRow],
    ) -> StorageResult<u64>;
}

/// Sensor/level pairs under which an existing label may be stored, in lookup order.
///
/// The exact pair comes first; a pair of zeros is then also looked up as NULLs.
pub fn label_candidates(label: &Label) -> Vec<(Option<i32>, Option<i32>)> {
    let exact = (label.sensor, label.level);
    let dest = label.dest_sensor_level();
    if dest == exact {
        vec![exact]
    } else {
        vec![exact, dest]
    }
}

/// [`Destination`] backed by PostgreSQL.
pub struct DestStore {
    pool: PgPool,
    conflict: ConflictPolicy,
}

impl DestStore {
    pub fn new(pool: PgPool, conflict: ConflictPolicy) -> Self {
        Self { pool, conflict }
    }

    /// Look up an existing timeseries id, trying each of [`label_candidates`].
    async fn lookup(conn: &mut PgConnection, label: &Label) -> StorageResult<Option<i32>> {
        for (sensor, level) in label_candidates(label) {
            let id = sqlx::query_scalar::<_, i32>(LOOKUP_SQL)
                .bind(label.station_id)
                .bind(label.param_id)
                .bind(label.type_id)
                .bind(level)
                .bind(sensor)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| StorageError::Database(format!("Label lookup failed: {}", e)))?;
            if id.is_some() {
                return Ok(id);
            }
        }
        Ok(None)
    }

    /// Create a timeseries and its label in one transaction.
    ///
    /// An advisory lock keyed on the label serializes concurrent creators; the
    /// loser of the race finds the winner's row on re-lookup.
    async fn create(
        &self,
        label: &Label,
        from_time: DateTime<Utc>,
        to_time: Option<DateTime<Utc>>,
    ) -> StorageResult<i32> {
        let (sensor, level) = label.dest_sensor_level();
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(label.normalized().to_string())
            .execute(&mut *tx)
            .await?;

        if let Some(id) = Self::lookup(&mut tx, label).await? {
            tx.commit().await?;
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO public.timeseries (fromtime, totime) VALUES ($1, $2) RETURNING id",
        )
        .bind(from_time)
        .bind(to_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::Database(format!("Timeseries insert failed: {}", e)))?;

        sqlx::query(
            "INSERT INTO labels.met (timeseries, station_id, param_id, type_id, lvl, sensor) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(label.station_id)
        .bind(label.param_id)
        .bind(label.type_id)
        .bind(level)
        .bind(sensor)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Database(format!("Label insert failed: {}", e)))?;

        tx.commit().await?;
        debug!(label = %label, timeseries = id, "Created timeseries");
        Ok(id)
    }

    async fn copy_rows<R: CopyRow + Sync>(
        &self,
        conn: &mut PgConnection,
        rows: &[R],
    ) -> StorageResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let target = R::TARGET;
        let copy_err = |e: sqlx::Error| StorageError::Copy {
            table: target.table.to_string(),
            message: e.to_string(),
        };

        let payload = encode_rows(rows);
        let inserted = match self.conflict {
            ConflictPolicy::Strict => copy_into(conn, target.table, target.columns, &payload)
                .await
                .map_err(copy_err)?,
            ConflictPolicy::Skip => {
                let staging = format!("staging_{}", target.table.replace('.', "_"));
                sqlx::query(&format!(
                    "CREATE TEMP TABLE IF NOT EXISTS {staging} (LIKE {} INCLUDING DEFAULTS) ON COMMIT DROP",
                    target.table
                ))
                .execute(&mut *conn)
                .await
                .map_err(copy_err)?;

                copy_into(conn, &staging, target.columns, &payload)
                    .await
                    .map_err(copy_err)?;

                sqlx::query(&format!(
                    "INSERT INTO {table} ({columns}) SELECT {columns} FROM {staging} ON CONFLICT DO NOTHING",
                    table = target.table,
                    columns = target.columns,
                ))
                .execute(&mut *conn)
                .await
                .map_err(copy_err)?
                .rows_affected()
            }
        };

        let size = rows.len() as u64;
        if inserted != size {
            match self.conflict {
                ConflictPolicy::Skip => info!(
                    table = target.table,
                    inserted,
                    skipped = size.saturating_sub(inserted),
                    "Skipped rows already present"
                ),
                ConflictPolicy::Strict => warn!(
                    table = target.table,
                    inserted,
                    size,
                    "Inserted row count differs from batch size"
                ),
            }
        }

        Ok(inserted)
    }
}

async fn copy_into(
    conn: &mut PgConnection,
    table: &str,
    columns: &str,
    payload: &str,
) -> Result<u64, sqlx::Error> {
    let mut copy = conn
        .copy_in_raw(&format!("COPY {table} ({columns}) FROM STDIN"))
        .await?;
    copy.send(payload.as_bytes()).await?;
    copy.finish().await
}

#[async_trait]
impl Destination for DestStore {
    async fn resolve_or_create(
        &self,
        label: &Label,
        from_time: DateTime<Utc>,
        to_time: Option<DateTime<Utc>>,
    ) -> StorageResult<i32> {
        let mut conn = self.pool.acquire().await?;
        if let Some(id) = Self::lookup(&mut conn, label).await? {
            return Ok(id);
        }
        drop(conn);

        self.create(label, from_time, to_time).await
    }

    async fn insert_observations(
        &self,
        values: &[DestValueRow],
        texts: &[DestTextRow],
        flags: &[DestFlagRow],
    ) -> StorageResult<u64> {
        if values.is_empty() && texts.is_empty() && flags.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = self.copy_rows(&mut tx, values).await?;
        inserted += self.copy_rows(&mut tx, texts).await?;
        self.copy_rows(&mut tx, flags).await?;
        tx.commit().await?;

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sensor_level_tries_exact_pair_first() {
        let label = Label::new(18700, 501, 211, Some(0), Some(0));
        assert_eq!(
            label_candidates(&label),
            vec![(Some(0), Some(0)), (None, None)]
        );
    }

    #[test]
    fn test_other_labels_have_one_candidate() {
        let label = Label::new(18700, 501, 211, Some(1), Some(0));
        assert_eq!(label_candidates(&label), vec![(Some(1), Some(0))]);

        let text = Label::text(18700, 501, 1000);
        assert_eq!(label_candidates(&text), vec![(None, None)]);
    }
}
