//! Source metadata catalog.
//!
//! The catalog is read once per run into a [`CatalogSnapshot`]; the connection
//! is closed as soon as the snapshot is taken.

use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::{Connection, PgConnection};
use std::time::Duration;
use tracing::{debug, info};

use obs_common::{ElementInfo, ElementKey, ParamPermit, StationPermit};

use crate::error::{StorageError, StorageResult};

const ELEMENT_MAP_SQL: &str = "SELECT elem_code, table_name, typeid, paramid, hlevel, sensor, fromtime, scalar \
     FROM elem_map_cfnames_param JOIN param USING(paramid)";

const PARAM_POLICY_SQL: &str =
    "SELECT stationid, message_formatid, paramid, permitid FROM v_station_param_policy";

const STATION_POLICY_SQL: &str = "SELECT stationid, permitid FROM station_policy";

const NON_SCALAR_SQL: &str = "SELECT paramid FROM param WHERE scalar = false";

type ElementRow = (
    String,
    String,
    i32,
    i32,
    Option<i32>,
    Option<i32>,
    Option<NaiveDateTime>,
    bool,
);

/// Everything the import needs from the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub elements: Vec<(ElementKey, ElementInfo)>,
    pub param_permits: Vec<ParamPermit>,
    pub station_permits: Vec<StationPermit>,
}

/// Short-lived catalog client.
pub struct Catalog {
    conn: PgConnection,
}

impl Catalog {
    /// Connect to the catalog, giving up after `timeout`.
    pub async fn connect(database_url: &str, timeout: Duration) -> StorageResult<Self> {
        let conn = tokio::time::timeout(timeout, PgConnection::connect(database_url))
            .await
            .map_err(|_| StorageError::Timeout("catalog".to_string()))?
            .map_err(|e| StorageError::Connection {
                target: "catalog".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { conn })
    }

    /// Fetch the element map and both permit tables, then close the connection.
    pub async fn snapshot(mut self) -> StorageResult<CatalogSnapshot> {
        let elements = self.fetch_elements().await?;
        let param_permits = self.fetch_param_permits().await?;
        let station_permits = self.fetch_station_permits().await?;

        info!(
            elements = elements.len(),
            param_permits = param_permits.len(),
            station_permits = station_permits.len(),
            "Loaded catalog snapshot"
        );

        self.close().await;
        Ok(CatalogSnapshot {
            elements,
            param_permits,
            station_permits,
        })
    }

    /// Params the catalog marks as non-scalar.
    pub async fn non_scalar_params(mut self) -> StorageResult<Vec<i32>> {
        let params = sqlx::query_scalar::<_, i32>(NON_SCALAR_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| StorageError::Database(format!("Non-scalar query failed: {}", e)))?;
        self.close().await;
        Ok(params)
    }

    async fn fetch_elements(&mut self) -> StorageResult<Vec<(ElementKey, ElementInfo)>> {
        let rows = sqlx::query_as::<_, ElementRow>(ELEMENT_MAP_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| StorageError::Database(format!("Element map query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(
                |(elem_code, table_name, type_id, param_id, level, sensor, from, is_scalar)| {
                    (
                        ElementKey::new(&table_name, &elem_code),
                        ElementInfo {
                            type_id,
                            param_id,
                            sensor,
                            level,
                            valid_from: from.map(|t| Utc.from_utc_datetime(&t)),
                            is_scalar,
                        },
                    )
                },
            )
            .collect())
    }

    async fn fetch_param_permits(&mut self) -> StorageResult<Vec<ParamPermit>> {
        let rows = sqlx::query_as::<_, (i32, i32, i32, i32)>(PARAM_POLICY_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| StorageError::Database(format!("Param policy query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(station_id, type_id, param_id, permit_id)| ParamPermit {
                station_id,
                type_id,
                param_id,
                permit_id,
            })
            .collect())
    }

    async fn fetch_station_permits(&mut self) -> StorageResult<Vec<StationPermit>> {
        let rows = sqlx::query_as::<_, (i32, i32)>(STATION_POLICY_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| StorageError::Database(format!("Station policy query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(station_id, permit_id)| StationPermit {
                station_id,
                permit_id,
            })
            .collect())
    }

    async fn close(self) {
        if let Err(e) = self.conn.close().await {
            debug!(error = %e, "Catalog connection did not close cleanly");
        }
    }
}
