//! Read-only metadata snapshot consulted by the import.
//!
//! Built once at the start of an import run from the catalog snapshot and the
//! source's own timespan metadata. Workers share it behind an `Arc` and only
//! ever read from it.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, instrument};

use obs_common::catalog::PERMIT_OPEN;
use obs_common::{
    AllowList, ElementInfo, ElementKey, ParamPermit, Period, SeriesTimespan, StationPermit,
};
use storage::{ArchSource, CatalogSnapshot, QcdbSource};

use crate::error::Result;
use crate::offsets::ProductOffsets;
use crate::tables::ArchTable;

#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    elements: HashMap<ElementKey, ElementInfo>,
    arch_spans: HashMap<(ElementKey, i32), SeriesTimespan>,
    qcdb_spans: HashMap<(i32, Option<i32>), SeriesTimespan>,
    offsets: ProductOffsets,
    param_permits: HashMap<i32, Vec<ParamPermit>>,
    station_permits: HashMap<i32, i32>,
}

impl MetadataCache {
    /// Index the catalog snapshot. Timespans and offsets start empty.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut cache = Self::default();
        for (key, info) in snapshot.elements {
            cache.elements.insert(key, info);
        }
        for permit in snapshot.param_permits {
            cache.insert_param_permit(permit);
        }
        for permit in snapshot.station_permits {
            cache.insert_station_permit(permit);
        }
        cache
    }

    /// Cache for an archive import: catalog, element-table timespans and offsets.
    #[instrument(skip_all, fields(tables = tables.len()))]
    pub async fn load_arch(
        snapshot: CatalogSnapshot,
        source: &dyn ArchSource,
        tables: &[&ArchTable],
        stations: &AllowList<i32>,
        elements: &AllowList<String>,
        offsets: ProductOffsets,
    ) -> Result<Self> {
        let mut cache = Self::from_snapshot(snapshot);
        cache.offsets = offsets;

        let elem_tables: BTreeSet<&str> = tables.iter().filter_map(|t| t.elem_table).collect();
        let elements: AllowList<String> = elements
            .values()
            .iter()
            .map(|e| e.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .into();

        for elem_table in elem_tables {
            for row in source.timespans(elem_table).await? {
                let key = ElementKey::new(&row.table_name, &row.element);
                if !stations.allows(&row.station) || !elements.allows(&key.element) {
                    continue;
                }
                cache.arch_spans.insert(
                    (key, row.station),
                    SeriesTimespan {
                        from: row.from,
                        to: row.to,
                    },
                );
            }
        }

        info!(
            elements = cache.elements.len(),
            timespans = cache.arch_spans.len(),
            offsets = cache.offsets.len(),
            "Cached archive metadata"
        );
        Ok(cache)
    }

    /// Cache for a QC store import: catalog and station metadata timespans.
    #[instrument(skip_all)]
    pub async fn load_qcdb(snapshot: CatalogSnapshot, source: &dyn QcdbSource) -> Result<Self> {
        let mut cache = Self::from_snapshot(snapshot);

        for row in source.timespans().await? {
            cache.insert_qcdb_timespan(
                row.station_id,
                row.param_id,
                SeriesTimespan {
                    from: row.from,
                    to: row.to,
                },
            );
        }

        info!(
            timespans = cache.qcdb_spans.len(),
            station_permits = cache.station_permits.len(),
            "Cached QC store metadata"
        );
        Ok(cache)
    }

    pub fn insert_element(&mut self, key: ElementKey, info: ElementInfo) {
        self.elements.insert(key, info);
    }

    pub fn insert_arch_timespan(&mut self, key: ElementKey, station: i32, span: SeriesTimespan) {
        self.arch_spans.insert((key, station), span);
    }

    pub fn insert_qcdb_timespan(&mut self, station: i32, param: Option<i32>, span: SeriesTimespan) {
        self.qcdb_spans.insert((station, param), span);
    }

    pub fn insert_param_permit(&mut self, permit: ParamPermit) {
        self.param_permits
            .entry(permit.station_id)
            .or_default()
            .push(permit);
    }

    pub fn insert_station_permit(&mut self, permit: StationPermit) {
        self.station_permits
            .insert(permit.station_id, permit.permit_id);
    }

    pub fn set_offsets(&mut self, offsets: ProductOffsets) {
        self.offsets = offsets;
    }

    pub fn element(&self, key: &ElementKey) -> Option<&ElementInfo> {
        self.elements.get(key)
    }

    /// Timespan of an archive series; unbounded when unknown.
    pub fn arch_timespan(&self, key: &ElementKey, station: i32) -> SeriesTimespan {
        self.arch_spans
            .get(&(key.clone(), station))
            .copied()
            .unwrap_or_default()
    }

    /// Timespan of a QC store series, falling back to the station-wide row.
    pub fn qcdb_timespan(&self, station: i32, param: i32) -> SeriesTimespan {
        self.qcdb_spans
            .get(&(station, Some(param)))
            .or_else(|| self.qcdb_spans.get(&(station, None)))
            .copied()
            .unwrap_or_default()
    }

    pub fn offset(&self, key: &ElementKey) -> Period {
        self.offsets.get(key)
    }

    /// Whether a series may be migrated.
    ///
    /// The first per-station override matching `(type, param)` decides; without
    /// one the station baseline applies. Unknown stations are closed.
    pub fn timeseries_is_open(&self, station: i32, type_id: i32, param_id: i32) -> bool {
        if let Some(permit) = self
            .param_permits
            .get(&station)
            .and_then(|permits| permits.iter().find(|p| p.matches(type_id, param_id)))
        {
            return permit.permit_id == PERMIT_OPEN;
        }

        self.station_permits.get(&station) == Some(&PERMIT_OPEN)
    }
}
