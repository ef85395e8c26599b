//! Diagnostics over the QC store label manifests.
//!
//! The `data` and `text` families are dumped and imported independently. These
//! checks report where the two disagree without reconciling anything.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use obs_common::Label;

use crate::error::Result;
use crate::manifest::{qcdb_manifest_path, read_manifest};
use crate::tables::{QcdbDb, QcdbTable};

/// A label without sensor and level.
pub type SeriesTriple = (i32, i32, i32);

fn triple(label: &Label) -> SeriesTriple {
    (label.station_id, label.type_id, label.param_id)
}

/// Load the data and text manifests of `db` from a dump tree.
pub fn load_family_manifests(root: &Path, db: QcdbDb) -> Result<(Vec<Label>, Vec<Label>)> {
    let data = read_manifest(&qcdb_manifest_path(root, db, QcdbTable::Data))?;
    let text = read_manifest(&qcdb_manifest_path(root, db, QcdbTable::Text))?;
    Ok((data, text))
}

/// `(station, type, param)` triples present in both families, sorted.
pub fn overlap(data: &[Label], text: &[Label]) -> Vec<SeriesTriple> {
    let text: HashSet<SeriesTriple> = text.iter().map(triple).collect();
    data.iter()
        .map(triple)
        .filter(|t| text.contains(t))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Params found in the wrong family for their scalar flag.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScalarMismatch {
    /// Non-scalar params dumped as numeric data.
    pub non_scalar_in_data: Vec<i32>,
    /// Scalar params dumped as text.
    pub scalar_in_text: Vec<i32>,
}

impl ScalarMismatch {
    pub fn is_empty(&self) -> bool {
        self.non_scalar_in_data.is_empty() && self.scalar_in_text.is_empty()
    }
}

/// Compare the manifests against the catalog's non-scalar params.
pub fn scalar_mismatches(data: &[Label], text: &[Label], non_scalar: &[i32]) -> ScalarMismatch {
    let non_scalar: HashSet<i32> = non_scalar.iter().copied().collect();

    let non_scalar_in_data: BTreeSet<i32> = data
        .iter()
        .map(|l| l.param_id)
        .filter(|p| non_scalar.contains(p))
        .collect();
    let scalar_in_text: BTreeSet<i32> = text
        .iter()
        .map(|l| l.param_id)
        .filter(|p| !non_scalar.contains(p))
        .collect();

    ScalarMismatch {
        non_scalar_in_data: non_scalar_in_data.into_iter().collect(),
        scalar_in_text: scalar_in_text.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::write_manifest;

    fn data(station: i32, type_id: i32, param: i32, sensor: i32) -> Label {
        Label::new(station, type_id, param, Some(sensor), Some(0))
    }

    #[test]
    fn test_overlap_ignores_sensor_and_level() {
        let data = vec![
            data(18700, 501, 211, 0),
            data(18700, 501, 211, 1),
            data(18700, 501, 178, 0),
        ];
        let text = vec![Label::text(18700, 501, 211), Label::text(18700, 502, 178)];

        assert_eq!(overlap(&data, &text), vec![(18700, 501, 211)]);
    }

    #[test]
    fn test_scalar_mismatches() {
        let data = vec![data(1, 501, 211, 0), data(1, 501, 1000, 0), data(2, 501, 1000, 0)];
        let text = vec![Label::text(1, 501, 1000), Label::text(1, 501, 178)];

        let report = scalar_mismatches(&data, &text, &[1000, 1001]);
        assert_eq!(report.non_scalar_in_data, vec![1000]);
        assert_eq!(report.scalar_in_text, vec![178]);
        assert!(!report.is_empty());

        assert!(scalar_mismatches(&[], &[], &[1000]).is_empty());
    }

    #[test]
    fn test_load_family_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec![data(18700, 501, 211, 0)];
        write_manifest(
            &qcdb_manifest_path(dir.path(), QcdbDb::Historical, QcdbTable::Data),
            &labels,
        )
        .unwrap();
        write_manifest(
            &qcdb_manifest_path(dir.path(), QcdbDb::Historical, QcdbTable::Text),
            &[Label::text(18700, 501, 1000)],
        )
        .unwrap();

        let (data, text) = load_family_manifests(dir.path(), QcdbDb::Historical).unwrap();
        assert_eq!(data, labels);
        assert_eq!(text, vec![Label::text(18700, 501, 1000)]);

        assert!(load_family_manifests(dir.path(), QcdbDb::Live).is_err());
    }
}
