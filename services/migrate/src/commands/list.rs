//! `migrate list`: the archive table registry and the QC store families.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use migration::{ArchTable, QcdbDb, QcdbTable};

pub fn run() {
    println!("{}", arch_table());
    println!("{}", qcdb_table());
}

fn arch_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "Table",
            "Flag table",
            "Element table",
            "Dump",
            "Conversion",
            "Import until",
        ]);

    for t in ArchTable::all() {
        table.add_row(vec![
            t.name.to_string(),
            t.flag_table.unwrap_or("-").to_string(),
            t.elem_table.unwrap_or("-").to_string(),
            t.dump.to_string(),
            t.convert.to_string(),
            t.import_until
                .map(|year| year.to_string())
                .unwrap_or_else(|| "dump only".to_string()),
        ]);
    }
    table
}

fn qcdb_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["QC store", "Family", "Manifest"]);

    for db in QcdbDb::ALL {
        for family in QcdbTable::ALL {
            table.add_row(vec![
                db.dir_name().to_string(),
                family.name().to_string(),
                format!("{}/{}/{}", db.dir_name(), family.name(), family.manifest_name()),
            ]);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_table_lists_every_table() {
        let rendered = arch_table().to_string();
        for t in ArchTable::all() {
            assert!(rendered.contains(t.name), "{} missing", t.name);
        }
        assert!(rendered.contains("dump only"));
    }

    #[test]
    fn test_qcdb_table_lists_both_instances() {
        let rendered = qcdb_table().to_string();
        assert!(rendered.contains("qcdb_hist"));
        assert!(rendered.contains("text_labels.csv"));
    }
}
