//! Registry of archive (ARCH) tables.
//!
//! Every archive data table is described by an [`ArchTable`]: its companion
//! flag and element tables, how it is dumped, which conversion rule applies
//! on import, and the year from which its data is superseded by the QC store.

use std::fmt;

use storage::StationSource;

/// How a table's series are selected during the dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStrategy {
    /// Full outer join of the data and flag tables.
    DataAndFlags,
    /// Data table only; flags are written empty.
    DataOnly,
    /// Like `DataAndFlags`, one file per calendar year.
    ByYear,
    /// Data only, restricted to calendar-month seasons and a fixed element set.
    HomogenMonth,
}

/// How raw archive observations are converted on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertRule {
    Default,
    Product,
    Edata,
    Pdata,
    Ndata,
    Vdata,
    DiurnalInterpolated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchTable {
    pub name: &'static str,
    pub flag_table: Option<&'static str>,
    pub elem_table: Option<&'static str>,
    pub dump: DumpStrategy,
    pub convert: ConvertRule,
    /// First year that is not imported; `None` for dump-only tables.
    pub import_until: Option<i32>,
}

/// Element tables shared by several data tables, keyed by `table_name`.
const SHARED_ELEM_TABLES: [&str; 2] = ["T_ELEM_OBS", "T_ELEM_HOMOGEN_MONTH"];

/// The only elements of the homogenized monthly table.
const HOMOGEN_MONTH_ELEMENTS: [&str; 2] = ["rr", "tam"];

const fn table(
    name: &'static str,
    flag_table: Option<&'static str>,
    elem_table: Option<&'static str>,
    dump: DumpStrategy,
    convert: ConvertRule,
    import_until: Option<i32>,
) -> ArchTable {
    ArchTable {
        name,
        flag_table,
        elem_table,
        dump,
        convert,
        import_until,
    }
}

use ConvertRule as C;
use DumpStrategy as D;

/// All known archive tables.
pub const ARCH_TABLES: [ArchTable; 24] = [
    // Section 1: hourly and metar data, imported in full
    table("T_EDATA", Some("T_EFLAG"), Some("T_ELEM_EDATA"), D::DataAndFlags, C::Edata, Some(3000)),
    table("T_METARDATA", None, Some("T_ELEM_METARDATA"), D::DataOnly, C::Default, Some(3000)),
    // Section 2: synoptic data, superseded by the QC store from 2006
    table("T_ADATA", Some("T_AFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, Some(2006)),
    table("T_MDATA", Some("T_MFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, Some(2006)),
    table("T_TJ_DATA", Some("T_TJ_FLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, Some(2006)),
    table("T_PDATA", Some("T_PFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Pdata, Some(2006)),
    table("T_NDATA", Some("T_NFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Ndata, Some(2006)),
    table("T_VDATA", Some("T_VFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Vdata, Some(2006)),
    table("T_UTLANDDATA", Some("T_UTLANDFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, Some(2006)),
    // Section 3: dump only
    table("T_ADATA_LEVEL", Some("T_AFLAG_LEVEL"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, None),
    table("T_MINUTE_DATA", Some("T_MINUTE_FLAG"), Some("T_ELEM_OBS"), D::ByYear, C::Default, None),
    table("T_10MINUTE_DATA", Some("T_10MINUTE_FLAG"), Some("T_ELEM_OBS"), D::ByYear, C::Default, None),
    table("T_SECOND_DATA", Some("T_SECOND_FLAG"), Some("T_ELEM_OBS"), D::ByYear, C::Default, None),
    table("T_CDCV_DATA", Some("T_CDCV_FLAG"), Some("T_ELEM_EDATA"), D::DataAndFlags, C::Default, None),
    table("T_MERMAID", Some("T_MERMAID_FLAG"), Some("T_ELEM_EDATA"), D::DataAndFlags, C::Default, None),
    table("T_SVVDATA", Some("T_SVVFLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, None),
    table("T_AVINOR", Some("T_AVINOR_FLAG"), Some("T_ELEM_OBS"), D::DataAndFlags, C::Default, None),
    // Section 4: products
    table("T_MONTH", Some("T_MONTH_FLAG"), Some("T_ELEM_MONTH"), D::DataAndFlags, C::Product, Some(1957)),
    table("T_DIURNAL", Some("T_DIURNAL_FLAG"), Some("T_ELEM_DIURNAL"), D::DataAndFlags, C::Product, Some(2006)),
    table("T_HOMOGEN_DIURNAL", None, Some("T_ELEM_HOMOGEN_MONTH"), D::DataOnly, C::Product, None),
    table("T_HOMOGEN_MONTH", None, Some("T_ELEM_HOMOGEN_MONTH"), D::HomogenMonth, C::Product, None),
    // Section 5: projections and interpolated products
    table("T_PROJDATA", Some("T_PROJFLAG"), Some("T_ELEM_PROJ"), D::DataAndFlags, C::Default, None),
    table("T_DIURNAL_INTERPOLATED", None, None, D::DataOnly, C::DiurnalInterpolated, None),
    table("T_MONTH_INTERPOLATED", None, None, D::DataOnly, C::Default, None),
];

impl ArchTable {
    pub fn all() -> &'static [ArchTable] {
        &ARCH_TABLES
    }

    /// Case-insensitive lookup by table name.
    pub fn find(name: &str) -> Option<&'static ArchTable> {
        ARCH_TABLES
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn should_import(&self) -> bool {
        self.import_until.is_some()
    }

    pub fn import_until_reached(&self, year: i32) -> bool {
        self.import_until.is_some_and(|until| year >= until)
    }

    /// Flag table joined during the dump, if the strategy uses one.
    pub fn dump_flag_table(&self) -> Option<&'static str> {
        match self.dump {
            DumpStrategy::DataAndFlags | DumpStrategy::ByYear => self.flag_table,
            DumpStrategy::DataOnly | DumpStrategy::HomogenMonth => None,
        }
    }

    pub fn station_source(&self) -> StationSource<'static> {
        match self.elem_table {
            Some(elem_table) if SHARED_ELEM_TABLES.contains(&elem_table) => {
                StationSource::SharedElemTable {
                    elem_table,
                    table_name: self.name,
                }
            }
            Some(elem_table) => StationSource::ElemTable(elem_table),
            None => StationSource::DataTable(self.name),
        }
    }

    /// Elements dumped regardless of the table's columns.
    pub fn fixed_elements(&self) -> Option<&'static [&'static str]> {
        match self.dump {
            DumpStrategy::HomogenMonth => Some(&HOMOGEN_MONTH_ELEMENTS),
            _ => None,
        }
    }
}

impl fmt::Display for ArchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for DumpStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DumpStrategy::DataAndFlags => "data+flags",
            DumpStrategy::DataOnly => "data only",
            DumpStrategy::ByYear => "by year",
            DumpStrategy::HomogenMonth => "homogen month",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ConvertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvertRule::Default => "default",
            ConvertRule::Product => "product",
            ConvertRule::Edata => "edata",
            ConvertRule::Pdata => "pdata",
            ConvertRule::Ndata => "ndata",
            ConvertRule::Vdata => "vdata",
            ConvertRule::DiurnalInterpolated => "diurnal interpolated",
        };
        f.write_str(name)
    }
}
