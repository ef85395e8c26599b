//! Dump file codec.
//!
//! A dump file starts with a line holding the decimal record count, followed
//! by one delimited record per observation, ordered by obstime. The count is
//! only a sizing hint for readers.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::error::{ObsError, ObsResult};

/// A record that can be written to and read back from a dump file.
pub trait CsvRecord: Sized {
    /// Minimum number of fields a decodable record has.
    const MIN_FIELDS: usize;

    fn to_fields(&self) -> Vec<String>;

    fn from_fields(fields: &csv::StringRecord) -> ObsResult<Self>;
}

/// Writes a dump file: count line, then comma-separated records.
pub struct SeriesWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> SeriesWriter<W> {
    pub fn new(mut writer: W, count: usize) -> ObsResult<Self> {
        writeln!(writer, "{}", count)?;
        let inner = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        Ok(Self { inner })
    }

    pub fn write<T: CsvRecord>(&mut self, record: &T) -> ObsResult<()> {
        self.inner.write_record(record.to_fields())?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> ObsResult<W> {
        self.inner
            .into_inner()
            .map_err(|e| ObsError::Io(e.into_error()))
    }
}

/// Write `records` as a complete dump file into `writer`.
pub fn write_series<W: Write, T: CsvRecord>(writer: W, records: &[T]) -> ObsResult<W> {
    let mut series = SeriesWriter::new(writer, records.len())?;
    for record in records {
        series.write(record)?;
    }
    series.finish()
}

/// Reads a dump file.
pub struct SeriesReader<R: Read> {
    expected: usize,
    inner: csv::Reader<BufReader<R>>,
}

impl SeriesReader<File> {
    /// Open a dump file with the given field delimiter.
    ///
    /// With `has_header`, a column header line after the count line is skipped.
    pub fn open(path: &Path, delimiter: u8, has_header: bool) -> ObsResult<Self> {
        Self::from_reader(File::open(path)?, delimiter, has_header)
    }
}

impl<R: Read> SeriesReader<R> {
    pub fn from_reader(reader: R, delimiter: u8, has_header: bool) -> ObsResult<Self> {
        let mut buffered = BufReader::new(reader);

        let mut first = String::new();
        let expected = match buffered.read_line(&mut first)? {
            0 => 0,
            _ => first
                .trim()
                .parse()
                .map_err(|_| ObsError::InvalidCount(first.trim().to_string()))?,
        };

        let inner = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_header)
            .flexible(true)
            .from_reader(buffered);

        Ok(Self { expected, inner })
    }

    /// Record count announced on the first line.
    pub fn expected_count(&self) -> usize {
        self.expected
    }

    /// Iterate over the decoded records in file order.
    pub fn records<T: CsvRecord>(&mut self) -> impl Iterator<Item = ObsResult<T>> + '_ {
        self.inner
            .records()
            .map(|r| r.map_err(ObsError::from).and_then(|rec| T::from_fields(&rec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{QcdbTextRecord, RawObservation};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_write_series_layout() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap();
        let rows = vec![
            RawObservation::new(t, "12.3", "12345"),
            RawObservation::new(t + chrono::Duration::hours(1), "", ""),
        ];
        let out = write_series(Vec::new(), &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "2\n2020-01-01_06:00:00,12.3,12345\n2020-01-01_07:00:00,,\n"
        );
    }

    #[test]
    fn test_read_with_custom_delimiter() {
        let data = "1\n2020-01-01_06:00:00;12.3;12345\n";
        let mut reader = SeriesReader::from_reader(data.as_bytes(), b';', false).unwrap();
        assert_eq!(reader.expected_count(), 1);
        let rows: Vec<RawObservation> = reader.records().collect::<ObsResult<_>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "12.3");
    }

    #[test]
    fn test_read_skips_header_line() {
        let data = "1\ntime,data,flag\n2020-01-01_06:00:00,1,\n";
        let mut reader = SeriesReader::from_reader(data.as_bytes(), b',', true).unwrap();
        let rows: Vec<RawObservation> = reader.records().collect::<ObsResult<_>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].flag, "");
    }

    #[test]
    fn test_count_mismatch_is_not_an_error() {
        let data = "10\n2020-01-01_06:00:00,1,\n";
        let mut reader = SeriesReader::from_reader(data.as_bytes(), b',', false).unwrap();
        let rows: Vec<RawObservation> = reader.records().collect::<ObsResult<_>>().unwrap();
        assert_eq!(reader.expected_count(), 10);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_invalid_count_line() {
        let data = "time,data,flag\n";
        assert!(matches!(
            SeriesReader::from_reader(data.as_bytes(), b',', false),
            Err(ObsError::InvalidCount(_))
        ));
    }

    #[test]
    fn test_text_with_delimiter_is_quoted() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap();
        let rows = vec![QcdbTextRecord {
            obstime: t,
            original: "a,b".to_string(),
            tbtime: t,
        }];
        let out = write_series(Vec::new(), &rows).unwrap();
        let mut reader = SeriesReader::from_reader(out.as_slice(), b',', false).unwrap();
        let back: Vec<QcdbTextRecord> = reader.records().collect::<ObsResult<_>>().unwrap();
        assert_eq!(back[0].original, "a,b");
    }

    #[test]
    fn test_empty_file() {
        let mut reader = SeriesReader::from_reader("".as_bytes(), b',', false).unwrap();
        assert_eq!(reader.expected_count(), 0);
        assert_eq!(reader.records::<RawObservation>().count(), 0);
    }
}
