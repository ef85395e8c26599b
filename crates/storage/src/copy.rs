//! Encoding of destination rows for `COPY ... FROM STDIN` (text format).
//!
//! Fields are tab separated, rows newline terminated, NULL is `\N`, and
//! backslash, tab, newline and carriage return inside text are escaped.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::{Display, Write};

use obs_common::{DestFlagRow, DestTextRow, DestValueRow};

/// Destination relation receiving one kind of row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyTarget {
    pub table: &'static str,
    pub columns: &'static str,
}

pub const VALUE_TABLE: CopyTarget = CopyTarget {
    table: "public.data",
    columns: "timeseries, obstime, obsvalue",
};

pub const TEXT_TABLE: CopyTarget = CopyTarget {
    table: "public.nonscalar_data",
    columns: "timeseries, obstime, obsvalue",
};

pub const FLAG_TABLE: CopyTarget = CopyTarget {
    table: "flags.kvdata",
    columns: "timeseries, obstime, original, corrected, controlinfo, useinfo, cfailed",
};

/// A row that can be streamed through COPY.
pub trait CopyRow {
    const TARGET: CopyTarget;

    fn encode(&self, out: &mut String);
}

impl CopyRow for DestValueRow {
    const TARGET: CopyTarget = VALUE_TABLE;

    fn encode(&self, out: &mut String) {
        push_value(out, self.timeseries);
        out.push('\t');
        push_time(out, &self.obstime);
        out.push('\t');
        push_opt(out, self.value);
        out.push('\n');
    }
}

impl CopyRow for DestTextRow {
    const TARGET: CopyTarget = TEXT_TABLE;

    fn encode(&self, out: &mut String) {
        push_value(out, self.timeseries);
        out.push('\t');
        push_time(out, &self.obstime);
        out.push('\t');
        match &self.text {
            Some(text) => push_text(out, text),
            None => out.push_str("\\N"),
        }
        out.push('\n');
    }
}

impl CopyRow for DestFlagRow {
    const TARGET: CopyTarget = FLAG_TABLE;

    fn encode(&self, out: &mut String) {
        push_value(out, self.timeseries);
        out.push('\t');
        push_time(out, &self.obstime);
        out.push('\t');
        push_opt(out, self.original);
        out.push('\t');
        push_opt(out, self.corrected);
        out.push('\t');
        push_text(out, &self.controlinfo);
        out.push('\t');
        push_text(out, &self.useinfo);
        out.push('\t');
        match &self.cfailed {
            Some(cfailed) => push_text(out, cfailed),
            None => out.push_str("\\N"),
        }
        out.push('\n');
    }
}

/// Encode a whole batch.
pub fn encode_rows<R: CopyRow>(rows: &[R]) -> String {
    let mut out = String::with_capacity(rows.len() * 64);
    for row in rows {
        row.encode(&mut out);
    }
    out
}

fn push_value<T: Display>(out: &mut String, value: T) {
    let _ = write!(out, "{}", value);
}

fn push_opt<T: Display>(out: &mut String, value: Option<T>) {
    match value {
        Some(v) => push_value(out, v),
        None => out.push_str("\\N"),
    }
}

fn push_time(out: &mut String, t: &DateTime<Utc>) {
    out.push_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, false));
}

fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}
