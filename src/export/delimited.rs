//! Comma-delimited text output
//!
//! Floats are written in their shortest round-trip form, so parsing the text
//! back yields the exact values that were written.

use std::io::Write;

use crate::aggregate::Batch;
use crate::error::Result;
use crate::markup::MarkupTable;

/// Shortest representation that parses back to the same `f64`
pub fn format_float(value: f64) -> String {
    format!("{value:?}")
}

/// Markup columns followed by one column per wavenumber, with a header row
pub fn write_joined<W: Write>(writer: W, markup: &MarkupTable, batch: &Batch) -> Result<()> {
    let mut out = ::csv::Writer::from_writer(writer);

    let header = markup
        .column_names()
        .into_iter()
        .chain(batch.axis.iter().map(|v| format_float(*v)));
    out.write_record(header)?;

    for (labels, values) in markup.rows().iter().zip(&batch.values) {
        let record = labels
            .iter()
            .cloned()
            .chain(values.iter().map(|v| format_float(*v)));
        out.write_record(record)?;
    }

    out.flush()?;
    Ok(())
}

/// One wavenumber per line
pub fn write_axis<W: Write>(writer: W, axis: &[f64]) -> Result<()> {
    let mut out = ::csv::Writer::from_writer(writer);
    for value in axis {
        out.write_record([format_float(*value)])?;
    }
    out.flush()?;
    Ok(())
}

/// One markup row per line, no header
pub fn write_markup<W: Write>(writer: W, markup: &MarkupTable) -> Result<()> {
    let mut out = ::csv::Writer::from_writer(writer);
    for row in markup.rows() {
        out.write_record(row)?;
    }
    out.flush()?;
    Ok(())
}

/// One spectrum per line, no header
pub fn write_matrix<W: Write>(writer: W, rows: &[Vec<f64>]) -> Result<()> {
    let mut out = ::csv::Writer::from_writer(writer);
    for row in rows {
        out.write_record(row.iter().map(|v| format_float(*v)))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_round_trips() {
        for value in [4000.0, 3999.64, 0.1, -2.25, 1e-7, 1.0 / 3.0, f64::MAX] {
            let text = format_float(value);
            assert_eq!(text.parse::<f64>().unwrap(), value, "{text}");
        }
        assert_eq!(format_float(4000.0), "4000.0");
    }

    #[test]
    fn test_markup_cells_are_quoted_when_needed() {
        let mut buf = Vec::new();
        let options = crate::markup::MarkupOptions::default();
        let table = crate::markup::MarkupBuilder::new(&options)
            .build_from_names(std::path::Path::new("."), &["a,b".to_string()])
            .unwrap();
        write_markup(&mut buf, &table).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "\"a,b\"\n");
    }

    #[test]
    fn test_empty_axis_writes_nothing() {
        let mut buf = Vec::new();
        write_axis(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }
}
