//! MATLAB level-5 MAT-file encoding
//!
//! Layout of a file:
//!
//! ```text
//! 116 bytes descriptive text | 8 bytes subsystem offset | version 0x0100 | "IM"
//! data element*              (tag: type u32, byte count u32; data padded to 8)
//! ```
//!
//! Each variable is one `miMATRIX` element holding array flags, dimensions,
//! name and data. With compression enabled the whole `miMATRIX` element is
//! zlib-compressed into an `miCOMPRESSED` element. Only little-endian files are
//! read back.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{ConvertError, Result};

const HEADER_LEN: usize = 128;
const HEADER_TEXT_LEN: usize = 116;
const VERSION: u16 = 0x0100;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;

const MX_CELL_CLASS: u32 = 1;
const MX_CHAR_CLASS: u32 = 4;
const MX_DOUBLE_CLASS: u32 = 6;

const MAX_NESTING: usize = 32;

/// A MAT-file variable value
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    /// Real double array, column-major
    Double {
        /// Dimensions (rows, columns, ...)
        dims: Vec<usize>,
        /// Values in column-major order
        data: Vec<f64>,
    },
    /// Character row vector
    Char(String),
    /// Cell array, column-major
    Cell {
        /// Dimensions (rows, columns, ...)
        dims: Vec<usize>,
        /// Cells in column-major order
        cells: Vec<MatValue>,
    },
}

impl MatValue {
    /// 1 x n double row vector
    pub fn row_vector(data: Vec<f64>) -> Self {
        MatValue::Double {
            dims: vec![1, data.len()],
            data,
        }
    }

    /// rows x columns double matrix from row-major rows
    pub fn matrix(rows: &[Vec<f64>], columns: usize) -> Self {
        let mut data = Vec::with_capacity(rows.len() * columns);
        for c in 0..columns {
            data.extend(rows.iter().map(|row| row.get(c).copied().unwrap_or(f64::NAN)));
        }
        MatValue::Double {
            dims: vec![rows.len(), columns],
            data,
        }
    }

    /// rows x columns cell array of character rows
    pub fn string_table(rows: &[Vec<String>]) -> Self {
        let columns = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(rows.len() * columns);
        for c in 0..columns {
            cells.extend(
                rows.iter()
                    .map(|row| MatValue::Char(row.get(c).cloned().unwrap_or_default())),
            );
        }
        MatValue::Cell {
            dims: vec![rows.len(), columns],
            cells,
        }
    }

    /// Dimensions of the value
    pub fn dims(&self) -> Vec<usize> {
        match self {
            MatValue::Double { dims, .. } | MatValue::Cell { dims, .. } => dims.clone(),
            MatValue::Char(s) => vec![1, s.encode_utf16().count()],
        }
    }

    /// Row-major rows of a 2-D double array
    pub fn to_rows(&self) -> Option<Vec<Vec<f64>>> {
        match self {
            MatValue::Double { dims, data } => Some(column_major_rows(dims, data)),
            _ => None,
        }
    }

    /// Row-major rows of a 2-D cell array of character rows
    pub fn to_string_rows(&self) -> Option<Vec<Vec<String>>> {
        match self {
            MatValue::Cell { dims, cells } => {
                let strings = cells
                    .iter()
                    .map(|cell| match cell {
                        MatValue::Char(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(column_major_rows(dims, &strings))
            }
            _ => None,
        }
    }
}

fn column_major_rows<T: Clone>(dims: &[usize], data: &[T]) -> Vec<Vec<T>> {
    let rows = dims.first().copied().unwrap_or(0);
    if rows == 0 {
        return Vec::new();
    }
    let columns = data.len() / rows;
    (0..rows)
        .map(|r| (0..columns).map(|c| data[c * rows + r].clone()).collect())
        .collect()
}

fn invalid(message: impl Into<String>) -> ConvertError {
    ConvertError::InvalidArtifact(message.into())
}

// ============================================================================
// Writing
// ============================================================================

fn header_text() -> String {
    format!(
        "MATLAB 5.0 MAT-file, Platform: {}, Created on: {}",
        std::env::consts::OS,
        chrono::Local::now().format("%a %b %e %H:%M:%S %Y")
    )
}

fn pad8(out: &mut Vec<u8>) {
    while out.len() % 8 != 0 {
        out.push(0);
    }
}

fn put_element(out: &mut Vec<u8>, mi_type: u32, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| invalid("MAT element exceeds 4 GiB"))?;
    out.write_u32::<LittleEndian>(mi_type)?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(data);
    pad8(out);
    Ok(())
}

fn encode_matrix(name: &str, value: &MatValue) -> Result<Vec<u8>> {
    let mut body = Vec::new();

    let class = match value {
        MatValue::Double { .. } => MX_DOUBLE_CLASS,
        MatValue::Char(_) => MX_CHAR_CLASS,
        MatValue::Cell { .. } => MX_CELL_CLASS,
    };
    let mut flags = Vec::with_capacity(8);
    flags.write_u32::<LittleEndian>(class)?;
    flags.write_u32::<LittleEndian>(0)?;
    put_element(&mut body, MI_UINT32, &flags)?;

    let mut dims = Vec::new();
    for d in value.dims() {
        let d = i32::try_from(d).map_err(|_| invalid("MAT dimension exceeds i32"))?;
        dims.write_i32::<LittleEndian>(d)?;
    }
    put_element(&mut body, MI_INT32, &dims)?;

    put_element(&mut body, MI_INT8, name.as_bytes())?;

    match value {
        MatValue::Double { data, .. } => {
            let mut bytes = Vec::with_capacity(data.len() * 8);
            for v in data {
                bytes.write_f64::<LittleEndian>(*v)?;
            }
            put_element(&mut body, MI_DOUBLE, &bytes)?;
        }
        MatValue::Char(text) => {
            let mut bytes = Vec::new();
            for unit in text.encode_utf16() {
                bytes.write_u16::<LittleEndian>(unit)?;
            }
            put_element(&mut body, MI_UINT16, &bytes)?;
        }
        MatValue::Cell { cells, .. } => {
            for cell in cells {
                body.extend(encode_matrix("", cell)?);
            }
        }
    }

    let mut element = Vec::with_capacity(body.len() + 8);
    put_element(&mut element, MI_MATRIX, &body)?;
    Ok(element)
}

/// Write named variables as a little-endian level-5 MAT-file
pub fn write_mat<W: Write>(
    writer: &mut W,
    variables: &[(&str, MatValue)],
    compress: bool,
) -> Result<()> {
    let mut header = header_text().into_bytes();
    header.resize(HEADER_TEXT_LEN, b' ');
    header.extend_from_slice(&[0u8; 8]);
    header.write_u16::<LittleEndian>(VERSION)?;
    header.extend_from_slice(b"IM");
    writer.write_all(&header)?;

    for (name, value) in variables {
        let element = encode_matrix(name, value)?;
        if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&element)?;
            let compressed = encoder.finish()?;
            let len = u32::try_from(compressed.len())
                .map_err(|_| invalid("MAT element exceeds 4 GiB"))?;
            writer.write_u32::<LittleEndian>(MI_COMPRESSED)?;
            writer.write_u32::<LittleEndian>(len)?;
            writer.write_all(&compressed)?;
        } else {
            writer.write_all(&element)?;
        }
    }

    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

/// A decoded element tag
struct Tag {
    mi_type: u32,
    start: usize,
    end: usize,
    next: usize,
}

fn read_tag(buf: &[u8], pos: usize) -> Result<Tag> {
    let word = |at: usize| -> Result<u32> {
        buf.get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| invalid("truncated MAT element tag"))
    };

    let first = word(pos)?;
    let (mi_type, start, len, next) = if first >> 16 != 0 {
        // Small data element: type and size packed into one word
        let len = (first >> 16) as usize;
        (first & 0xFFFF, pos + 4, len, pos + 8)
    } else {
        let len = word(pos + 4)? as usize;
        let start = pos + 8;
        let next = if first == MI_COMPRESSED {
            start + len
        } else {
            start + len.div_ceil(8) * 8
        };
        (first, start, len, next)
    };

    let end = start + len;
    if end > buf.len() {
        return Err(invalid("MAT element runs past the end of the data"));
    }

    Ok(Tag {
        mi_type,
        start,
        end,
        next: next.min(buf.len()),
    })
}

fn numeric_to_f64(mi_type: u32, bytes: &[u8]) -> Result<Vec<f64>> {
    let width = match mi_type {
        MI_DOUBLE => 8,
        MI_SINGLE | MI_INT32 | MI_UINT32 => 4,
        MI_INT16 | MI_UINT16 => 2,
        MI_INT8 | MI_UINT8 => 1,
        other => return Err(invalid(format!("unsupported numeric type {other}"))),
    };

    Ok(bytes
        .chunks_exact(width)
        .map(|c| match mi_type {
            MI_DOUBLE => LittleEndian::read_f64(c),
            MI_SINGLE => f64::from(LittleEndian::read_f32(c)),
            MI_INT32 => f64::from(LittleEndian::read_i32(c)),
            MI_UINT32 => f64::from(LittleEndian::read_u32(c)),
            MI_INT16 => f64::from(LittleEndian::read_i16(c)),
            MI_UINT16 => f64::from(LittleEndian::read_u16(c)),
            MI_INT8 => f64::from(c[0] as i8),
            _ => f64::from(c[0]),
        })
        .collect())
}

fn decode_text(mi_type: u32, bytes: &[u8]) -> Result<String> {
    match mi_type {
        MI_UINT16 | MI_UTF16 => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| invalid("bad UTF-16 text"))
        }
        MI_UTF8 | MI_UINT8 | MI_INT8 => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(invalid(format!("unsupported character type {other}"))),
    }
}

fn parse_matrix(body: &[u8], depth: usize) -> Result<(String, MatValue)> {
    if depth > MAX_NESTING {
        return Err(invalid("MAT cells nested too deeply"));
    }

    let flags = read_tag(body, 0)?;
    let flag_bytes = &body[flags.start..flags.end];
    let class = flag_bytes.first().copied().map(u32::from).unwrap_or(0);

    let dims_tag = read_tag(body, flags.next)?;
    let dims = body[dims_tag.start..dims_tag.end]
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]).max(0) as usize)
        .collect::<Vec<_>>();

    let name_tag = read_tag(body, dims_tag.next)?;
    let name = String::from_utf8_lossy(&body[name_tag.start..name_tag.end]).into_owned();
    let mut pos = name_tag.next;

    let value = match class {
        MX_DOUBLE_CLASS => {
            let data = if pos < body.len() {
                let real = read_tag(body, pos)?;
                numeric_to_f64(real.mi_type, &body[real.start..real.end])?
            } else {
                Vec::new()
            };
            MatValue::Double { dims, data }
        }
        MX_CHAR_CLASS => {
            let text = if pos < body.len() {
                let tag = read_tag(body, pos)?;
                decode_text(tag.mi_type, &body[tag.start..tag.end])?
            } else {
                String::new()
            };
            MatValue::Char(text)
        }
        MX_CELL_CLASS => {
            let count = dims
                .iter()
                .try_fold(1usize, |acc, d| acc.checked_mul(*d))
                .ok_or_else(|| invalid("cell dimensions overflow"))?;
            let mut cells = Vec::with_capacity(count.min(body.len() / 8));
            for _ in 0..count {
                let tag = read_tag(body, pos)?;
                if tag.mi_type != MI_MATRIX {
                    return Err(invalid("cell element is not a matrix"));
                }
                cells.push(parse_matrix(&body[tag.start..tag.end], depth + 1)?.1);
                pos = tag.next;
            }
            MatValue::Cell { dims, cells }
        }
        other => return Err(invalid(format!("unsupported MAT class {other}"))),
    };

    Ok((name, value))
}

fn parse_elements(
    buf: &[u8],
    depth: usize,
    variables: &mut Vec<(String, MatValue)>,
) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(invalid("MAT elements nested too deeply"));
    }

    let mut pos = 0;
    while pos + 8 <= buf.len() {
        let tag = read_tag(buf, pos)?;
        match tag.mi_type {
            MI_MATRIX => variables.push(parse_matrix(&buf[tag.start..tag.end], 0)?),
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(&buf[tag.start..tag.end]).read_to_end(&mut inflated)?;
                parse_elements(&inflated, depth + 1, variables)?;
            }
            _ => {}
        }
        pos = tag.next;
    }
    Ok(())
}

/// Read all supported variables of a little-endian level-5 MAT-file, in file order
pub fn read_mat<R: Read>(reader: &mut R) -> Result<Vec<(String, MatValue)>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;

    if buf.len() < HEADER_LEN {
        return Err(invalid("MAT header truncated"));
    }
    match &buf[126..128] {
        b"IM" => {}
        b"MI" => return Err(invalid("big-endian MAT-files are not supported")),
        _ => return Err(invalid("not a level-5 MAT-file")),
    }

    let mut variables = Vec::new();
    parse_elements(&buf[HEADER_LEN..], 0, &mut variables)?;
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(variables: &[(&str, MatValue)], compress: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        write_mat(&mut buf, variables, compress).unwrap();
        buf
    }

    #[test]
    fn test_header_layout() {
        let buf = encode(&[], false);
        assert_eq!(buf.len(), HEADER_LEN);
        assert!(buf.starts_with(b"MATLAB 5.0 MAT-file"));
        assert_eq!(&buf[124..126], &[0x00, 0x01]);
        assert_eq!(&buf[126..128], b"IM");
    }

    #[test]
    fn test_elements_are_8_byte_aligned() {
        let buf = encode(&[("x", MatValue::row_vector(vec![1.0, 2.0, 3.0]))], false);
        assert_eq!((buf.len() - HEADER_LEN) % 8, 0);
        assert_eq!(
            u32::from_le_bytes([buf[128], buf[129], buf[130], buf[131]]),
            MI_MATRIX
        );
    }

    #[test]
    fn test_matrix_is_column_major() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        match MatValue::matrix(&rows, 3) {
            MatValue::Double { dims, data } => {
                assert_eq!(dims, vec![2, 3]);
                assert_eq!(data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_all_classes() {
        let rows = vec![vec![0.1, f64::MIN_POSITIVE, -3.5], vec![1e300, 2.0, f64::NAN]];
        let labels = vec![
            vec!["A_1".to_string(), "A".to_string()],
            vec!["µ-sample".to_string(), "Empty".to_string()],
        ];
        let variables = [
            ("wavenumbers", MatValue::row_vector(vec![4000.0, 3999.0, 3998.0])),
            ("markup", MatValue::string_table(&labels)),
            ("spectra", MatValue::matrix(&rows, 3)),
        ];

        for compress in [false, true] {
            let buf = encode(&variables, compress);
            let back = read_mat(&mut buf.as_slice()).unwrap();

            assert_eq!(back.len(), 3);
            assert_eq!(back[0].0, "wavenumbers");
            assert_eq!(back[0].1, variables[0].1);
            assert_eq!(back[1].1.to_string_rows().unwrap(), labels);

            let spectra = back[2].1.to_rows().unwrap();
            for (a, b) in spectra.iter().flatten().zip(rows.iter().flatten()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_reads_small_data_elements() {
        // Name "ab" stored in the packed small-element form, as MATLAB does
        let mut body = Vec::new();
        put_element(&mut body, MI_UINT32, &[MX_DOUBLE_CLASS as u8, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        put_element(&mut body, MI_INT32, &[1, 0, 0, 0, 1, 0, 0, 0]).unwrap();
        body.extend_from_slice(&((2u32 << 16) | MI_INT8).to_le_bytes());
        body.extend_from_slice(b"ab\0\0");
        put_element(&mut body, MI_DOUBLE, &7.5f64.to_le_bytes()).unwrap();

        let mut file = encode(&[], false);
        put_element(&mut file, MI_MATRIX, &body).unwrap();

        let back = read_mat(&mut file.as_slice()).unwrap();
        assert_eq!(back[0].0, "ab");
        assert_eq!(back[0].1.to_rows().unwrap(), vec![vec![7.5]]);
    }

    #[test]
    fn test_rejects_non_mat_data() {
        assert!(read_mat(&mut &b"short"[..]).is_err());
        assert!(read_mat(&mut &[0u8; 200][..]).is_err());
    }
}
