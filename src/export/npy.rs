//! NumPy `.npy` (format version 1.0) encoding
//!
//! ```text
//! \x93NUMPY | major | minor | header_len u16 LE | dict literal, space padded, '\n' | data
//! ```
//!
//! The preamble plus header is padded to a multiple of 64 bytes. Numbers are
//! stored as `<f8`, strings as fixed-width UTF-32 (`<U{n}`), both in C order.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{ConvertError, Result};

/// File signature
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

const ALIGNMENT: usize = 64;

const MAX_HEADER_LEN: usize = 1 << 16;

const MAX_PREALLOC: usize = 1 << 20;

/// An n-dimensional array as stored in an `.npy` file
#[derive(Debug, Clone, PartialEq)]
pub enum NpyArray {
    /// `<f8` values
    Float64 {
        /// Dimensions, outermost first
        shape: Vec<usize>,
        /// Values in C order
        data: Vec<f64>,
    },
    /// `<U{n}` strings
    Unicode {
        /// Dimensions, outermost first
        shape: Vec<usize>,
        /// Strings in C order
        data: Vec<String>,
    },
}

impl NpyArray {
    /// 1-D float array
    pub fn vector(data: Vec<f64>) -> Self {
        NpyArray::Float64 {
            shape: vec![data.len()],
            data,
        }
    }

    /// 2-D float array from equally long rows
    pub fn matrix(rows: &[Vec<f64>], columns: usize) -> Self {
        NpyArray::Float64 {
            shape: vec![rows.len(), columns],
            data: rows.iter().flatten().copied().collect(),
        }
    }

    /// 2-D string array from equally long rows
    pub fn strings(rows: &[Vec<String>]) -> Self {
        let columns = rows.first().map_or(0, Vec::len);
        NpyArray::Unicode {
            shape: vec![rows.len(), columns],
            data: rows.iter().flatten().cloned().collect(),
        }
    }

    /// Array dimensions
    pub fn shape(&self) -> &[usize] {
        match self {
            NpyArray::Float64 { shape, .. } | NpyArray::Unicode { shape, .. } => shape,
        }
    }

    /// NumPy dtype descriptor
    pub fn descr(&self) -> String {
        match self {
            NpyArray::Float64 { .. } => "<f8".to_string(),
            NpyArray::Unicode { data, .. } => format!("<U{}", unicode_width(data)),
        }
    }

    /// Float data split into rows (a 1-D array is one row)
    pub fn to_rows(&self) -> Option<Vec<Vec<f64>>> {
        match self {
            NpyArray::Float64 { shape, data } => Some(split_rows(shape, data)),
            NpyArray::Unicode { .. } => None,
        }
    }

    /// String data split into rows (a 1-D array is one row)
    pub fn to_string_rows(&self) -> Option<Vec<Vec<String>>> {
        match self {
            NpyArray::Unicode { shape, data } => Some(split_rows(shape, data)),
            NpyArray::Float64 { .. } => None,
        }
    }
}

fn split_rows<T: Clone>(shape: &[usize], data: &[T]) -> Vec<Vec<T>> {
    match shape {
        [_, columns] if *columns > 0 => data.chunks(*columns).map(<[T]>::to_vec).collect(),
        [rows, _] => vec![Vec::new(); *rows],
        _ => vec![data.to_vec()],
    }
}

fn unicode_width(data: &[String]) -> usize {
    data.iter().map(|s| s.chars().count()).max().unwrap_or(0).max(1)
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Encode `array` as a version 1.0 `.npy` stream
pub fn write_npy<W: Write>(writer: &mut W, array: &NpyArray) -> io::Result<()> {
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        array.descr(),
        shape_literal(array.shape())
    );
    let preamble = NPY_MAGIC.len() + 2 + 2;
    let total = (preamble + header.len() + 1).div_ceil(ALIGNMENT) * ALIGNMENT;
    while preamble + header.len() + 1 < total {
        header.push(' ');
    }
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "npy header too long"))?;

    writer.write_all(NPY_MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_u16::<LittleEndian>(header_len)?;
    writer.write_all(header.as_bytes())?;

    match array {
        NpyArray::Float64 { data, .. } => {
            for value in data {
                writer.write_f64::<LittleEndian>(*value)?;
            }
        }
        NpyArray::Unicode { data, .. } => {
            let width = unicode_width(data);
            for cell in data {
                let mut written = 0;
                for ch in cell.chars() {
                    writer.write_u32::<LittleEndian>(ch as u32)?;
                    written += 1;
                }
                for _ in written..width {
                    writer.write_u32::<LittleEndian>(0)?;
                }
            }
        }
    }

    Ok(())
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header.find(&format!("'{key}'"))? + key.len() + 2;
    let rest = header[start..].trim_start();
    rest.strip_prefix(':').map(str::trim_start)
}

fn invalid(message: impl Into<String>) -> ConvertError {
    ConvertError::InvalidArtifact(message.into())
}

/// Decode an `.npy` stream written as `<f8` or `<U{n}` in C order
pub fn read_npy<R: Read>(reader: &mut R) -> Result<NpyArray> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(invalid("missing NUMPY signature"));
    }

    let major = reader.read_u8()?;
    let _minor = reader.read_u8()?;
    let header_len = match major {
        1 => reader.read_u16::<LittleEndian>()? as usize,
        2 | 3 => reader.read_u32::<LittleEndian>()? as usize,
        other => return Err(invalid(format!("unsupported npy version {other}"))),
    };

    if header_len > MAX_HEADER_LEN {
        return Err(invalid(format!("npy header of {header_len} bytes")));
    }
    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8_lossy(&header);

    let descr = header_value(&header, "descr")
        .and_then(|v| v.strip_prefix('\''))
        .and_then(|v| v.split('\'').next())
        .ok_or_else(|| invalid("npy header has no descr"))?
        .to_string();

    if header_value(&header, "fortran_order").is_some_and(|v| v.starts_with("True")) {
        return Err(invalid("Fortran-ordered arrays are not supported"));
    }

    let shape_text = header_value(&header, "shape")
        .and_then(|v| v.strip_prefix('('))
        .and_then(|v| v.split(')').next())
        .ok_or_else(|| invalid("npy header has no shape"))?;
    let shape = shape_text
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<usize>().map_err(|_| invalid(format!("bad dimension '{d}'"))))
        .collect::<Result<Vec<_>>>()?;
    let count = shape
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| invalid("npy shape overflows"))?;

    if descr == "<f8" {
        let mut data = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            data.push(reader.read_f64::<LittleEndian>()?);
        }
        return Ok(NpyArray::Float64 { shape, data });
    }

    if let Some(width) = descr.strip_prefix("<U") {
        let width: usize = width
            .parse()
            .map_err(|_| invalid(format!("bad string width in '{descr}'")))?;
        let mut data = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            let mut cell = String::new();
            for _ in 0..width {
                let code = reader.read_u32::<LittleEndian>()?;
                if code != 0 {
                    cell.push(char::from_u32(code).ok_or_else(|| invalid("bad code point"))?);
                }
            }
            data.push(cell);
        }
        return Ok(NpyArray::Unicode { shape, data });
    }

    Err(invalid(format!("unsupported dtype '{descr}'")))
}
