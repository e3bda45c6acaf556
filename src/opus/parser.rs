//! Block directory and parameter decoding for OPUS files
//!
//! An OPUS file starts with a fixed 504-byte header. From offset 24 the header
//! holds a directory of 12-byte entries:
//!
//! ```text
//! +-----------+--------------+-----------+----------+----------------+-------------+
//! | data type | channel type | text type | reserved | chunk size u32 | offset u32  |
//! +-----------+--------------+-----------+----------+----------------+-------------+
//! ```
//!
//! The chunk size is counted in 4-byte words. Data blocks are little-endian
//! `f32` arrays; each one is described by a parameter block whose data type is
//! the data block's type plus 16.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::error::OpusError;

/// File signature of every OPUS file
pub const OPUS_MAGIC: [u8; 4] = [0x0A, 0x0A, 0xFE, 0xFE];

/// Size of the fixed header holding the block directory
pub const HEADER_LEN: usize = 504;

/// Offset of the first directory entry
pub const FIRST_ENTRY: usize = 24;

/// Size of one directory entry
pub const ENTRY_LEN: usize = 12;

/// Offset added to a data block type to get its parameter block type
pub const PARAMETER_OFFSET: u8 = 16;

/// Kind of a block listed in the OPUS directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Absorbance spectrum ("AB")
    Absorbance,
    /// Single-channel sample spectrum ("ScSm")
    SampleSingleChannel,
    /// Single-channel reference spectrum ("ScRf")
    ReferenceSingleChannel,
    /// Parameters describing a data block
    Parameters(u8),
    /// Anything this reader does not interpret
    Other(u8),
}

impl BlockKind {
    /// Classify a directory entry by its data type byte
    pub fn from_data_type(data_type: u8) -> Self {
        match data_type {
            7 => BlockKind::SampleSingleChannel,
            11 => BlockKind::ReferenceSingleChannel,
            15 => BlockKind::Absorbance,
            23 | 27 | 31 => BlockKind::Parameters(data_type - PARAMETER_OFFSET),
            other => BlockKind::Other(other),
        }
    }

    /// Short code used by OPUS tools for the block kind
    pub fn code(&self) -> &'static str {
        match self {
            BlockKind::Absorbance => "AB",
            BlockKind::SampleSingleChannel => "ScSm",
            BlockKind::ReferenceSingleChannel => "ScRf",
            BlockKind::Parameters(_) => "Data Parameter",
            BlockKind::Other(_) => "Unknown",
        }
    }

    /// True for blocks that carry a y-axis array
    pub fn is_spectrum(&self) -> bool {
        matches!(
            self,
            BlockKind::Absorbance | BlockKind::SampleSingleChannel | BlockKind::ReferenceSingleChannel
        )
    }
}

/// One entry of the block directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Interpreted block kind
    pub kind: BlockKind,
    /// Raw data type byte
    pub data_type: u8,
    /// Channel type byte
    pub channel_type: u8,
    /// Text type byte
    pub text_type: u8,
    /// Byte offset of the block in the file
    pub offset: usize,
    /// Block length in bytes
    pub length: usize,
}

/// Decoded spectrum block: x-axis grid and y values of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralBlock {
    /// Wavenumber grid
    pub x: Vec<f64>,
    /// Intensities, one per grid point
    pub y: Vec<f64>,
}

/// Value stored in a parameter block
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// 32-bit integer (type 0)
    Int(i32),
    /// 64-bit float (type 1)
    Float(f64),
    /// NUL-terminated text (types 2 to 4)
    Text(String),
}

/// Named parameters of one parameter block
#[derive(Debug, Clone, Default)]
pub struct ParameterBlock {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterBlock {
    /// Decode a parameter block
    pub fn parse(bytes: &[u8]) -> Result<Self, OpusError> {
        let mut values = BTreeMap::new();
        let mut pos = 0usize;

        while pos + 8 <= bytes.len() {
            let name = String::from_utf8_lossy(&bytes[pos..pos + 3]).into_owned();
            if name == "END" {
                break;
            }

            let mut rdr = Cursor::new(&bytes[pos + 4..pos + 8]);
            let type_id = rdr.read_u16::<LittleEndian>()?;
            let size = rdr.read_u16::<LittleEndian>()? as usize * 2;

            let start = pos + 8;
            let end = start + size;
            if end > bytes.len() {
                return Err(OpusError::InvalidParameter {
                    name,
                    reason: format!("value of {size} bytes runs past the block"),
                });
            }
            let raw = &bytes[start..end];

            let value = match type_id {
                0 if raw.len() >= 4 => Some(ParameterValue::Int(
                    Cursor::new(raw).read_i32::<LittleEndian>()?,
                )),
                1 if raw.len() >= 8 => Some(ParameterValue::Float(
                    Cursor::new(raw).read_f64::<LittleEndian>()?,
                )),
                2..=4 => {
                    let text = raw.split(|b| *b == 0).next().unwrap_or_default();
                    Some(ParameterValue::Text(String::from_utf8_lossy(text).into_owned()))
                }
                _ => None,
            };
            if let Some(value) = value {
                values.insert(name, value);
            }

            pos = end;
        }

        Ok(Self { values })
    }

    /// Look up a parameter by its three-letter name
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Integer parameter
    pub fn int(&self, name: &'static str) -> Result<i32, OpusError> {
        match self.values.get(name) {
            Some(ParameterValue::Int(v)) => Ok(*v),
            Some(other) => Err(OpusError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected integer, found {other:?}"),
            }),
            None => Err(OpusError::MissingParameter(name)),
        }
    }

    /// Float parameter; integers are widened
    pub fn float(&self, name: &'static str) -> Result<f64, OpusError> {
        match self.values.get(name) {
            Some(ParameterValue::Float(v)) => Ok(*v),
            Some(ParameterValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(OpusError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected number, found {other:?}"),
            }),
            None => Err(OpusError::MissingParameter(name)),
        }
    }

    /// Number of decoded parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was decoded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An OPUS file held in memory with its decoded block directory
#[derive(Debug, Clone)]
pub struct OpusFile {
    data: Vec<u8>,
    blocks: Vec<BlockInfo>,
}

impl OpusFile {
    /// True when `data` starts with the OPUS signature
    pub fn has_signature(data: &[u8]) -> bool {
        data.len() >= OPUS_MAGIC.len() && data[..OPUS_MAGIC.len()] == OPUS_MAGIC
    }

    /// Read and decode the directory of a file on disk
    pub fn open(path: &Path) -> Result<Self, OpusError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Decode the block directory of an in-memory file
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, OpusError> {
        if !Self::has_signature(&data) {
            return Err(OpusError::BadSignature);
        }
        if data.len() < FIRST_ENTRY + ENTRY_LEN {
            return Err(OpusError::HeaderTruncated { len: data.len() });
        }

        let directory_end = HEADER_LEN.min(data.len());
        let mut blocks = Vec::new();
        let mut cursor = FIRST_ENTRY;

        while cursor + ENTRY_LEN <= directory_end {
            let entry = &data[cursor..cursor + ENTRY_LEN];
            let mut rdr = Cursor::new(&entry[4..]);
            let chunk_size = rdr.read_u32::<LittleEndian>()? as usize;
            let offset = rdr.read_u32::<LittleEndian>()? as usize;
            if offset == 0 {
                break;
            }

            let length = chunk_size * 4;
            if offset.checked_add(length).map_or(true, |end| end > data.len()) {
                return Err(OpusError::BlockOutOfBounds {
                    offset,
                    length,
                    file_size: data.len(),
                });
            }

            blocks.push(BlockInfo {
                kind: BlockKind::from_data_type(entry[0]),
                data_type: entry[0],
                channel_type: entry[1],
                text_type: entry[2],
                offset,
                length,
            });
            cursor += ENTRY_LEN;
        }

        Ok(Self { data, blocks })
    }

    /// Directory entries in file order
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    fn block_bytes(&self, block: &BlockInfo) -> Result<&[u8], OpusError> {
        block
            .offset
            .checked_add(block.length)
            .and_then(|end| self.data.get(block.offset..end))
            .ok_or(OpusError::BlockOutOfBounds {
                offset: block.offset,
                length: block.length,
                file_size: self.data.len(),
            })
    }

    /// Parameter block describing `block`, preferring the same channel
    pub fn parameters_for(&self, block: &BlockInfo) -> Result<ParameterBlock, OpusError> {
        let wanted = block.data_type.wrapping_add(PARAMETER_OFFSET);
        let candidates = || self.blocks.iter().filter(move |b| b.data_type == wanted);

        let params = candidates()
            .find(|b| b.channel_type == block.channel_type)
            .or_else(|| candidates().next())
            .ok_or(OpusError::MissingParameterBlock(block.kind.code()))?;

        ParameterBlock::parse(self.block_bytes(params)?)
    }

    /// Decode a spectrum block into its wavenumber grid and scaled values
    pub fn read_block(&self, block: &BlockInfo) -> Result<SpectralBlock, OpusError> {
        let params = self.parameters_for(block)?;

        let npt = params.int("NPT")?;
        let npt = usize::try_from(npt).map_err(|_| OpusError::InvalidParameter {
            name: "NPT".to_string(),
            reason: format!("negative point count {npt}"),
        })?;
        let first_x = params.float("FXV")?;
        let last_x = params.float("LXV")?;
        let scale = match params.float("CSF") {
            Ok(v) => v,
            Err(OpusError::MissingParameter(_)) => 1.0,
            Err(e) => return Err(e),
        };

        let bytes = self.block_bytes(block)?;
        let available = bytes.len() / 4;
        if available < npt {
            return Err(OpusError::ShortData {
                expected: npt,
                available,
            });
        }

        let mut rdr = Cursor::new(bytes);
        let mut y = Vec::with_capacity(npt);
        for _ in 0..npt {
            y.push(rdr.read_f32::<LittleEndian>()? as f64 * scale);
        }

        Ok(SpectralBlock {
            x: linspace(first_x, last_x, npt),
            y,
        })
    }
}

/// Evenly spaced grid from `start` to `stop` inclusive; the last point is exactly `stop`
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut grid: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            grid[n - 1] = stop;
            grid
        }
    }
}
