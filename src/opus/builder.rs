//! Synthetic OPUS file generation
//!
//! Produces files in the layout [`OpusFile`](super::OpusFile) decodes: the fixed
//! header with its block directory, followed by each block padded to 4 bytes.

use std::io;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::parser::{ParameterValue, ENTRY_LEN, FIRST_ENTRY, HEADER_LEN, OPUS_MAGIC, PARAMETER_OFFSET};

/// Program version written into generated headers
const PROGRAM_VERSION: f64 = 920_622.0;

/// Maximum number of directory entries the header can hold
pub const MAX_BLOCKS: usize = (HEADER_LEN - FIRST_ENTRY) / ENTRY_LEN;

#[derive(Debug, Clone)]
struct RawBlock {
    data_type: u8,
    channel_type: u8,
    data: Vec<u8>,
}

/// Builder for synthetic OPUS files
#[derive(Debug, Clone, Default)]
pub struct OpusBuilder {
    blocks: Vec<RawBlock>,
}

impl OpusBuilder {
    /// Start an empty file
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an absorbance ("AB") block with its parameter block
    pub fn absorbance(self, first_x: f64, last_x: f64, y: &[f32]) -> Self {
        self.block_with_scale(15, 0, first_x, last_x, y, 1.0)
    }

    /// Add a single-channel sample ("ScSm") block with its parameter block
    pub fn single_channel_sample(self, first_x: f64, last_x: f64, y: &[f32]) -> Self {
        self.block_with_scale(7, 0, first_x, last_x, y, 1.0)
    }

    /// Add a spectrum block of any data type, followed by its parameter block
    pub fn block_with_scale(
        self,
        data_type: u8,
        channel_type: u8,
        first_x: f64,
        last_x: f64,
        y: &[f32],
        scale: f64,
    ) -> Self {
        let mut data = Vec::with_capacity(y.len() * 4);
        for value in y {
            data.extend_from_slice(&value.to_le_bytes());
        }

        let npt = i32::try_from(y.len()).unwrap_or(i32::MAX);
        let params = Self::parameter_block(&[
            ("DPF", ParameterValue::Int(1)),
            ("NPT", ParameterValue::Int(npt)),
            ("FXV", ParameterValue::Float(first_x)),
            ("LXV", ParameterValue::Float(last_x)),
            ("CSF", ParameterValue::Float(scale)),
        ]);

        self.raw_block(data_type, channel_type, data)
            .raw_block(data_type.wrapping_add(PARAMETER_OFFSET), channel_type, params)
    }

    /// Add a block with arbitrary content
    pub fn raw_block(mut self, data_type: u8, channel_type: u8, data: Vec<u8>) -> Self {
        self.blocks.push(RawBlock {
            data_type,
            channel_type,
            data,
        });
        self
    }

    /// Encode a parameter block, terminated by `END`
    pub fn parameter_block(entries: &[(&str, ParameterValue)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in entries {
            let (type_id, mut payload) = match value {
                ParameterValue::Int(v) => (0u16, v.to_le_bytes().to_vec()),
                ParameterValue::Float(v) => (1u16, v.to_le_bytes().to_vec()),
                ParameterValue::Text(s) => {
                    let mut bytes = s.as_bytes().to_vec();
                    bytes.push(0);
                    (2u16, bytes)
                }
            };
            if payload.len() % 2 != 0 {
                payload.push(0);
            }

            let mut tag = [0u8; 4];
            for (slot, byte) in tag.iter_mut().zip(name.bytes().take(3)) {
                *slot = byte;
            }
            out.extend_from_slice(&tag);
            out.extend_from_slice(&type_id.to_le_bytes());
            out.extend_from_slice(&((payload.len() / 2) as u16).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out.extend_from_slice(b"END\0");
        out.extend_from_slice(&[0u8; 4]);
        out
    }

    /// Encode the complete file
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(&OPUS_MAGIC);
        // Writes into a Vec cannot fail.
        let _ = header.write_f64::<LittleEndian>(PROGRAM_VERSION);
        let _ = header.write_u32::<LittleEndian>(FIRST_ENTRY as u32);
        let _ = header.write_u32::<LittleEndian>(MAX_BLOCKS as u32);
        let _ = header.write_u32::<LittleEndian>(self.blocks.len().min(MAX_BLOCKS) as u32);

        let mut body = Vec::new();
        let mut offset = HEADER_LEN;
        for block in self.blocks.iter().take(MAX_BLOCKS) {
            let mut data = block.data.clone();
            while data.len() % 4 != 0 {
                data.push(0);
            }

            header.push(block.data_type);
            header.push(block.channel_type);
            header.push(0);
            header.push(0);
            let _ = header.write_u32::<LittleEndian>((data.len() / 4) as u32);
            let _ = header.write_u32::<LittleEndian>(offset as u32);

            offset += data.len();
            body.extend_from_slice(&data);
        }
        header.resize(HEADER_LEN, 0);

        header.extend_from_slice(&body);
        header
    }

    /// Write the file to disk
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }
}
