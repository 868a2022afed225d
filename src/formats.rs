//! Formats module
//!
//! This module describes the on-disk layout of GV video files: a fixed 24-byte header at the
//! start of the file, an opaque payload region, and a trailing index of `(address, size)` pairs,
//! one per frame. It provides parsers for the header and the index, and the error type shared
//! by the whole crate.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use thiserror::Error;

use crate::codec::PixelLayout;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: u64 = 24;

/// Size of one index entry (address u64 + size u64)
pub const INDEX_ENTRY_SIZE: u64 = 16;

/// Errors that can occur while opening or decoding a GV file
#[derive(Error, Debug)]
pub enum GvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Truncated {what}: expected {expected} bytes")]
    Truncated { what: &'static str, expected: u64 },
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),
    #[error("Frame {frame} out of range (frame count {frame_count})")]
    OutOfRange { frame: u32, frame_count: u32 },
    #[error("Buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    #[error("Unsupported format tag: {0}")]
    UnsupportedFormat(u32),
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),
    #[error("Texture decode failed: {0}")]
    DecodeFailed(String),
    #[error("Unexpected pixel layout: {0:?}")]
    UnexpectedPixelLayout(PixelLayout),
    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl GvError {
    /// Stable numeric code, used by the C ABI
    pub fn code(&self) -> i32 {
        match self {
            GvError::Io(_) => 1,
            GvError::Truncated { .. } => 2,
            GvError::CorruptIndex(_) => 3,
            GvError::OutOfRange { .. } => 4,
            GvError::BufferTooSmall { .. } => 5,
            GvError::UnsupportedFormat(_) => 6,
            GvError::DecompressionFailed(_) => 7,
            GvError::DecodeFailed(_) => 8,
            GvError::UnexpectedPixelLayout(_) => 9,
            GvError::InvalidDimensions { .. } => 10,
        }
    }

    /// Map a failed `read_exact` to `Truncated`, keeping every other IO error as `Io`
    pub(crate) fn from_read(err: io::Error, what: &'static str, expected: u64) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            GvError::Truncated { what, expected }
        } else {
            GvError::Io(err)
        }
    }
}

/// Block-compressed texture variants a GV file may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// DXT1 / BC1, no alpha
    Dxt1,
    /// DXT3 / BC2, explicit 4-bit alpha
    Dxt3,
    /// DXT5 / BC3, interpolated alpha
    Dxt5,
}

impl TextureFormat {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(TextureFormat::Dxt1),
            3 => Some(TextureFormat::Dxt3),
            5 => Some(TextureFormat::Dxt5),
            _ => None,
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            TextureFormat::Dxt1 => 1,
            TextureFormat::Dxt3 => 3,
            TextureFormat::Dxt5 => 5,
        }
    }

    /// FourCC identifier handed to texture decoders
    pub fn fourcc(self) -> &'static str {
        match self {
            TextureFormat::Dxt1 => "DXT1",
            TextureFormat::Dxt3 => "DXT3",
            TextureFormat::Dxt5 => "DXT5",
        }
    }

    /// Bytes per 4x4 block
    pub fn block_size(self) -> usize {
        match self {
            TextureFormat::Dxt1 => 8,
            TextureFormat::Dxt3 | TextureFormat::Dxt5 => 16,
        }
    }

    /// Number of bytes a `width` x `height` texture occupies in this format
    pub fn compressed_size(self, width: u32, height: u32) -> usize {
        let blocks = width.div_ceil(4) as usize * height.div_ceil(4) as usize;
        blocks * self.block_size()
    }
}

/// GV file header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub fps: f32,
    /// Raw codec tag, see [`TextureFormat::from_tag`]
    pub format: u32,
    /// Advisory compressed frame size, never used to size decode buffers
    pub frame_bytes: u32,
}

impl Header {
    /// Size in bytes of one decompressed frame (`width * height * 4`)
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// The texture format, or `UnsupportedFormat` for unknown tags
    pub fn texture_format(&self) -> Result<TextureFormat, GvError> {
        TextureFormat::from_tag(self.format).ok_or(GvError::UnsupportedFormat(self.format))
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Self {
        let word = |i: usize| [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]];
        Self {
            width: u32::from_le_bytes(word(0)),
            height: u32::from_le_bytes(word(4)),
            frame_count: u32::from_le_bytes(word(8)),
            fps: f32::from_le_bytes(word(12)),
            format: u32::from_le_bytes(word(16)),
            frame_bytes: u32::from_le_bytes(word(20)),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&self.width.to_le_bytes());
        buf[4..8].copy_from_slice(&self.height.to_le_bytes());
        buf[8..12].copy_from_slice(&self.frame_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.fps.to_le_bytes());
        buf[16..20].copy_from_slice(&self.format.to_le_bytes());
        buf[20..24].copy_from_slice(&self.frame_bytes.to_le_bytes());
        buf
    }
}

/// Location of one compressed frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Absolute byte offset of the payload
    pub address: u64,
    /// Payload length in bytes
    pub size: u64,
}

impl IndexEntry {
    pub fn from_bytes(buf: &[u8; INDEX_ENTRY_SIZE as usize]) -> Self {
        let mut address = [0u8; 8];
        let mut size = [0u8; 8];
        address.copy_from_slice(&buf[0..8]);
        size.copy_from_slice(&buf[8..16]);
        Self {
            address: u64::from_le_bytes(address),
            size: u64::from_le_bytes(size),
        }
    }

    /// One past the last payload byte, `None` on overflow
    pub fn end(&self) -> Option<u64> {
        self.address.checked_add(self.size)
    }
}

/// Parsed, immutable frame index. Cloning shares the underlying entries.
#[derive(Debug, Clone)]
pub struct FrameIndex {
    entries: Arc<[IndexEntry]>,
    footer_start: u64,
}

impl FrameIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte offset where the index begins; every payload ends at or before it
    pub fn footer_start(&self) -> u64 {
        self.footer_start
    }

    pub fn get(&self, frame: u32) -> Option<IndexEntry> {
        self.entries.get(frame as usize).copied()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Read the 24-byte header from the current position of `reader`
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header, GvError> {
    let mut buf = [0u8; HEADER_SIZE as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| GvError::from_read(e, "header", HEADER_SIZE))?;
    let header = Header::from_bytes(&buf);
    if header.width == 0 || header.height == 0 {
        return Err(GvError::InvalidDimensions { width: header.width, height: header.height });
    }
    // width * height * 4 must be addressable
    (header.width as usize)
        .checked_mul(header.height as usize)
        .and_then(|px| px.checked_mul(4))
        .ok_or(GvError::InvalidDimensions { width: header.width, height: header.height })?;
    Ok(header)
}

/// Locate and read the trailing index of `frame_count` entries.
///
/// The index occupies the last `frame_count * 16` bytes of the source. Its start must not
/// overlap the header, and every entry must describe a payload that ends at or before it.
pub fn read_index<R: Read + Seek>(reader: &mut R, frame_count: u32) -> Result<FrameIndex, GvError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let index_len = u64::from(frame_count) * INDEX_ENTRY_SIZE;
    let footer_start = file_len
        .checked_sub(index_len)
        .filter(|start| *start >= HEADER_SIZE)
        .ok_or_else(|| {
            GvError::CorruptIndex(format!(
                "{} frames need {} index bytes but the source is {} bytes long",
                frame_count, index_len, file_len
            ))
        })?;

    reader.seek(SeekFrom::Start(footer_start))?;
    let mut raw = vec![0u8; index_len as usize];
    reader
        .read_exact(&mut raw)
        .map_err(|e| GvError::from_read(e, "index", index_len))?;

    let mut entries = Vec::with_capacity(frame_count as usize);
    for (i, chunk) in raw.chunks_exact(INDEX_ENTRY_SIZE as usize).enumerate() {
        let mut buf = [0u8; INDEX_ENTRY_SIZE as usize];
        buf.copy_from_slice(chunk);
        let entry = IndexEntry::from_bytes(&buf);
        match entry.end() {
            Some(end) if entry.address >= HEADER_SIZE && end <= footer_start => entries.push(entry),
            _ => {
                return Err(GvError::CorruptIndex(format!(
                    "frame {} payload at {}+{} lies outside the payload region {}..{}",
                    i, entry.address, entry.size, HEADER_SIZE, footer_start
                )))
            }
        }
    }

    Ok(FrameIndex {
        entries: entries.into(),
        footer_start,
    })
}
