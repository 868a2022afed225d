// Codec abstraction module
//
// The container reader never decompresses or decodes textures itself. It talks to two narrow
// seams: a block decompressor that expands one payload into a buffer of known size, and a
// texture decoder that turns block-compressed texels into 4-byte pixels. Any library that
// honours these contracts can be plugged into `GvVideo`.

use thiserror::Error;

use crate::dxt;
use crate::formats::{GvError, TextureFormat};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decompressed {got} bytes, expected {expected}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("Input too short: need {needed} bytes, got {got}")]
    InputTooShort { needed: usize, got: usize },
    #[error("Unsupported codec: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

/// Pixel layouts a texture decoder may report for its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// Straight-alpha RGBA, the canonical output layout
    Rgba8,
    /// RGBA with color channels premultiplied by alpha
    PremultipliedRgba8,
    /// Straight-alpha BGRA. Not accepted by the reader.
    Bgra8,
}

/// Expands one compressed payload.
pub trait BlockDecompressor {
    /// Decompress `input` into `output`, returning the number of bytes written.
    /// `output.len()` is the exact expected decompressed size.
    fn decompress_block(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError>;
}

/// Decodes block-compressed texture data into 4-byte pixels.
pub trait TextureDecoder {
    /// Decode `data` for a `width` x `height` texture identified by `fourcc` into `output`,
    /// which holds exactly `width * height * 4` bytes. Returns the layout of what was written.
    fn decode(
        &self,
        fourcc: &str,
        width: u32,
        height: u32,
        data: &[u8],
        output: &mut [u8],
    ) -> Result<PixelLayout, CodecError>;
}

/// LZ4 raw block decompressor (no frame header, no size prefix)
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Block;

impl BlockDecompressor for Lz4Block {
    fn decompress_block(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
        lz4_flex::block::decompress_into(input, output).map_err(|e| CodecError::Other(e.to_string()))
    }
}

/// DXT1/DXT3/DXT5 decoder producing straight RGBA
#[derive(Debug, Clone, Copy, Default)]
pub struct DxtDecoder;

impl TextureDecoder for DxtDecoder {
    fn decode(
        &self,
        fourcc: &str,
        width: u32,
        height: u32,
        data: &[u8],
        output: &mut [u8],
    ) -> Result<PixelLayout, CodecError> {
        let format = match fourcc {
            "DXT1" => TextureFormat::Dxt1,
            "DXT3" => TextureFormat::Dxt3,
            "DXT5" => TextureFormat::Dxt5,
            other => return Err(CodecError::Unsupported(other.to_string())),
        };
        dxt::decode_into(format, width, height, data, output)?;
        Ok(PixelLayout::Rgba8)
    }
}

/// Rewrite `pixels` in place into canonical straight RGBA.
///
/// Straight RGBA passes through. Premultiplied RGBA is divided back by alpha, fully
/// transparent pixels become all zero. Any other layout is rejected.
pub fn normalize_layout(layout: PixelLayout, pixels: &mut [u8]) -> Result<(), GvError> {
    match layout {
        PixelLayout::Rgba8 => Ok(()),
        PixelLayout::PremultipliedRgba8 => {
            for px in pixels.chunks_exact_mut(4) {
                unpremultiply(px);
            }
            Ok(())
        }
        other => Err(GvError::UnexpectedPixelLayout(other)),
    }
}

fn unpremultiply(px: &mut [u8]) {
    let alpha = u32::from(px[3]);
    match alpha {
        255 => {}
        0 => px[..3].fill(0),
        _ => {
            for c in &mut px[..3] {
                *c = (u32::from(*c) * 255 / alpha).min(255) as u8;
            }
        }
    }
}
