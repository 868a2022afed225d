// DXT (BC1/BC2/BC3) block decoder
//
// Every 4x4 texel block is decoded on its own; blocks are stored row-major. Edge blocks of
// textures whose size is not a multiple of 4 are clipped to the texture bounds.

use crate::codec::CodecError;
use crate::formats::TextureFormat;

fn rgb565_to_rgb888(c: u16) -> [u8; 3] {
    let r5 = ((c >> 11) & 0x1f) as u8;
    let g6 = ((c >> 5) & 0x3f) as u8;
    let b5 = (c & 0x1f) as u8;

    // Replicate top bits into low bits to fill 8-bit channels.
    [(r5 << 3) | (r5 >> 2), (g6 << 2) | (g6 >> 4), (b5 << 3) | (b5 >> 2)]
}

fn lerp(a: u8, b: u8, num: u32, den: u32) -> u8 {
    ((a as u32 * (den - num) + b as u32 * num) / den) as u8
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], num: u32, den: u32) -> [u8; 3] {
    [lerp(a[0], b[0], num, den), lerp(a[1], b[1], num, den), lerp(a[2], b[2], num, den)]
}

/// Color palette of a color block. `punch_through` enables the BC1 three-color mode
/// where index 3 is transparent black.
fn color_palette(color0: u16, color1: u16, punch_through: bool) -> [[u8; 4]; 4] {
    let c0 = rgb565_to_rgb888(color0);
    let c1 = rgb565_to_rgb888(color1);
    let opaque = |c: [u8; 3]| [c[0], c[1], c[2], 255];

    if color0 > color1 || !punch_through {
        [opaque(c0), opaque(c1), opaque(lerp_rgb(c0, c1, 1, 3)), opaque(lerp_rgb(c0, c1, 2, 3))]
    } else {
        [opaque(c0), opaque(c1), opaque(lerp_rgb(c0, c1, 1, 2)), [0, 0, 0, 0]]
    }
}

fn interpolated_alpha_palette(alpha0: u8, alpha1: u8) -> [u8; 8] {
    let mut a = [alpha0, alpha1, 0, 0, 0, 0, 0, 255];
    if alpha0 > alpha1 {
        for i in 1..7u32 {
            a[i as usize + 1] = lerp(alpha0, alpha1, i, 7);
        }
    } else {
        for i in 1..5u32 {
            a[i as usize + 1] = lerp(alpha0, alpha1, i, 5);
        }
    }
    a
}

/// Decode the 8-byte color half of a block into 16 RGBA texels.
fn decode_color_block(block: &[u8], punch_through: bool) -> [[u8; 4]; 16] {
    let color0 = u16::from_le_bytes([block[0], block[1]]);
    let color1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let palette = color_palette(color0, color1, punch_through);

    let mut texels = [[0u8; 4]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[((indices >> (2 * i)) & 0b11) as usize];
    }
    texels
}

fn decode_block(format: TextureFormat, block: &[u8]) -> [[u8; 4]; 16] {
    match format {
        TextureFormat::Dxt1 => decode_color_block(block, true),
        TextureFormat::Dxt3 => {
            let alpha_bits = u64::from_le_bytes([
                block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
            ]);
            let mut texels = decode_color_block(&block[8..16], false);
            for (i, texel) in texels.iter_mut().enumerate() {
                texel[3] = ((alpha_bits >> (4 * i)) & 0xF) as u8 * 17;
            }
            texels
        }
        TextureFormat::Dxt5 => {
            let palette = interpolated_alpha_palette(block[0], block[1]);
            // 48 bits of 3-bit indices, little-endian
            let alpha_indices = block[2..8]
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (8 * i)));
            let mut texels = decode_color_block(&block[8..16], false);
            for (i, texel) in texels.iter_mut().enumerate() {
                texel[3] = palette[((alpha_indices >> (3 * i)) & 0b111) as usize];
            }
            texels
        }
    }
}

/// Decode a whole texture into `output` (straight RGBA, `width * height * 4` bytes).
///
/// `data` may be longer than the texture needs; trailing bytes are ignored.
pub fn decode_into(
    format: TextureFormat,
    width: u32,
    height: u32,
    data: &[u8],
    output: &mut [u8],
) -> Result<(), CodecError> {
    let needed = format.compressed_size(width, height);
    if data.len() < needed {
        return Err(CodecError::InputTooShort { needed, got: data.len() });
    }
    let out_len = width as usize * height as usize * 4;
    if output.len() != out_len {
        return Err(CodecError::LengthMismatch { expected: out_len, got: output.len() });
    }

    let width = width as usize;
    let height = height as usize;
    let blocks_wide = width.div_ceil(4);
    let block_size = format.block_size();

    for (block_index, block) in data[..needed].chunks_exact(block_size).enumerate() {
        let bx = (block_index % blocks_wide) * 4;
        let by = (block_index / blocks_wide) * 4;
        let texels = decode_block(format, block);
        for (i, texel) in texels.iter().enumerate() {
            let x = bx + i % 4;
            let y = by + i / 4;
            if x < width && y < height {
                let idx = (y * width + x) * 4;
                output[idx..idx + 4].copy_from_slice(texel);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testlib::{encode_solid_block, Rgb};

    fn pixel(out: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
        let i = (y * width + x) * 4;
        [out[i], out[i + 1], out[i + 2], out[i + 3]]
    }

    #[test]
    fn test_rgb565_expansion() {
        assert_eq!(rgb565_to_rgb888(0xF800), [255, 0, 0]);
        assert_eq!(rgb565_to_rgb888(0x07E0), [0, 255, 0]);
        assert_eq!(rgb565_to_rgb888(0x001F), [0, 0, 255]);
        assert_eq!(rgb565_to_rgb888(0xE7E0), [231, 255, 0]);
    }

    #[test]
    fn test_dxt1_solid_block() {
        let block = encode_solid_block(TextureFormat::Dxt1, Rgb::RED);
        let mut out = vec![0u8; 64];
        decode_into(TextureFormat::Dxt1, 4, 4, &block, &mut out).unwrap();
        for px in out.chunks_exact(4) {
            assert_eq!(px, [255, 0, 0, 255]);
        }
    }

    #[test]
    fn test_dxt1_four_color_interpolation() {
        // color0 = white, color1 = black, indices 0,1,2,3 across the first row
        let mut block = [0u8; 8];
        block[0..2].copy_from_slice(&0xFFFFu16.to_le_bytes());
        block[2..4].copy_from_slice(&0x0000u16.to_le_bytes());
        block[4] = 0b11_10_01_00;
        let mut out = vec![0u8; 64];
        decode_into(TextureFormat::Dxt1, 4, 4, &block, &mut out).unwrap();
        assert_eq!(pixel(&out, 4, 0, 0), [255, 255, 255, 255]);
        assert_eq!(pixel(&out, 4, 1, 0), [0, 0, 0, 255]);
        assert_eq!(pixel(&out, 4, 2, 0), [170, 170, 170, 255]);
        assert_eq!(pixel(&out, 4, 3, 0), [85, 85, 85, 255]);
    }

    #[test]
    fn test_dxt1_punch_through_alpha() {
        // color0 <= color1 selects three-color mode; index 3 is transparent
        let mut block = [0u8; 8];
        block[0..2].copy_from_slice(&0x0000u16.to_le_bytes());
        block[2..4].copy_from_slice(&0xFFFFu16.to_le_bytes());
        block[4] = 0b11_10_01_00;
        let mut out = vec![0u8; 64];
        decode_into(TextureFormat::Dxt1, 4, 4, &block, &mut out).unwrap();
        assert_eq!(pixel(&out, 4, 2, 0), [127, 127, 127, 255]);
        assert_eq!(pixel(&out, 4, 3, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_dxt3_explicit_alpha() {
        let mut block = [0u8; 16];
        // first texel alpha 0xF, second 0x8, rest 0
        block[0] = 0x8F;
        block[8..16].copy_from_slice(&encode_solid_block(TextureFormat::Dxt1, Rgb::BLUE));
        let mut out = vec![0u8; 64];
        decode_into(TextureFormat::Dxt3, 4, 4, &block, &mut out).unwrap();
        assert_eq!(pixel(&out, 4, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&out, 4, 1, 0), [0, 0, 255, 136]);
        assert_eq!(pixel(&out, 4, 2, 0), [0, 0, 255, 0]);
    }

    #[test]
    fn test_dxt5_interpolated_alpha() {
        let mut block = [0u8; 16];
        block[0] = 255;
        block[1] = 0;
        // texel 0 -> index 0 (255), texel 1 -> index 1 (0), texel 2 -> index 2
        block[2] = 0b10_001_000;
        block[8..16].copy_from_slice(&encode_solid_block(TextureFormat::Dxt1, Rgb::GREEN));
        let mut out = vec![0u8; 64];
        decode_into(TextureFormat::Dxt5, 4, 4, &block, &mut out).unwrap();
        assert_eq!(pixel(&out, 4, 0, 0), [0, 255, 0, 255]);
        assert_eq!(pixel(&out, 4, 1, 0), [0, 255, 0, 0]);
        assert_eq!(pixel(&out, 4, 2, 0)[3], lerp(255, 0, 1, 7));
    }

    #[test]
    fn test_alpha_palette_six_value_mode() {
        let palette = interpolated_alpha_palette(0, 100);
        assert_eq!(palette[0], 0);
        assert_eq!(palette[1], 100);
        assert_eq!(palette[6], 0);
        assert_eq!(palette[7], 255);
    }

    #[test]
    fn test_partial_edge_blocks() {
        // 6x6 texture needs 2x2 blocks
        let mut data = Vec::new();
        for color in [Rgb::RED, Rgb::BLUE, Rgb::GREEN, Rgb::YELLOW] {
            data.extend_from_slice(&encode_solid_block(TextureFormat::Dxt1, color));
        }
        let mut out = vec![0u8; 6 * 6 * 4];
        decode_into(TextureFormat::Dxt1, 6, 6, &data, &mut out).unwrap();
        assert_eq!(pixel(&out, 6, 5, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&out, 6, 0, 5), [0, 255, 0, 255]);
        assert_eq!(pixel(&out, 6, 5, 5), [231, 255, 0, 255]);
    }

    #[test]
    fn test_short_input_rejected() {
        let mut out = vec![0u8; 8 * 8 * 4];
        let err = decode_into(TextureFormat::Dxt5, 8, 8, &[0u8; 32], &mut out).unwrap_err();
        assert!(matches!(err, CodecError::InputTooShort { needed: 64, got: 32 }));
    }

    #[test]
    fn test_output_size_checked() {
        let mut out = vec![0u8; 10];
        let err = decode_into(TextureFormat::Dxt1, 4, 4, &[0u8; 8], &mut out).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { expected: 64, got: 10 }));
    }
}
