//! Test utilities for gvvideo
// Builds small GV files in memory: solid-color texel blocks, LZ4 block compressed,
// with the trailing index. Used by unit tests, integration tests and benches.

use crate::formats::{Header, TextureFormat};

/// An opaque color used to fill a whole 4x4 block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    // survives the 565 quantization unchanged
    pub const YELLOW: Rgb = Rgb(231, 255, 0);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    fn to_rgb565(self) -> u16 {
        (u16::from(self.0 >> 3) << 11) | (u16::from(self.1 >> 2) << 5) | u16::from(self.2 >> 3)
    }
}

/// Encode one fully opaque block of a single color
pub fn encode_solid_block(format: TextureFormat, color: Rgb) -> Vec<u8> {
    let c = color.to_rgb565();
    let mut color_block = Vec::with_capacity(8);
    color_block.extend_from_slice(&c.to_le_bytes());
    color_block.extend_from_slice(&c.to_le_bytes());
    color_block.extend_from_slice(&[0u8; 4]);

    match format {
        TextureFormat::Dxt1 => color_block,
        TextureFormat::Dxt3 => {
            let mut block = vec![0xFFu8; 8];
            block.extend_from_slice(&color_block);
            block
        }
        TextureFormat::Dxt5 => {
            let mut block = vec![255u8, 255, 0, 0, 0, 0, 0, 0];
            block.extend_from_slice(&color_block);
            block
        }
    }
}

/// Builder for synthetic GV files
pub struct GvBuilder {
    width: u32,
    height: u32,
    fps: f32,
    format: TextureFormat,
    frame_bytes: Option<u32>,
    payloads: Vec<Vec<u8>>,
    reversed: bool,
}

impl GvBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: 1.0,
            format: TextureFormat::Dxt1,
            frame_bytes: None,
            payloads: Vec::new(),
            reversed: false,
        }
    }

    pub fn fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn frame_bytes(mut self, frame_bytes: u32) -> Self {
        self.frame_bytes = Some(frame_bytes);
        self
    }

    /// Add a frame whose blocks are filled row-major with `blocks`; missing blocks are black.
    pub fn frame(self, blocks: &[Rgb]) -> Self {
        let blocks_total = self.width.div_ceil(4) as usize * self.height.div_ceil(4) as usize;
        let mut raw = Vec::with_capacity(self.frame_size());
        for i in 0..blocks_total {
            let color = blocks.get(i).copied().unwrap_or(Rgb::BLACK);
            raw.extend_from_slice(&encode_solid_block(self.format, color));
        }
        raw.resize(self.frame_size(), 0);
        self.raw_frame(&raw)
    }

    /// Add a frame from its decompressed bytes
    pub fn raw_frame(self, raw: &[u8]) -> Self {
        self.payload(lz4_flex::block::compress(raw))
    }

    /// Add a frame payload exactly as it should appear in the file
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payloads.push(payload);
        self
    }

    /// Store payloads on disk in reverse frame order
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn header(&self) -> Header {
        Header {
            width: self.width,
            height: self.height,
            frame_count: self.payloads.len() as u32,
            fps: self.fps,
            format: self.format.tag(),
            frame_bytes: self
                .frame_bytes
                .unwrap_or(self.format.compressed_size(self.width, self.height) as u32),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut file = self.header().to_bytes().to_vec();
        let mut index = vec![(0u64, 0u64); self.payloads.len()];

        let order: Vec<usize> = if self.reversed {
            (0..self.payloads.len()).rev().collect()
        } else {
            (0..self.payloads.len()).collect()
        };
        for frame in order {
            let payload = &self.payloads[frame];
            index[frame] = (file.len() as u64, payload.len() as u64);
            file.extend_from_slice(payload);
        }

        for (address, size) in index {
            file.extend_from_slice(&address.to_le_bytes());
            file.extend_from_slice(&size.to_le_bytes());
        }
        file
    }
}

/// The 10x10, 5 frame, 1 fps DXT1 clip used across the test suite: red, blue, green and
/// yellow quadrant blocks on every frame, with the frame number encoded in the last block.
pub fn sample_clip() -> Vec<u8> {
    let mut builder = GvBuilder::new(10, 10).fps(1.0).frame_bytes(72);
    for frame in 0..5u8 {
        let marker = Rgb(frame * 40, frame * 40, frame * 40);
        builder = builder.frame(&[
            Rgb::RED, Rgb::BLUE, Rgb::BLACK,
            Rgb::GREEN, Rgb::YELLOW, Rgb::BLACK,
            Rgb::BLACK, Rgb::BLACK, marker,
        ]);
    }
    builder.build()
}
