//! Container reader
//!
//! `GvVideo` owns one seekable byte source together with the parsed header and frame index,
//! and turns a frame id into pixels:
//!
//! resolve -> seek -> read payload -> decompress (`width * height * 4` bytes)
//!         -> texture decode -> normalize to straight RGBA
//!
//! Retrieval methods take `&mut self` because every call moves the seek cursor of the byte
//! source. A handle therefore has a single user at a time. For concurrent playback, give each
//! consumer its own handle over an independently opened source; [`GvVideo::with_source`]
//! builds one that shares the already parsed [`VideoInfo`] without touching the file again.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace, warn};
use memmap2::Mmap;

use crate::codec::{normalize_layout, BlockDecompressor, DxtDecoder, Lz4Block, TextureDecoder};
use crate::formats::{read_header, read_index, FrameIndex, GvError, Header, IndexEntry};

/// Parsed header and index. Immutable and cheap to clone; safe to share between threads.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    header: Header,
    index: FrameIndex,
}

impl VideoInfo {
    /// Parse the header and trailing index from `reader`
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, GvError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = read_header(reader)?;
        let index = read_index(reader, header.frame_count)?;

        if let Ok(format) = header.texture_format() {
            let expected = format.compressed_size(header.width, header.height);
            if expected != header.frame_bytes as usize {
                warn!(
                    "GV header advertises {} bytes per frame, {} {}x{} needs {}",
                    header.frame_bytes,
                    format.fourcc(),
                    header.width,
                    header.height,
                    expected
                );
            }
        }

        Ok(Self { header, index })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    pub fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// Size in bytes of one decoded (or decompressed) frame
    pub fn frame_size(&self) -> usize {
        self.header.frame_size()
    }

    /// Look up where frame `frame` is stored. No I/O.
    pub fn resolve(&self, frame: u32) -> Result<IndexEntry, GvError> {
        self.index.get(frame).ok_or(GvError::OutOfRange {
            frame,
            frame_count: self.header.frame_count,
        })
    }
}

/// Random-access reader for GV files
pub struct GvVideo<R, D = Lz4Block, T = DxtDecoder> {
    info: VideoInfo,
    reader: R,
    decompressor: D,
    decoder: T,
    /// Scratch for the compressed payload, reused across calls
    compressed: Vec<u8>,
    /// Scratch for the decompressed texture, reused across calls
    decompressed: Vec<u8>,
}

impl GvVideo<BufReader<File>> {
    /// Open a GV file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GvError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl GvVideo<Cursor<Mmap>> {
    /// Open a GV file through a read-only memory map.
    ///
    /// The file must not be truncated or modified while the map is alive.
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self, GvError> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and the file is assumed not to change under the reader
        let map = unsafe { Mmap::map(&file)? };
        Self::from_reader(Cursor::new(map))
    }
}

impl<R: Read + Seek> GvVideo<R> {
    /// Open a GV stream from any seekable byte source using the built-in LZ4 and DXT codecs
    pub fn from_reader(reader: R) -> Result<Self, GvError> {
        Self::with_codecs(reader, Lz4Block, DxtDecoder)
    }
}

impl<R, D, T> GvVideo<R, D, T>
where
    R: Read + Seek,
    D: BlockDecompressor,
    T: TextureDecoder,
{
    /// Open a GV stream with custom decompression and texture decoding back-ends
    pub fn with_codecs(mut reader: R, decompressor: D, decoder: T) -> Result<Self, GvError> {
        let info = VideoInfo::read(&mut reader)?;
        debug!(
            "Opened GV {}x{}, {} frames at {} fps, format {}",
            info.header.width, info.header.height, info.header.frame_count, info.header.fps, info.header.format
        );
        Ok(Self::from_parts(reader, info, decompressor, decoder))
    }

    /// Build a handle from already parsed metadata. No I/O is performed.
    pub fn from_parts(reader: R, info: VideoInfo, decompressor: D, decoder: T) -> Self {
        Self {
            info,
            reader,
            decompressor,
            decoder,
            compressed: Vec::new(),
            decompressed: Vec::new(),
        }
    }

    /// A second handle over another source of the same file, sharing the parsed metadata
    pub fn with_source<R2: Read + Seek>(&self, reader: R2) -> GvVideo<R2, D, T>
    where
        D: Clone,
        T: Clone,
    {
        GvVideo::from_parts(reader, self.info.clone(), self.decompressor.clone(), self.decoder.clone())
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn header(&self) -> &Header {
        &self.info.header
    }

    pub fn frame_count(&self) -> u32 {
        self.info.frame_count()
    }

    pub fn frame_size(&self) -> usize {
        self.info.frame_size()
    }

    pub fn resolve(&self, frame: u32) -> Result<IndexEntry, GvError> {
        self.info.resolve(frame)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decode a frame into a newly allocated straight-RGBA buffer
    pub fn read_frame(&mut self, frame: u32) -> Result<Vec<u8>, GvError> {
        let mut pixels = vec![0u8; self.frame_size()];
        self.read_frame_into(frame, &mut pixels)?;
        Ok(pixels)
    }

    /// Decode a frame into `output`, which must hold at least `width * height * 4` bytes.
    /// Only the first `width * height * 4` bytes are written.
    pub fn read_frame_into(&mut self, frame: u32, output: &mut [u8]) -> Result<(), GvError> {
        let entry = self.resolve(frame)?;
        let needed = self.frame_size();
        check_buffer(output, needed)?;

        let mut decompressed = std::mem::take(&mut self.decompressed);
        decompressed.resize(needed, 0);
        let result = self
            .fetch_decompressed(frame, entry, &mut decompressed)
            .and_then(|()| self.decode_texture(&decompressed, &mut output[..needed]));
        self.decompressed = decompressed;
        result
    }

    /// Return the decompressed, still block-compressed texture bytes of a frame
    pub fn read_frame_raw_compressed(&mut self, frame: u32) -> Result<Vec<u8>, GvError> {
        let mut raw = vec![0u8; self.frame_size()];
        self.read_frame_raw_compressed_into(frame, &mut raw)?;
        Ok(raw)
    }

    /// Write the decompressed, still block-compressed texture bytes of a frame into `output`.
    /// Returns the number of bytes written, always `width * height * 4`.
    pub fn read_frame_raw_compressed_into(&mut self, frame: u32, output: &mut [u8]) -> Result<usize, GvError> {
        let entry = self.resolve(frame)?;
        let needed = self.frame_size();
        check_buffer(output, needed)?;
        self.fetch_decompressed(frame, entry, &mut output[..needed])?;
        Ok(needed)
    }

    /// Seek to the payload, read it fully and decompress it into `output`
    fn fetch_decompressed(&mut self, frame: u32, entry: IndexEntry, output: &mut [u8]) -> Result<(), GvError> {
        let size = usize::try_from(entry.size)
            .map_err(|_| GvError::CorruptIndex(format!("frame {} payload size {} is not addressable", frame, entry.size)))?;

        self.reader.seek(SeekFrom::Start(entry.address))?;
        self.compressed.resize(size, 0);
        self.reader
            .read_exact(&mut self.compressed)
            .map_err(|e| GvError::from_read(e, "frame payload", entry.size))?;
        trace!("Frame {}: read {} bytes at offset {}", frame, size, entry.address);

        let written = self
            .decompressor
            .decompress_block(&self.compressed, output)
            .map_err(|e| GvError::DecompressionFailed(format!("frame {}: {}", frame, e)))?;
        if written != output.len() {
            return Err(GvError::DecompressionFailed(format!(
                "frame {}: decompressed {} bytes, expected {}",
                frame,
                written,
                output.len()
            )));
        }
        Ok(())
    }

    fn decode_texture(&self, data: &[u8], output: &mut [u8]) -> Result<(), GvError> {
        let header = &self.info.header;
        let format = header.texture_format()?;
        let layout = self
            .decoder
            .decode(format.fourcc(), header.width, header.height, data, output)
            .map_err(|e| GvError::DecodeFailed(e.to_string()))?;
        normalize_layout(layout, output)
    }
}

fn check_buffer(output: &[u8], needed: usize) -> Result<(), GvError> {
    if output.len() < needed {
        return Err(GvError::BufferTooSmall { needed, got: output.len() });
    }
    Ok(())
}
