//! gvvideo — random-access reader for GV compressed-texture video files, with a C ABI
//!
//! Rust callers use [`GvVideo`] directly. Native hosts go through the `GV_*` functions below,
//! which wrap one file-backed reader per handle and decode into caller-owned buffers.
use std::ffi::{c_char, c_float, c_int, c_uint, CStr, CString};
use std::fs::File;
use std::io::BufReader;
use std::slice;

pub mod cache;
pub mod codec;
pub mod dxt;
pub mod formats;
pub mod playback;
#[cfg(any(test, feature = "testlib"))]
#[doc(hidden)]
pub mod testlib;
pub mod video;

pub use cache::FrameCache;
pub use codec::{BlockDecompressor, CodecError, DxtDecoder, Lz4Block, PixelLayout, TextureDecoder};
pub use formats::{FrameIndex, GvError, Header, IndexEntry, TextureFormat};
pub use playback::Timebase;
pub use video::{GvVideo, VideoInfo};

/// Opaque handle for C callers. Not thread-safe: one handle per thread, or external locking.
pub struct GvHandle {
    video: Option<GvVideo<BufReader<File>>>,
    last_error_code: i32,
    last_error_text: CString,
}

impl GvHandle {
    fn new() -> Self {
        Self {
            video: None,
            last_error_code: 0,
            last_error_text: CString::from(c"OK"),
        }
    }

    fn set_ok(&mut self) {
        self.last_error_code = 0;
        self.last_error_text = CString::from(c"OK");
    }

    fn set_error(&mut self, err: &GvError) {
        self.last_error_code = err.code();
        self.last_error_text = CString::new(err.to_string()).unwrap_or_default();
    }

    fn record<T>(&mut self, result: Result<T, GvError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.set_ok();
                Some(value)
            }
            Err(err) => {
                self.set_error(&err);
                None
            }
        }
    }

    fn header(&self) -> Option<&Header> {
        self.video.as_ref().map(|video| video.header())
    }
}

/// Error code reported when a call is made before a file was opened
pub const GV_ERROR_NOT_OPEN: c_int = 100;

const PLUGIN_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

#[no_mangle]
pub extern "C" fn GV_create() -> *mut GvHandle {
    Box::into_raw(Box::new(GvHandle::new()))
}

#[no_mangle]
pub extern "C" fn GV_destroy(handle: *mut GvHandle) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)); }
    }
}

#[no_mangle]
pub extern "C" fn GV_get_name(_handle: *mut GvHandle) -> *const c_char {
    c"gvvideo-rs".as_ptr()
}

#[no_mangle]
pub extern "C" fn GV_get_version(_handle: *mut GvHandle) -> *const c_char {
    PLUGIN_VERSION.as_ptr().cast()
}

#[no_mangle]
pub extern "C" fn GV_get_last_error_code(handle: *mut GvHandle) -> c_int {
    if handle.is_null() { return -1; }
    unsafe { (*handle).last_error_code }
}

#[no_mangle]
pub extern "C" fn GV_get_last_error_text(handle: *mut GvHandle) -> *const c_char {
    if handle.is_null() { return c"Invalid handle".as_ptr(); }
    unsafe { (*handle).last_error_text.as_ptr() }
}

/// Open the GV file at `path` (UTF-8). Replaces any file previously opened on this handle.
#[no_mangle]
pub extern "C" fn GV_open(handle: *mut GvHandle, path: *const c_char) -> bool {
    if handle.is_null() || path.is_null() {
        return false;
    }
    let h = unsafe { &mut *handle };
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    match h.record(GvVideo::open(&path)) {
        Some(video) => {
            h.video = Some(video);
            true
        }
        None => {
            h.video = None;
            false
        }
    }
}

#[no_mangle]
pub extern "C" fn GV_get_width(handle: *mut GvHandle) -> c_uint {
    if handle.is_null() { return 0; }
    unsafe { (*handle).header().map_or(0, |h| h.width) }
}

#[no_mangle]
pub extern "C" fn GV_get_height(handle: *mut GvHandle) -> c_uint {
    if handle.is_null() { return 0; }
    unsafe { (*handle).header().map_or(0, |h| h.height) }
}

#[no_mangle]
pub extern "C" fn GV_get_total_frames(handle: *mut GvHandle) -> c_uint {
    if handle.is_null() { return 0; }
    unsafe { (*handle).header().map_or(0, |h| h.frame_count) }
}

#[no_mangle]
pub extern "C" fn GV_get_fps(handle: *mut GvHandle) -> c_float {
    if handle.is_null() { return 0.0; }
    unsafe { (*handle).header().map_or(0.0, |h| h.fps) }
}

#[no_mangle]
pub extern "C" fn GV_get_format(handle: *mut GvHandle) -> c_uint {
    if handle.is_null() { return 0; }
    unsafe { (*handle).header().map_or(0, |h| h.format) }
}

/// Bytes needed for one frame buffer (`width * height * 4`)
#[no_mangle]
pub extern "C" fn GV_get_frame_size(handle: *mut GvHandle) -> usize {
    if handle.is_null() { return 0; }
    unsafe { (*handle).header().map_or(0, Header::frame_size) }
}

/// Split a raw handle and output buffer into safe references, recording "not open" errors.
///
/// # Safety
/// `handle` must come from `GV_create`, `out` must point to `len` writable bytes.
unsafe fn with_video<T>(
    handle: *mut GvHandle,
    out: *mut u8,
    len: usize,
    f: impl FnOnce(&mut GvVideo<BufReader<File>>, &mut [u8]) -> Result<T, GvError>,
) -> Option<T> {
    if handle.is_null() || out.is_null() {
        return None;
    }
    let h = &mut *handle;
    let Some(video) = h.video.as_mut() else {
        h.last_error_code = GV_ERROR_NOT_OPEN;
        h.last_error_text = CString::from(c"No file open");
        return None;
    };
    let buffer = slice::from_raw_parts_mut(out, len);
    let result = f(video, buffer);
    h.record(result)
}

/// Decode frame `frame_index` as straight RGBA into `out` (at least `GV_get_frame_size` bytes).
#[no_mangle]
pub extern "C" fn GV_read_frame_into(handle: *mut GvHandle, frame_index: c_uint, out: *mut u8, len: usize) -> bool {
    unsafe { with_video(handle, out, len, |video, buf| video.read_frame_into(frame_index, buf)).is_some() }
}

/// Copy the decompressed, still block-compressed texture bytes of a frame into `out`.
/// Stores the number of bytes written in `written` when it is not null.
#[no_mangle]
pub extern "C" fn GV_read_frame_raw_into(
    handle: *mut GvHandle,
    frame_index: c_uint,
    out: *mut u8,
    len: usize,
    written: *mut usize,
) -> bool {
    let result = unsafe {
        with_video(handle, out, len, |video, buf| video.read_frame_raw_compressed_into(frame_index, buf))
    };
    match result {
        Some(n) => {
            if !written.is_null() {
                unsafe { *written = n; }
            }
            true
        }
        None => false,
    }
}

/// Returns the crate semantic version string.
pub fn version() -> &'static str { env!("CARGO_PKG_VERSION") }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn version_is_semver_like() { assert!(version().split('.').count() >= 3); }

    #[test]
    fn ffi_reports_not_open() {
        let handle = GV_create();
        let mut buf = vec![0u8; 16];
        assert!(!GV_read_frame_into(handle, 0, buf.as_mut_ptr(), buf.len()));
        assert_eq!(GV_get_last_error_code(handle), GV_ERROR_NOT_OPEN);
        assert_eq!(GV_get_frame_size(handle), 0);
        GV_destroy(handle);
    }

    #[test]
    fn ffi_open_missing_file() {
        let handle = GV_create();
        let path = CString::new("/nonexistent/clip.gv").unwrap();
        assert!(!GV_open(handle, path.as_ptr()));
        assert_eq!(GV_get_last_error_code(handle), GvError::Io(std::io::Error::other("x")).code());
        GV_destroy(handle);
    }

    #[test]
    fn ffi_decode_frame() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&testlib::sample_clip()).unwrap();
        file.flush().unwrap();

        let handle = GV_create();
        let path = CString::new(file.path().to_str().unwrap()).unwrap();
        assert!(GV_open(handle, path.as_ptr()));
        assert_eq!(GV_get_width(handle), 10);
        assert_eq!(GV_get_total_frames(handle), 5);
        assert_eq!(GV_get_format(handle), 1);

        let mut buf = vec![0u8; GV_get_frame_size(handle)];
        assert!(GV_read_frame_into(handle, 3, buf.as_mut_ptr(), buf.len()));
        assert_eq!(&buf[..4], &[255, 0, 0, 255]);
        assert_eq!(GV_get_last_error_code(handle), 0);

        let mut written = 0usize;
        assert!(GV_read_frame_raw_into(handle, 3, buf.as_mut_ptr(), buf.len(), &mut written));
        assert_eq!(written, 400);

        assert!(!GV_read_frame_into(handle, 5, buf.as_mut_ptr(), buf.len()));
        assert_eq!(GV_get_last_error_code(handle), 4);
        assert!(!GV_read_frame_into(handle, 0, buf.as_mut_ptr(), 10));
        assert_eq!(GV_get_last_error_code(handle), 5);
        GV_destroy(handle);
    }
}
