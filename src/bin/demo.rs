use std::fs::{metadata, File};
use std::io::{BufWriter, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use gvvideo::{FrameCache, GvVideo, Timebase};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let gv_path = match args.next() {
        Some(val) => val,
        None => {
            eprintln!("Missing required argument: gv_path");
            print_usage_and_exit();
        }
    };

    let mut raw_only = false;
    let mut cache_passes: Option<usize> = None;
    let mut dump: Option<(u32, String)> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--raw" => raw_only = true,
            "--loop-cache" => match args.next().and_then(|v| v.parse::<usize>().ok()) {
                Some(passes) => cache_passes = Some(passes),
                None => {
                    eprintln!("Expected a pass count after --loop-cache");
                    print_usage_and_exit();
                }
            },
            "--dump" => {
                let frame = args.next().and_then(|v| v.parse::<u32>().ok());
                let out = args.next();
                match (frame, out) {
                    (Some(frame), Some(out)) => dump = Some((frame, out)),
                    _ => {
                        eprintln!("Expected a frame number and an output path after --dump");
                        print_usage_and_exit();
                    }
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", arg);
                print_usage_and_exit();
            }
        }
    }

    let file_size = match metadata(&gv_path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            eprintln!("Failed to get file metadata: {}", e);
            process::exit(1);
        }
    };

    let mut video = match GvVideo::open_mmap(&gv_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Could not open GV file: {}", e);
            process::exit(1);
        }
    };

    let header = *video.header();
    println!("File size: {} bytes", file_size);
    println!();
    println!("Dimensions: {}x{}", header.width, header.height);
    println!("Frame count: {}", header.frame_count);
    println!("FPS: {}", header.fps);
    match header.texture_format() {
        Ok(format) => println!("Format: {} ({})", header.format, format.fourcc()),
        Err(_) => println!("Format: {} (unsupported)", header.format),
    }
    println!("Frame bytes (advisory): {}", header.frame_bytes);
    if let Some(timebase) = Timebase::from_header(&header) {
        println!("Duration: {:.3} s", timebase.duration().as_secs_f64());
    }

    if let Some((frame, out)) = dump {
        if let Err(e) = dump_ppm(&mut video, frame, &out) {
            eprintln!("Failed to dump frame {}: {}", frame, e);
            process::exit(1);
        }
        println!("Wrote frame {} to {}", frame, out);
        return;
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst)) {
            log::warn!("Could not install Ctrl-C handler: {}", e);
        }
    }

    // Iterate over all frames with progress indicator, reusing one output buffer
    println!("Decoding all frames{}...", if raw_only { " (decompress only)" } else { "" });
    let total = header.frame_count;
    let mut buffer = vec![0u8; video.frame_size()];
    let mut last_percent = 0;
    let mut failures = 0u32;
    let start = Instant::now();
    let mut decoded = 0u32;
    for frame_idx in 0..total {
        if interrupted.load(Ordering::SeqCst) {
            println!("\nInterrupted.");
            break;
        }
        let result = if raw_only {
            video.read_frame_raw_compressed_into(frame_idx, &mut buffer).map(|_| ())
        } else {
            video.read_frame_into(frame_idx, &mut buffer)
        };
        match result {
            Ok(()) => decoded += 1,
            Err(e) => {
                eprintln!("\nError: frame {}: {}", frame_idx, e);
                failures += 1;
            }
        }
        let percent = ((frame_idx + 1) * 100 / total).min(100);
        if percent != last_percent && (percent % 5 == 0 || percent == 100) {
            print!("\rProgress: {:3}% ({}/{} frames)", percent, frame_idx + 1, total);
            let _ = std::io::stdout().flush();
            last_percent = percent;
        }
    }
    let elapsed = start.elapsed();
    println!("\nDone decoding.");
    println!("Decoded {} frames in {:.3} seconds ({:.2} ms/frame), {} failed",
        decoded,
        elapsed.as_secs_f64(),
        if decoded > 0 { elapsed.as_secs_f64() * 1000.0 / decoded as f64 } else { 0.0 },
        failures
    );

    if let Some(passes) = cache_passes {
        let cache = FrameCache::new(total as usize);
        let start = Instant::now();
        for _ in 0..passes {
            for frame_idx in 0..total {
                if interrupted.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = cache.get_or_decode(&mut video, frame_idx) {
                    log::debug!("Frame {} not cached: {}", frame_idx, e);
                }
            }
        }
        println!("Cached playback: {} passes in {:.3} seconds, {} frames resident",
            passes,
            start.elapsed().as_secs_f64(),
            cache.len()
        );
    }

    if failures > 0 {
        process::exit(2);
    }
}

/// Write one decoded frame as a binary PPM (alpha dropped)
fn dump_ppm<R, D, T>(video: &mut GvVideo<R, D, T>, frame: u32, path: &str) -> Result<(), Box<dyn std::error::Error>>
where
    R: std::io::Read + std::io::Seek,
    D: gvvideo::BlockDecompressor,
    T: gvvideo::TextureDecoder,
{
    let pixels = video.read_frame(frame)?;
    let header = video.header();
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", header.width, header.height)?;
    for px in pixels.chunks_exact(4) {
        out.write_all(&px[..3])?;
    }
    out.flush()?;
    Ok(())
}

fn print_usage_and_exit() -> ! {
    eprintln!("Usage: demo <gv_path> [--raw] [--loop-cache <passes>] [--dump <frame> <out.ppm>]");
    process::exit(1);
}
