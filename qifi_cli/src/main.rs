use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use qifi_codecs::codec_by_name;
use qifi_core::envelope::DEFAULT_CONTENT_TYPE;
use qifi_core::{
    append_file_meta, parse_frame, read_file_meta, Base64Renderer, Decoder, Encoder, FileMeta,
    FountainConfig, Generator,
};

/// QR-friendly default; larger slices make denser symbols.
const CLI_SLICE_SIZE: usize = 80;

/// Used when neither `--output` nor the envelope names a file.
const FALLBACK_FILENAME: &str = "received.bin";

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "qifi",
    about = "Send files over one-way snapshot channels as fountain-coded text frames",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file and print one base64 frame per line
    Send {
        /// File to send ("-" reads stdin)
        file: PathBuf,
        /// Bytes per original block
        #[arg(short, long, default_value_t = CLI_SLICE_SIZE)]
        slice_size: usize,
        /// Frames per second when streaming without --count
        #[arg(short, long, default_value_t = 10)]
        fps: u32,
        /// URL prepended to every frame so phone cameras open a receiver page
        #[arg(short, long)]
        prefix: Option<String>,
        /// Codec applied before slicing: deflate | zstd | lz4 | passthrough
        #[arg(long, default_value = "deflate")]
        codec: String,
        /// Slice the file as-is
        #[arg(long)]
        no_compress: bool,
        /// MIME type recorded in the envelope
        #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,
        /// Emit this many frames and stop instead of streaming forever
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Write frames to a file instead of stdout (needs --count)
        #[arg(short, long, requires = "count")]
        output: Option<PathBuf>,
    },
    /// Rebuild a file from frames, one per line
    ///
    /// Unreadable or foreign frames are skipped with a warning; reading stops
    /// as soon as the payload is complete.
    Receive {
        /// File of frames ("-" reads stdin)
        frames: PathBuf,
        /// Destination file (default: the name carried in the envelope)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// URL prefix to strip from each frame
        #[arg(short, long)]
        prefix: Option<String>,
        /// Codec the sender used
        #[arg(long, default_value = "deflate")]
        codec: String,
    },
    /// Print the header and index list of a single frame
    Inspect {
        /// Frame text
        frame: String,
        /// URL prefix to strip
        #[arg(short, long)]
        prefix: Option<String>,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if path.to_str() == Some("-") {
        io::stdin().lock().read_to_end(&mut buf)?;
    } else {
        File::open(path)
            .with_context(|| format!("opening input file {:?}", path))?
            .read_to_end(&mut buf)?;
    }
    Ok(buf)
}

/// Keep only the final path component of a sender-supplied name.
fn safe_filename(name: &str) -> Option<PathBuf> {
    Path::new(name)
        .file_name()
        .filter(|n| !n.is_empty())
        .map(PathBuf::from)
}

// ── Subcommand implementations ─────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_send(
    file: PathBuf,
    slice_size: usize,
    fps: u32,
    prefix: Option<String>,
    codec_name: &str,
    no_compress: bool,
    content_type: String,
    count: Option<usize>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let data = read_input(&file)?;
    let meta = FileMeta {
        filename: file
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| *n != "-")
            .map(str::to_string),
        content_type,
    };
    let wrapped = append_file_meta(&data, &meta)?;

    let config = FountainConfig {
        slice_size,
        compress: !no_compress,
        ..FountainConfig::default()
    };
    let codec = codec_by_name(codec_name)?;
    let encoder = Encoder::with_config(&wrapped, &config, codec.as_ref())
        .with_context(|| format!("encoding {:?}", file))?;

    info!(
        file = ?file,
        size = %human_bytes(data.len() as u64),
        k = encoder.k(),
        slice_size,
        codec = encoder.codec_name().unwrap_or("none"),
        checksum = format_args!("{:08x}", encoder.header().checksum),
        "sending"
    );

    let mut sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating output file {:?}", path))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let generator = Generator::new(encoder, Base64Renderer::new(prefix));
    let frames = generator.fountain();

    match count {
        Some(n) => {
            for frame in frames.take(n) {
                writeln!(sink, "{}", frame?)?;
            }
            sink.flush()?;
            info!(frames = n, "done");
        }
        None => {
            let interval = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
            for frame in frames {
                let t0 = Instant::now();
                writeln!(sink, "{}", frame?)?;
                sink.flush()?;
                if let Some(rest) = interval.checked_sub(t0.elapsed()) {
                    thread::sleep(rest);
                }
            }
        }
    }
    Ok(())
}

fn run_receive(
    frames: PathBuf,
    output: Option<PathBuf>,
    prefix: Option<String>,
    codec_name: &str,
) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead> = if frames.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(&frames).with_context(|| format!("opening frames file {:?}", frames))?,
        ))
    };

    let mut decoder = Decoder::with_codec(codec_by_name(codec_name)?);
    let t0 = Instant::now();
    let mut complete = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let block = match parse_frame(&line, prefix.as_deref()) {
            Ok(block) => block,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping unreadable frame");
                continue;
            }
        };
        match decoder.add_block(block) {
            Ok(true) => {
                complete = true;
                break;
            }
            Ok(false) => debug!(
                line = line_no + 1,
                decoded = decoder.decoded_count(),
                "frame accepted"
            ),
            Err(e) => warn!(line = line_no + 1, error = %e, "skipping rejected frame"),
        }
    }

    if !complete {
        let status = decoder.status();
        anyhow::bail!(
            "frames ran out after {} blocks: {}/{} original blocks recovered",
            status.encoded_count,
            status.decoded_count,
            status.k
        );
    }

    let wrapped = decoder
        .decoded()?
        .context("decoder reported completion without a payload")?;
    let (data, meta) = read_file_meta(&wrapped)?;

    let path = output
        .or_else(|| meta.filename.as_deref().and_then(safe_filename))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_FILENAME));
    File::create(&path)
        .with_context(|| format!("creating output file {:?}", path))?
        .write_all(&data)?;

    let k = decoder.header().map(|h| h.k).unwrap_or_default();
    info!(
        path = ?path,
        size = %human_bytes(data.len() as u64),
        content_type = %meta.content_type,
        blocks = decoder.encoded_count(),
        k,
        overhead = format_args!("{:.2}x", decoder.encoded_count() as f64 / f64::from(k.max(1))),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "received"
    );
    Ok(())
}

fn run_inspect(frame: &str, prefix: Option<&str>) -> anyhow::Result<()> {
    let block = parse_frame(frame, prefix)?;
    let h = block.header;
    let slice_size = block.payload.len();

    println!("Frame");
    println!("  degree        : {}", block.degree());
    println!("  indices       : {:?}", block.indices);
    println!("  k             : {}", h.k);
    println!("  byte length   : {} ({})", h.byte_length, human_bytes(u64::from(h.byte_length)));
    println!("  checksum      : {:08x}", h.checksum);
    println!("  slice size    : {}", slice_size);
    println!("  header bytes  : {}", block.header_len());
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    match cli.command {
        Commands::Send {
            file,
            slice_size,
            fps,
            prefix,
            codec,
            no_compress,
            content_type,
            count,
            output,
        } => run_send(
            file,
            slice_size,
            fps,
            prefix,
            &codec,
            no_compress,
            content_type,
            count,
            output,
        ),
        Commands::Receive {
            frames,
            output,
            prefix,
            codec,
        } => run_receive(frames, output, prefix, &codec),
        Commands::Inspect { frame, prefix } => run_inspect(&frame, prefix.as_deref()),
    }
}
