//! Lossy-channel demonstration.
//!
//! Builds a deterministic payload, fountain-encodes it, and pushes the
//! stream through a simulated camera link that misses a fraction of frames
//! and delivers the rest out of order. Reports how many received blocks the
//! decoder needed relative to `k`, the number a perfect channel would need.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use qifi_codecs::codec_by_name;
use qifi_core::{Decoder, Encoder, EncodedBlock};

// ── constants ──────────────────────────────────────────────────────────────

/// Frames shuffled together; models a receiver catching frames late.
const REORDER_WINDOW: usize = 16;

/// Give up after this many transmitted frames per original block.
const MAX_SENT_PER_BLOCK: usize = 50;

const WORDS: &[&str] = &[
    "fountain", "snapshot", "camera", "frame", "payload", "symbol", "xor", "block",
    "degree", "soliton", "receiver", "sender", "checksum", "slice",
];

#[derive(Parser)]
#[command(name = "qifi-demo", about = "Simulate a lossy, reordering snapshot channel")]
struct Args {
    /// Payload size in bytes
    #[arg(long, default_value_t = 64 * 1024)]
    size: usize,
    /// Bytes per original block
    #[arg(long, default_value_t = 80)]
    slice_size: usize,
    /// Fraction of frames the receiver misses (0.0 – 0.95)
    #[arg(long, default_value_t = 0.5)]
    loss: f64,
    /// Random seed for payload, fountain and channel
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Codec applied before slicing
    #[arg(long, default_value = "deflate")]
    codec: String,
    /// Independent transfers to run
    #[arg(long, default_value_t = 5)]
    trials: u32,
}

// ── data generator ─────────────────────────────────────────────────────────

/// Word salad: compressible but not trivially so.
fn generate_payload(size: usize, rng: &mut StdRng) -> Vec<u8> {
    let mut out = Vec::with_capacity(size + 16);
    while out.len() < size {
        let word = WORDS[rng.gen_range(0..WORDS.len())];
        out.extend_from_slice(word.as_bytes());
        out.push(if rng.gen_ratio(1, 12) { b'\n' } else { b' ' });
    }
    out.truncate(size);
    out
}

// ── formatting ─────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const U: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut u = 0;
    while v >= 1024.0 && u < U.len() - 1 { v /= 1024.0; u += 1; }
    if u == 0 { format!("{n} B") } else { format!("{v:.2} {}", U[u]) }
}

fn fmt_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        format!("{ms:.1} ms")
    } else {
        format!("{:.2} s", d.as_secs_f64())
    }
}

// ── channel ────────────────────────────────────────────────────────────────

struct Transfer {
    sent: usize,
    received: usize,
    elapsed: Duration,
}

/// Stream frames through the lossy channel until the decoder completes.
/// Returns `None` if the send budget runs out first.
fn run_transfer(
    encoder: &Encoder,
    decoder: &mut Decoder,
    loss: f64,
    rng: &mut StdRng,
) -> Result<Option<Transfer>> {
    let budget = encoder.k() as usize * MAX_SENT_PER_BLOCK;
    let mut fountain = encoder.fountain_with_rng(StdRng::seed_from_u64(rng.gen()));
    let mut window: Vec<EncodedBlock> = Vec::with_capacity(REORDER_WINDOW);
    let mut sent = 0;
    let mut received = 0;
    let t0 = Instant::now();

    while sent < budget {
        window.clear();
        for block in fountain.by_ref().take(REORDER_WINDOW) {
            sent += 1;
            if !rng.gen_bool(loss) {
                window.push(block);
            }
        }
        window.shuffle(rng);

        for block in window.drain(..) {
            received += 1;
            if decoder.add_block(block)? {
                return Ok(Some(Transfer {
                    sent,
                    received,
                    elapsed: t0.elapsed(),
                }));
            }
        }
    }
    Ok(None)
}

// ── main ───────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let loss = args.loss.clamp(0.0, 0.95);
    let mut rng = StdRng::seed_from_u64(args.seed);

    let payload = generate_payload(args.size.max(1), &mut rng);
    let codec = codec_by_name(&args.codec)?;
    let encoder = Encoder::compressed(&payload, args.slice_size, codec.as_ref())?;
    let k = encoder.k() as usize;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              qifi lossy-channel demonstration            ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
    println!("  payload      : {}", human_bytes(payload.len() as u64));
    println!("  codec        : {}", codec.name());
    println!("  compressed   : {}", human_bytes(u64::from(encoder.header().byte_length)));
    println!("  slice size   : {} B", args.slice_size);
    println!("  k            : {k}");
    println!("  frame loss   : {:.0}%", loss * 100.0);
    println!("  reordering   : shuffled in windows of {REORDER_WINDOW}");
    println!();
    println!("  {:>5}  {:>8}  {:>8}  {:>9}  {:>10}", "trial", "sent", "received", "overhead", "time");
    println!("  {}", "─".repeat(48));

    let mut overheads = Vec::new();
    for trial in 1..=args.trials.max(1) {
        let mut decoder = Decoder::with_codec(codec.clone());
        match run_transfer(&encoder, &mut decoder, loss, &mut rng)? {
            Some(t) => {
                let recovered = decoder.decoded()?;
                anyhow::ensure!(
                    recovered.as_deref() == Some(payload.as_slice()),
                    "trial {trial}: recovered payload differs from the original"
                );
                let overhead = t.received as f64 / k as f64;
                overheads.push(overhead);
                println!(
                    "  {:>5}  {:>8}  {:>8}  {:>8.3}x  {:>10}",
                    trial,
                    t.sent,
                    t.received,
                    overhead,
                    fmt_duration(t.elapsed)
                );
            }
            None => println!(
                "  {:>5}  gave up after {} frames ({}/{} blocks)",
                trial,
                k * MAX_SENT_PER_BLOCK,
                decoder.decoded_count(),
                k
            ),
        }
    }

    println!();
    if overheads.is_empty() {
        anyhow::bail!("no trial completed");
    }
    let mean = overheads.iter().sum::<f64>() / overheads.len() as f64;
    let worst = overheads.iter().cloned().fold(0.0, f64::max);
    println!("  mean overhead  : {mean:.3}x received blocks per original block");
    println!("  worst overhead : {worst:.3}x");
    Ok(())
}
