/// Integration tests: full sender → channel → receiver transfers.
///
/// Each test builds an encoder over deterministic data, drives a decoder
/// with blocks from it (sometimes through a lossy, reordering channel), and
/// checks the reconstructed bytes against the original.
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use qifi_codecs::{DeflateCodec, Lz4Codec, PassThroughCodec, ZstdCodec};
use qifi_core::{
    append_file_meta, checksum, parse_frame, read_file_meta, Base64Renderer, Codec, DecodeError,
    Decoder, EncodedBlock, Encoder, FileMeta, FountainConfig, Generator, Renderer,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

/// Feed fountain blocks until the decoder completes; return how many it took.
fn drain_fountain(encoder: &Encoder, decoder: &mut Decoder, seed: u64, cap: usize) -> usize {
    for (n, block) in encoder
        .fountain_with_rng(StdRng::seed_from_u64(seed))
        .take(cap)
        .enumerate()
    {
        if decoder.add_block(block).unwrap() {
            return n + 1;
        }
    }
    panic!("decoder incomplete after {cap} blocks (k = {})", encoder.k());
}

fn roundtrip_with(codec: Arc<dyn Codec>, data: &[u8]) {
    let encoder = Encoder::compressed(data, 64, codec.as_ref()).unwrap();
    let mut decoder = Decoder::with_codec(codec.clone());
    drain_fountain(&encoder, &mut decoder, 7, encoder.k() as usize * 20);
    assert_eq!(
        decoder.decoded().unwrap().as_deref(),
        Some(data),
        "{} round-trip should be byte-exact",
        codec.name()
    );
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_every_codec() {
    let data = compressible_bytes(20_000);
    roundtrip_with(Arc::new(DeflateCodec::default()), &data);
    roundtrip_with(Arc::new(ZstdCodec::default()), &data);
    roundtrip_with(Arc::new(Lz4Codec), &data);
    roundtrip_with(Arc::new(PassThroughCodec), &data);
}

#[test]
fn test_roundtrip_uncompressed() {
    let data = pseudo_random_bytes(3_000, 11);
    let encoder = Encoder::new(&data, 50).unwrap();
    assert_eq!(encoder.k(), 60);
    let mut decoder = Decoder::new();
    drain_fountain(&encoder, &mut decoder, 3, 60 * 20);
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}

/// A receiver holding a codec still recovers a session sent uncompressed.
#[test]
fn test_codec_receiver_accepts_uncompressed_sender() {
    let data = pseudo_random_bytes(1_000, 5);
    let encoder = Encoder::new(&data, 40).unwrap();
    let mut decoder = Decoder::with_codec(Arc::new(DeflateCodec::default()));
    drain_fountain(&encoder, &mut decoder, 9, 25 * 20);
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}

/// Compression shrinks `k` and therefore the number of frames to show.
#[test]
fn test_compression_reduces_block_count() {
    let data = compressible_bytes(10_000);
    let plain = Encoder::new(&data, 80).unwrap();
    let packed = Encoder::compressed(&data, 80, &DeflateCodec::default()).unwrap();
    assert_eq!(plain.k(), 125);
    assert!(packed.k() < plain.k() / 10, "deflate k = {}", packed.k());
    assert_eq!(packed.header().checksum, checksum(&data, packed.k()));
}

/// Half the frames lost, the rest shuffled: the decoder still finishes, on
/// average well inside 2.5 × k received blocks.
#[test]
fn test_lossy_shuffled_channel() {
    let data = pseudo_random_bytes(4_000, 99);
    let encoder = Encoder::new(&data, 50).unwrap();
    let k = encoder.k() as usize;
    let mut total_received = 0;
    const TRIALS: u64 = 20;

    for trial in 0..TRIALS {
        let mut channel = StdRng::seed_from_u64(1_000 + trial);
        let mut delivered: Vec<EncodedBlock> = encoder
            .fountain_with_rng(StdRng::seed_from_u64(trial))
            .take(k * 20)
            .filter(|_| channel.gen_bool(0.5))
            .collect();
        delivered.shuffle(&mut channel);

        let mut decoder = Decoder::new();
        let received = delivered
            .into_iter()
            .position(|block| decoder.add_block(block).unwrap())
            .map(|p| p + 1)
            .unwrap_or_else(|| panic!("trial {trial}: channel ran dry"));
        assert!(received <= k * 10, "trial {trial}: needed {received} blocks for k = {k}");
        assert_eq!(decoder.decoded().unwrap().as_deref(), Some(data.as_slice()));
        total_received += received;
    }

    let mean = total_received as f64 / (TRIALS as f64 * k as f64);
    assert!(mean < 2.5, "mean overhead {mean:.2}x");
}

/// {0,1,2}, then {1,2}, then {0,2}: the second block alone frees block 0.
#[test]
fn test_three_block_cross_resolution() {
    let data = pseudo_random_bytes(30, 1);
    let encoder = Encoder::new(&data, 10).unwrap();
    let mut decoder = Decoder::new();

    assert!(!decoder.add_block(encoder.create_block(&[0, 1, 2]).unwrap()).unwrap());
    assert!(!decoder.add_block(encoder.create_block(&[1, 2]).unwrap()).unwrap());
    assert_eq!(decoder.decoded_count(), 1);
    assert_eq!(decoder.decoded_block(0), Some(&data[..10]));

    assert!(decoder.add_block(encoder.create_block(&[0, 2]).unwrap()).unwrap());
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}

#[test]
fn test_foreign_session_block_rejected() {
    let a = Encoder::new(&pseudo_random_bytes(500, 1), 50).unwrap();
    let b = Encoder::new(&pseudo_random_bytes(500, 2), 50).unwrap();
    let mut decoder = Decoder::new();
    decoder.add_block(a.create_block(&[0, 1]).unwrap()).unwrap();
    let before = decoder.status();

    let err = decoder.add_block(b.create_block(&[2]).unwrap()).unwrap_err();
    assert_eq!(
        err,
        DecodeError::ChecksumMismatchOnIngest {
            expected: a.header().checksum,
            got: b.header().checksum,
        }
    );
    assert_eq!(decoder.status(), before);

    // The session carries on with its own blocks.
    drain_fountain(&a, &mut decoder, 4, 10 * 20);
    assert!(decoder.is_complete());
}

/// Arrival order and repeats do not change the result.
#[test]
fn test_order_and_duplicates_do_not_matter() {
    let data = pseudo_random_bytes(1_200, 8);
    let encoder = Encoder::new(&data, 40).unwrap();

    let mut reference = Decoder::new();
    let needed = drain_fountain(&encoder, &mut reference, 21, 30 * 20);
    let blocks: Vec<EncodedBlock> = encoder
        .fountain_with_rng(StdRng::seed_from_u64(21))
        .take(needed)
        .collect();

    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..5 {
        let mut replay = blocks.clone();
        replay.extend(blocks.iter().take(needed / 2).cloned());
        replay.shuffle(&mut rng);

        let mut decoder = Decoder::new();
        for block in replay {
            decoder.add_block(block).unwrap();
        }
        assert!(decoder.is_complete());
        assert_eq!(decoder.decoded().unwrap(), reference.decoded().unwrap());
    }
}

#[test]
fn test_wire_bytes_survive_transport() {
    let data = compressible_bytes(2_000);
    let codec = Arc::new(ZstdCodec::new(9));
    let encoder = Encoder::compressed(&data, 32, codec.as_ref()).unwrap();
    let mut decoder = Decoder::with_codec(codec);

    for block in encoder.fountain_with_rng(StdRng::seed_from_u64(2)).take(2_000) {
        let parsed = EncodedBlock::from_bytes(&block.to_bytes()).unwrap();
        if decoder.add_block(parsed).unwrap() {
            break;
        }
    }
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}

/// The CLI path without the CLI: envelope, compression, base64 frames with a
/// URL prefix, a lossy channel, and unwrapping on the far side.
#[test]
fn test_envelope_and_frames_end_to_end() {
    let prefix = "https://qrss.netlify.app/#";
    let file = pseudo_random_bytes(700, 3);
    let meta = FileMeta {
        filename: Some("notes.bin".into()),
        content_type: "application/x-test".into(),
    };
    let wrapped = append_file_meta(&file, &meta).unwrap();

    let config = FountainConfig {
        slice_size: 80,
        ..FountainConfig::default()
    };
    let codec: Arc<dyn Codec> = Arc::new(DeflateCodec::default());
    let encoder = Encoder::with_config(&wrapped, &config, codec.as_ref()).unwrap();
    let renderer = Base64Renderer::new(Some(prefix.into()));

    let mut decoder = Decoder::with_config(&config, codec);
    let mut channel = StdRng::seed_from_u64(12);
    let mut done = false;
    for block in encoder.fountain_with_rng(StdRng::seed_from_u64(13)).take(2_000) {
        let frame = renderer.render(&block).unwrap();
        if channel.gen_bool(0.3) {
            continue;
        }
        if decoder.add_block(parse_frame(&frame, Some(prefix)).unwrap()).unwrap() {
            done = true;
            break;
        }
    }
    assert!(done);

    let (data, back) = read_file_meta(&decoder.decoded().unwrap().unwrap()).unwrap();
    assert_eq!(data, file);
    assert_eq!(back, meta);
}

#[test]
fn test_generator_frames_decode() {
    let data = compressible_bytes(900);
    let generator = Generator::new(Encoder::new(&data, 100).unwrap(), Base64Renderer::default());
    let mut decoder = Decoder::new();
    for frame in generator.fountain().take(9 * 50) {
        if decoder.add_block(parse_frame(&frame.unwrap(), None).unwrap()).unwrap() {
            break;
        }
    }
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}

#[test]
fn test_single_byte_payload() {
    let encoder = Encoder::new(&[0x5a], 16).unwrap();
    assert_eq!(encoder.k(), 1);
    let mut decoder = Decoder::new();
    assert!(decoder.add_block(encoder.fountain().next().unwrap()).unwrap());
    assert_eq!(decoder.decoded().unwrap(), Some(vec![0x5a]));
}

#[test]
fn test_slice_size_one() {
    let data = b"tiny slices".to_vec();
    let encoder = Encoder::new(&data, 1).unwrap();
    assert_eq!(encoder.k() as usize, data.len());
    let mut decoder = Decoder::new();
    drain_fountain(&encoder, &mut decoder, 31, data.len() * 100);
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}

/// Seeding a decoder with the sender's codec recovers a compressed session,
/// through either seeding entry point.
#[test]
fn test_seeded_decoder_inflates_compressed_session() {
    let data = compressible_bytes(3_000);
    let codec: Arc<dyn Codec> = Arc::new(DeflateCodec::default());
    let encoder = Encoder::compressed(&data, 16, codec.as_ref()).unwrap();
    let k = encoder.k() as usize;
    let blocks: Vec<EncodedBlock> = encoder
        .fountain_with_rng(StdRng::seed_from_u64(17))
        .take(k * 20)
        .collect();

    let decoder = Decoder::from_blocks(blocks.clone(), Some(codec.clone())).unwrap();
    assert!(decoder.is_complete());
    assert_eq!(decoder.decoded().unwrap().as_deref(), Some(data.as_slice()));

    let decoder = Decoder::with_codec(codec).seed(blocks.clone()).unwrap();
    assert_eq!(decoder.decoded().unwrap().as_deref(), Some(data.as_slice()));

    // Without the codec only the raw bytes can verify, and they do not.
    let decoder = Decoder::from_blocks(blocks, None).unwrap();
    assert!(decoder.is_complete());
    assert!(matches!(
        decoder.decoded(),
        Err(DecodeError::ChecksumMismatchOnReconstruct { .. })
    ));
}

/// The same payload sliced two ways carries two different session checksums,
/// so blocks from one slicing are rejected by a decoder of the other.
#[test]
fn test_slice_size_changes_session_checksum() {
    let data = pseudo_random_bytes(400, 6);
    let coarse = Encoder::new(&data, 20).unwrap();
    let fine = Encoder::new(&data, 10).unwrap();
    assert_ne!(coarse.header().checksum, fine.header().checksum);

    let mut decoder = Decoder::new();
    decoder.add_block(coarse.create_block(&[0]).unwrap()).unwrap();
    assert!(matches!(
        decoder.add_block(fine.create_block(&[0]).unwrap()),
        Err(DecodeError::ChecksumMismatchOnIngest { .. })
    ));
}

/// A 10 000-link chain of degree-2 equations unravels from a single degree-1
/// block through the work list, without deep recursion.
#[test]
fn test_long_degree_two_chain_resolves() {
    const K: u32 = 10_000;
    let data = pseudo_random_bytes(K as usize, 23);
    let encoder = Encoder::new(&data, 1).unwrap();
    assert_eq!(encoder.k(), K);

    let mut decoder = Decoder::new();
    for i in 0..K - 1 {
        assert!(!decoder.add_block(encoder.create_block(&[i, i + 1]).unwrap()).unwrap());
    }
    assert_eq!(decoder.decoded_count(), 0);
    assert_eq!(decoder.pending_equations(), K as usize - 1);

    assert!(decoder.add_block(encoder.create_block(&[0]).unwrap()).unwrap());
    assert_eq!(decoder.pending_equations(), 0);
    assert_eq!(decoder.decoded().unwrap(), Some(data));
}
