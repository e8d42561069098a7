use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::checksum::checksum;
use crate::codec::Codec;
use crate::config::{FountainConfig, DEFAULT_MAX_CASCADE_STEPS};
use crate::error::DecodeError;
use crate::format::{xor_into, EncodedBlock, EncodedHeader};

/// Stable handle of a pending equation inside the decoder arena.
type EquationId = u64;

/// Sorted index set identifying an equation.
type Key = Vec<u32>;

/// An equation being worked on: `payload` is the XOR of the original blocks
/// in `indices` (sorted, distinct).
#[derive(Debug)]
struct Equation {
    indices: Key,
    payload: Vec<u8>,
}

/// An equation of degree ≥ 2 parked until more of its indices are known.
#[derive(Debug)]
struct Pending {
    equation: Equation,
    /// Waitlist keys this equation is registered under.
    waiting_on: Vec<Key>,
}

/// Snapshot of decoder progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecoderStatus {
    pub k: u32,
    pub checksum: u32,
    pub decoded_count: usize,
    pub encoded_count: usize,
    pub pending_equations: usize,
}

/// Incremental fountain decoder.
///
/// # Resolution
/// Every accepted block becomes an equation and goes through the same steps:
/// 1. Drop it if an equation with the same index set is stored, or every
///    index is already decoded.
/// 2. XOR out every decoded index.
/// 3. Degree > 2: look for a stored equation equal to this one minus a single
///    index. The first one found leaves exactly that index. If none exists,
///    register under every "minus one index" key so a later, smaller
///    equation can finish the job.
/// 4. Degree > 1: store it, index it by each of its indices, and combine it
///    with every stored superset that was waiting on exactly this key.
/// 5. Degree 1: record the original block, then pull every stored equation
///    that mentions it back onto the work list.
///
/// Cascades run on an explicit work list, never the call stack. Pending
/// equations live in an arena keyed by [`EquationId`]; the index, key, and
/// waitlist maps only hold ids, so retiring an equation means removing its
/// id from each of them.
///
/// Blocks may arrive in any order, any number of times.
pub struct Decoder {
    header: Option<EncodedHeader>,
    slice_size: usize,
    decoded: Vec<Option<Vec<u8>>>,
    decoded_count: usize,
    encoded_count: usize,
    equations: HashMap<EquationId, Pending>,
    next_id: EquationId,
    by_key: HashMap<Key, EquationId>,
    by_index: HashMap<u32, HashSet<EquationId>>,
    waitlist: HashMap<Key, HashSet<EquationId>>,
    codec: Option<Arc<dyn Codec>>,
    max_cascade_steps: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("header", &self.header)
            .field("decoded_count", &self.decoded_count)
            .field("encoded_count", &self.encoded_count)
            .field("pending", &self.equations.len())
            .field("codec", &self.codec.as_ref().map(|c| c.name()))
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Decoder that verifies the reassembled bytes as-is (no decompression).
    pub fn new() -> Self {
        Self {
            header: None,
            slice_size: 0,
            decoded: Vec::new(),
            decoded_count: 0,
            encoded_count: 0,
            equations: HashMap::new(),
            next_id: 0,
            by_key: HashMap::new(),
            by_index: HashMap::new(),
            waitlist: HashMap::new(),
            codec: None,
            max_cascade_steps: DEFAULT_MAX_CASCADE_STEPS,
        }
    }

    /// Decoder that tries `codec` on the reassembled bytes first and falls
    /// back to the raw bytes.
    pub fn with_codec(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec: Some(codec),
            ..Self::new()
        }
    }

    /// Decoder matching a sender configured with `config`.
    pub fn with_config(config: &FountainConfig, codec: Arc<dyn Codec>) -> Self {
        let decoder = if config.compress {
            Self::with_codec(codec)
        } else {
            Self::new()
        };
        decoder.max_cascade_steps(config.max_cascade_steps)
    }

    /// Decoder seeded with an initial set of blocks.
    ///
    /// Pass the sender's codec for compressed sessions; without one only the
    /// raw reassembly can verify.
    pub fn from_blocks(
        blocks: impl IntoIterator<Item = EncodedBlock>,
        codec: Option<Arc<dyn Codec>>,
    ) -> Result<Self, DecodeError> {
        let decoder = match codec {
            Some(codec) => Self::with_codec(codec),
            None => Self::new(),
        };
        decoder.seed(blocks)
    }

    /// Feed an initial set of blocks to an already configured decoder.
    /// The first rejected block aborts.
    pub fn seed(
        mut self,
        blocks: impl IntoIterator<Item = EncodedBlock>,
    ) -> Result<Self, DecodeError> {
        for block in blocks {
            self.add_block(block)?;
        }
        Ok(self)
    }

    /// Cap the work-list items one [`add_block`](Decoder::add_block) may process.
    pub fn max_cascade_steps(mut self, limit: usize) -> Self {
        self.max_cascade_steps = limit.max(1);
        self
    }

    /// Session header, established by the first accepted block.
    #[inline]
    pub fn header(&self) -> Option<EncodedHeader> {
        self.header
    }

    /// Original blocks resolved so far.
    #[inline]
    pub fn decoded_count(&self) -> usize {
        self.decoded_count
    }

    /// Blocks accepted by [`add_block`](Decoder::add_block), duplicates included.
    #[inline]
    pub fn encoded_count(&self) -> usize {
        self.encoded_count
    }

    /// Equations of degree ≥ 2 still waiting for more information.
    #[inline]
    pub fn pending_equations(&self) -> usize {
        self.equations.len()
    }

    /// True once every original block is resolved.
    pub fn is_complete(&self) -> bool {
        self.header
            .is_some_and(|h| self.decoded_count == h.k as usize)
    }

    /// Resolved bytes of original block `index`, zero padding included.
    pub fn decoded_block(&self, index: u32) -> Option<&[u8]> {
        self.decoded.get(index as usize)?.as_deref()
    }

    pub fn status(&self) -> DecoderStatus {
        DecoderStatus {
            k: self.header.map_or(0, |h| h.k),
            checksum: self.header.map_or(0, |h| h.checksum),
            decoded_count: self.decoded_count,
            encoded_count: self.encoded_count,
            pending_equations: self.equations.len(),
        }
    }

    /// Feed one block. Returns `true` once decoding is complete.
    ///
    /// The first accepted block fixes the session header. A block that fails
    /// validation is rejected without touching decoder state; the session
    /// carries on with later blocks.
    pub fn add_block(&mut self, block: EncodedBlock) -> Result<bool, DecodeError> {
        match self.header {
            Some(header) => self.check_session(&header, &block)?,
            None => check_first_block(&block)?,
        }
        let indices = check_indices(&block)?;

        if self.header.is_none() {
            let header = block.header;
            debug!(
                k = header.k,
                byte_length = header.byte_length,
                checksum = format_args!("{:08x}", header.checksum),
                slice_size = block.payload.len(),
                "decoder session established"
            );
            self.header = Some(header);
            self.slice_size = block.payload.len();
            self.decoded = vec![None; header.k as usize];
        }

        self.encoded_count += 1;
        let before = self.decoded_count;
        let result = self.resolve(Equation {
            indices,
            payload: block.payload,
        });

        if self.decoded_count > before {
            trace!(
                decoded = self.decoded_count,
                newly = self.decoded_count - before,
                "blocks resolved"
            );
        }
        result?;

        let complete = self.is_complete();
        if complete && self.decoded_count > before {
            debug!(encoded = self.encoded_count, "decoding complete");
        }
        Ok(complete)
    }

    /// Reassemble the payload once every block is resolved.
    ///
    /// Returns `Ok(None)` while data is still missing. With a codec, the
    /// decompressed bytes are tried first; if decompression fails or its
    /// checksum disagrees, the raw bytes are verified instead.
    pub fn decoded(&self) -> Result<Option<Vec<u8>>, DecodeError> {
        let Some(header) = self.header else {
            return Ok(None);
        };
        if !self.is_complete() {
            return Ok(None);
        }

        let mut joined = Vec::with_capacity(self.decoded.len() * self.slice_size);
        for block in &self.decoded {
            match block {
                Some(bytes) => joined.extend_from_slice(bytes),
                None => return Ok(None),
            }
        }
        joined.truncate(header.byte_length as usize);

        if let Some(codec) = &self.codec {
            match codec.decompress(&joined) {
                Ok(inflated) if checksum(&inflated, header.k) == header.checksum => {
                    return Ok(Some(inflated));
                }
                Ok(_) => warn!(codec = codec.name(), "decompressed payload fails checksum, trying raw bytes"),
                Err(e) => debug!(codec = codec.name(), error = %e, "decompression failed, trying raw bytes"),
            }
        }

        if checksum(&joined, header.k) == header.checksum {
            return Ok(Some(joined));
        }
        Err(DecodeError::ChecksumMismatchOnReconstruct {
            expected: header.checksum,
        })
    }

    // ── Validation ─────────────────────────────────────────────────────────

    fn check_session(&self, header: &EncodedHeader, block: &EncodedBlock) -> Result<(), DecodeError> {
        if block.header.checksum != header.checksum {
            warn!(
                expected = format_args!("{:08x}", header.checksum),
                got = format_args!("{:08x}", block.header.checksum),
                "rejecting block from another payload"
            );
            return Err(DecodeError::ChecksumMismatchOnIngest {
                expected: header.checksum,
                got: block.header.checksum,
            });
        }

        let fields = [
            ("k", header.k as usize, block.header.k as usize),
            ("byte_length", header.byte_length as usize, block.header.byte_length as usize),
            ("slice size", self.slice_size, block.payload.len()),
        ];
        for (field, expected, got) in fields {
            if expected != got {
                warn!(field, expected, got, "rejecting block with inconsistent header");
                return Err(DecodeError::HeaderMismatch {
                    field,
                    expected: expected as u64,
                    got: got as u64,
                });
            }
        }
        Ok(())
    }

    // ── Resolution ─────────────────────────────────────────────────────────

    fn is_decoded(&self, index: u32) -> bool {
        self.decoded[index as usize].is_some()
    }

    /// Drain the work list seeded with `equation`.
    ///
    /// On [`DecodeError::RunawayCascade`] every resolution already applied is
    /// kept, since each one is a sound XOR identity. Equations still queued
    /// are dropped; the decoder stays consistent and accepts further blocks.
    fn resolve(&mut self, equation: Equation) -> Result<(), DecodeError> {
        let limit = self.max_cascade_steps;
        let mut work = vec![equation];
        let mut steps = 0usize;

        while let Some(equation) = work.pop() {
            steps += 1;
            if steps > limit {
                warn!(limit, dropped = work.len() + 1, "resolution cascade hit its ceiling");
                return Err(DecodeError::RunawayCascade { limit });
            }
            self.step(equation, &mut work);
        }
        Ok(())
    }

    fn step(&mut self, mut equation: Equation, work: &mut Vec<Equation>) {
        if self.by_key.contains_key(&equation.indices)
            || equation.indices.iter().all(|&i| self.is_decoded(i))
        {
            return;
        }

        if equation.indices.len() > 1 {
            let decoded = &self.decoded;
            let payload = &mut equation.payload;
            equation.indices.retain(|&i| match &decoded[i as usize] {
                Some(known) => {
                    xor_into(payload, known);
                    false
                }
                None => true,
            });
            if self.by_key.contains_key(&equation.indices) {
                return;
            }
        }

        let mut missing: Vec<Key> = Vec::new();
        if equation.indices.len() > 2 {
            let mut sibling = None;
            for (pos, &index) in equation.indices.iter().enumerate() {
                let subkey = without(&equation.indices, pos);
                if let Some(&id) = self.by_key.get(&subkey) {
                    sibling = Some((index, id));
                    break;
                }
                missing.push(subkey);
            }
            if let Some((index, id)) = sibling {
                if let Some(stored) = self.equations.get(&id) {
                    xor_into(&mut equation.payload, &stored.equation.payload);
                    equation.indices = vec![index];
                    missing.clear();
                }
            }
        }

        if equation.indices.len() > 1 {
            self.store(equation, missing, work);
            return;
        }

        let index = equation.indices[0];
        if self.is_decoded(index) {
            return;
        }
        trace!(index, "original block resolved");
        self.decoded[index as usize] = Some(equation.payload);
        self.decoded_count += 1;

        if let Some(ids) = self.by_index.remove(&index) {
            for id in ids {
                if let Some(pending) = self.detach(id) {
                    work.push(pending);
                }
            }
        }
    }

    /// Park an equation of degree ≥ 2 and release any superset waiting on it.
    fn store(&mut self, equation: Equation, waiting_on: Vec<Key>, work: &mut Vec<Equation>) {
        let id = self.next_id;
        self.next_id += 1;

        for &index in &equation.indices {
            self.by_index.entry(index).or_default().insert(id);
        }
        for subkey in &waiting_on {
            self.waitlist.entry(subkey.clone()).or_default().insert(id);
        }
        self.by_key.insert(equation.indices.clone(), id);

        if let Some(waiting) = self.waitlist.remove(&equation.indices) {
            for superset in waiting {
                if let Some(pending) = self.equations.get(&superset) {
                    work.push(combine(&pending.equation, &equation));
                }
            }
        }

        self.equations.insert(
            id,
            Pending {
                equation,
                waiting_on,
            },
        );
    }

    /// Remove a pending equation from the arena and every map that names it.
    fn detach(&mut self, id: EquationId) -> Option<Equation> {
        let pending = self.equations.remove(&id)?;

        if self.by_key.get(&pending.equation.indices) == Some(&id) {
            self.by_key.remove(&pending.equation.indices);
        }
        for index in &pending.equation.indices {
            if let Some(ids) = self.by_index.get_mut(index) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_index.remove(index);
                }
            }
        }
        for subkey in &pending.waiting_on {
            if let Some(ids) = self.waitlist.get_mut(subkey) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.waitlist.remove(subkey);
                }
            }
        }
        Some(pending.equation)
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Validation for the block that would establish the session.
fn check_first_block(block: &EncodedBlock) -> Result<(), DecodeError> {
    let k = u64::from(block.header.k);
    let slice = block.payload.len() as u64;
    let byte_length = u64::from(block.header.byte_length);

    if k == 0 {
        return Err(invalid("k must be at least 1".into()));
    }
    if slice == 0 {
        return Err(invalid("payload is empty".into()));
    }
    if byte_length > k * slice || byte_length <= (k - 1) * slice {
        return Err(invalid(format!(
            "byte_length {byte_length} does not fit {k} slices of {slice} bytes"
        )));
    }
    Ok(())
}

/// Sorted copy of the block's indices, checked against `k`.
fn check_indices(block: &EncodedBlock) -> Result<Key, DecodeError> {
    let k = block.header.k;
    if block.indices.is_empty() {
        return Err(invalid("block has no indices".into()));
    }
    let mut indices = block.indices.clone();
    indices.sort_unstable();
    if let Some(&index) = indices.iter().find(|&&i| i >= k) {
        return Err(invalid(format!("index {index} out of range (k = {k})")));
    }
    if let Some(pair) = indices.windows(2).find(|w| w[0] == w[1]) {
        return Err(invalid(format!("index {} repeated", pair[0])));
    }
    Ok(indices)
}

fn invalid(reason: String) -> DecodeError {
    DecodeError::InvalidBlock { reason }
}

/// `indices` without the element at `pos`. Stays sorted.
fn without(indices: &[u32], pos: usize) -> Key {
    let mut key = Vec::with_capacity(indices.len() - 1);
    key.extend_from_slice(&indices[..pos]);
    key.extend_from_slice(&indices[pos + 1..]);
    key
}

/// XOR of two equations: payloads XORed, index sets symmetric-differenced.
fn combine(a: &Equation, b: &Equation) -> Equation {
    let mut payload = a.payload.clone();
    xor_into(&mut payload, &b.payload);

    let (mut i, mut j) = (0, 0);
    let mut indices = Vec::new();
    while i < a.indices.len() && j < b.indices.len() {
        match a.indices[i].cmp(&b.indices[j]) {
            std::cmp::Ordering::Less => {
                indices.push(a.indices[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                indices.push(b.indices[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    indices.extend_from_slice(&a.indices[i..]);
    indices.extend_from_slice(&b.indices[j..]);

    Equation { indices, payload }
}
