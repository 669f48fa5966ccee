//! Verthash primitives: dataset file loading and the CPU hash.
//!
//! The dataset is a flat, read-only byte region. The hash expands an
//! 80-byte block header into a table of seek indexes via sha3, then
//! folds aligned dataset reads into the output with fnv1a, chaining the
//! read positions through a running accumulator so every seek depends on
//! everything read before it.

use std::fs;
use std::path::Path;

use sha3::{Digest, Sha3_256, Sha3_512};

use crate::error::{Result, VerthashError};

/// Block header size fed to the hash.
pub const HEADER_SIZE: usize = 80;

/// Hash output size.
pub const HASH_OUT_SIZE: usize = 32;

/// Dataset reads are aligned to this many bytes.
pub const BYTE_ALIGNMENT: usize = 16;

/// Smallest dataset the hash can walk.
pub const MIN_DATA_SIZE: u64 = 64;

/// sha3-512 passes expanding the header into the seek subset.
const SUBSET_ITERATIONS: usize = 8;
const SUBSET_CHUNK: usize = 64;
const SUBSET_SIZE: usize = SUBSET_CHUNK * SUBSET_ITERATIONS;

/// Bit rotations of the subset; with the subset word count this yields
/// 4096 seeks per hash.
const ROTATIONS: usize = 32;
const SEEK_COUNT: usize = ROTATIONS * (SUBSET_SIZE / 4);

/// FNV1a constants, 32-bit variant
pub const FNV_PRIME: u32 = 0x0100_0193;
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// Compute FNV1a hash of two 32-bit values
#[inline(always)]
pub fn fnv1a(h: u32, d: u32) -> u32 {
    (h ^ d).wrapping_mul(FNV_PRIME)
}

#[inline(always)]
fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Bitmask for fast modular indexing into a dataset of `len_bytes`:
/// `next_power_of_two(word_count) - 1`, where words are 32 bits.
pub fn bitmask_for_len(len_bytes: u64) -> u32 {
    let words = len_bytes / 4;
    (words.next_power_of_two() - 1) as u32
}

/// Read a dataset file into memory, validating its shape.
pub fn load_file(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).map_err(|source| VerthashError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if (data.len() as u64) < MIN_DATA_SIZE {
        return Err(VerthashError::TooSmall {
            path: path.to_path_buf(),
            size: data.len() as u64,
        });
    }

    if data.len() % BYTE_ALIGNMENT != 0 {
        return Err(VerthashError::Misaligned {
            path: path.to_path_buf(),
            alignment: BYTE_ALIGNMENT,
        });
    }

    Ok(data)
}

/// CPU hash of an 80-byte header over `data`.
///
/// The GPU runners are the authoritative hashers; this walk exists for
/// share validation and self-test.
pub fn hash(data: &[u8], input: &[u8; HEADER_SIZE]) -> [u8; HASH_OUT_SIZE] {
    debug_assert!(data.len() as u64 >= MIN_DATA_SIZE);

    let digest = Sha3_256::digest(input);
    let mut state = [0u32; HASH_OUT_SIZE / 4];
    for (i, word) in state.iter_mut().enumerate() {
        *word = read_u32_le(&digest, i * 4);
    }

    // Expand the header into the seek subset, bumping the first byte
    // each pass so the chains diverge.
    let mut subset = [0u8; SUBSET_SIZE];
    let mut header = *input;
    for i in 0..SUBSET_ITERATIONS {
        header[0] = header[0].wrapping_add(1);
        subset[i * SUBSET_CHUNK..(i + 1) * SUBSET_CHUNK]
            .copy_from_slice(&Sha3_512::digest(header));
    }

    let mut seeds = [0u32; SUBSET_SIZE / 4];
    for (i, word) in seeds.iter_mut().enumerate() {
        *word = read_u32_le(&subset, i * 4);
    }

    let mut seek_indexes = vec![0u32; SEEK_COUNT];
    for rotation in 0..ROTATIONS {
        let window = &mut seek_indexes[rotation * seeds.len()..(rotation + 1) * seeds.len()];
        window.copy_from_slice(&seeds);
        for word in seeds.iter_mut() {
            *word = word.rotate_left(1);
        }
    }

    let mut accumulator = FNV_OFFSET_BASIS;
    let mdiv = ((data.len() - HASH_OUT_SIZE) / BYTE_ALIGNMENT) as u32 + 1;

    for &seek in &seek_indexes {
        let offset = (fnv1a(seek, accumulator) % mdiv) as usize * BYTE_ALIGNMENT;

        for (i, word) in state.iter_mut().enumerate() {
            let value = read_u32_le(data, offset + i * 4);
            *word = fnv1a(*word, value);
            accumulator = fnv1a(accumulator, value);
        }
    }

    let mut output = [0u8; HASH_OUT_SIZE];
    for (i, word) in state.iter().enumerate() {
        output[i * 4..(i + 1) * 4].copy_from_slice(&word.to_le_bytes());
    }
    output
}
