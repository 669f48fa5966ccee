//! One-shot dataset file generation.
//!
//! The dataset is derived deterministically from a fixed seed tag: a
//! parallel sha3-512 fill of 64-byte nodes, followed by mixing passes in
//! which every node absorbs an fnv-selected partner from the previous
//! pass. CPU-bound; generating the full file takes tens of minutes.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use sha3::{Digest, Sha3_512};
use tracing::debug;

use crate::error::{Result, VerthashError};

use super::core::fnv1a;

/// Canonical dataset size in bytes (1 GiB + 200 MiB).
pub const DATA_FILE_SIZE: u64 = 1_283_457_024;

/// Node width of the generation graph.
const NODE_SIZE: usize = 64;

/// Mixing passes over the node array.
const MIX_PASSES: usize = 4;

const SEED_TAG: &[u8] = b"Verthash Proof-of-Space Datafile";

/// Synthesize the canonical dataset file at `path`. Does not touch the
/// process-wide manager; callers load the file afterwards.
pub fn generate_data_file(path: &Path) -> Result<()> {
    let data = generate_bytes(DATA_FILE_SIZE);

    fs::write(path, &data).map_err(|source| VerthashError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Deterministic dataset image of `size` bytes. `size` must be a
/// multiple of the node width; small images are used by the self-tests.
pub fn generate_bytes(size: u64) -> Vec<u8> {
    debug_assert_eq!(size % NODE_SIZE as u64, 0);
    let node_count = (size as usize) / NODE_SIZE;

    let seed = Sha3_512::digest(SEED_TAG);

    // Fill: independent chains per node so the pass parallelizes.
    let mut data = vec![0u8; size as usize];
    data.par_chunks_mut(NODE_SIZE)
        .enumerate()
        .for_each(|(index, node)| {
            let mut hasher = Sha3_512::new();
            hasher.update(&seed);
            hasher.update((index as u64).to_le_bytes());
            node.copy_from_slice(&hasher.finalize());
        });

    // Mixing: each node absorbs a partner from the previous pass, picked
    // through fnv so the access pattern is data dependent.
    for pass in 0..MIX_PASSES {
        let previous = data.clone();

        data.par_chunks_mut(NODE_SIZE)
            .enumerate()
            .for_each(|(index, node)| {
                let first = u32::from_le_bytes([node[0], node[1], node[2], node[3]]);
                let partner = fnv1a(first, (pass as u32) ^ (index as u32)) as usize % node_count;

                let mut hasher = Sha3_512::new();
                hasher.update(&*node);
                hasher.update(&previous[partner * NODE_SIZE..(partner + 1) * NODE_SIZE]);
                node.copy_from_slice(&hasher.finalize());
            });

        debug!(target: "cpu", "dataset mixing pass {}/{} complete", pass + 1, MIX_PASSES);
    }

    data
}
