//! Seeded, reproducible shuffling.
//!
//! Sentence and model orders must be identical every time a session is
//! resumed, on any machine and with any toolchain, so the seed string is
//! hashed with a fixed algorithm (FNV-1a, then a SplitMix64 finalizer) rather
//! than `std`'s `DefaultHasher`, whose output is not guaranteed to be stable.

use serde::{Deserialize, Serialize};

use crate::model::ModelShuffle;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash a string seed to 64 bits.
pub fn hash_seed(seed: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in seed.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    splitmix64(hash)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Deterministic xorshift64* generator seeded from a string.
///
/// Not cryptographically secure.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn from_seed(seed: &str) -> Self {
        let state = hash_seed(seed);
        Self {
            state: if state == 0 { FNV_OFFSET } else { state },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Uniform value in `[0, bound)` using rejection sampling.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    pub fn next_below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be non-zero");
        let bound = bound as u64;
        let threshold = u64::MAX - (u64::MAX % bound);
        loop {
            let value = self.next_u64();
            if value < threshold {
                return (value % bound) as usize;
            }
        }
    }
}

/// Shuffle `items` in place with Fisher–Yates driven by `seed`.
pub fn shuffle_in_place<T>(items: &mut [T], seed: &str) {
    let mut rng = SeededRng::from_seed(seed);
    for i in (1..items.len()).rev() {
        let j = rng.next_below(i + 1);
        items.swap(i, j);
    }
}

/// Return a shuffled copy of `items`. Same `(items, seed)` → same output.
pub fn shuffle<T: Clone>(items: &[T], seed: &str) -> Vec<T> {
    let mut out = items.to_vec();
    shuffle_in_place(&mut out, seed);
    out
}

/// Sentence order plus one model order per sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shuffles {
    pub sentence_order: Vec<String>,
    pub model_shuffles: Vec<ModelShuffle>,
}

/// Seed used for the model order of one sentence.
pub fn model_seed(session_id: &str, sentence_id: &str) -> String {
    format!("{session_id}:{sentence_id}")
}

/// Derive the complete presentation order for a session.
///
/// The sentence order is seeded by the session id alone; each sentence's
/// model order is seeded by the session id combined with the sentence id, so
/// model positions vary from sentence to sentence.
pub fn generate_shuffles(
    session_id: &str,
    sentence_ids: &[String],
    model_names: &[String],
) -> Shuffles {
    let sentence_order = shuffle(sentence_ids, session_id);
    let model_shuffles = sentence_order
        .iter()
        .map(|sentence_id| ModelShuffle {
            sentence_id: sentence_id.clone(),
            model_order: shuffle(model_names, &model_seed(session_id, sentence_id)),
        })
        .collect();

    tracing::debug!(
        session_id,
        sentences = sentence_ids.len(),
        models = model_names.len(),
        "generated shuffles"
    );

    Shuffles {
        sentence_order,
        model_shuffles,
    }
}
