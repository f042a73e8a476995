//! Seedable, resumable random stream.
//!
//! Every random decision the interpreter makes goes through a
//! [`RandomSource`]. The production source is [`RandomStream`], a ChaCha8
//! generator whose position can be captured in a [`RandomSnapshot`] and
//! restored later, so a host that re-runs a generation downstream of earlier
//! draws continues the sequence instead of repeating it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sprig_types::{EvalResult, InterpretError};

/// Tag stored in every snapshot; restoring a snapshot with another tag fails.
pub const SNAPSHOT_FORMAT: &str = "chacha8/1";

/// Source of uniform randomness for grammar evaluation.
pub trait RandomSource {
    /// A uniform float in `[0, 1)`.
    fn next_uniform(&mut self) -> f64;

    /// A uniform integer in `[min, max]`. Returns `min` when `max <= min`.
    fn next_int_range(&mut self, min: i64, max: i64) -> i64;
}

// ══════════════════════════════════════════════════════════════════════════════
// RandomStream
// ══════════════════════════════════════════════════════════════════════════════

/// Serializable position of a [`RandomStream`]: key, stream id and the
/// number of 32-bit words consumed so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomSnapshot {
    pub format: String,
    pub seed: [u8; 32],
    pub stream: u64,
    pub word_pos: u128,
}

impl RandomSnapshot {
    pub fn to_json(&self) -> String {
        // Plain fields: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> EvalResult<Self> {
        serde_json::from_str(text).map_err(|e| InterpretError::RandomState(e.to_string()))
    }
}

/// The interpreter's production random source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomStream {
    rng: ChaCha8Rng,
}

impl RandomStream {
    /// A fresh stream; equal seeds give equal sequences.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn snapshot(&self) -> RandomSnapshot {
        RandomSnapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            seed: self.rng.get_seed(),
            stream: self.rng.get_stream(),
            word_pos: self.rng.get_word_pos(),
        }
    }

    /// Resume from a snapshot taken earlier. Foreign formats are rejected.
    pub fn restore(&mut self, snapshot: &RandomSnapshot) -> EvalResult<()> {
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(InterpretError::RandomState(format!(
                "unsupported snapshot format '{}'",
                snapshot.format
            )));
        }
        let mut rng = ChaCha8Rng::from_seed(snapshot.seed);
        rng.set_stream(snapshot.stream);
        rng.set_word_pos(snapshot.word_pos);
        self.rng = rng;
        Ok(())
    }
}

impl RandomSource for RandomStream {
    fn next_uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn next_int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn draws(stream: &mut RandomStream, n: usize) -> Vec<f64> {
        (0..n).map(|_| stream.next_uniform()).collect()
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomStream::from_seed(42);
        let mut b = RandomStream::from_seed(42);
        assert_eq!(draws(&mut a, 32), draws(&mut b, 32));
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = RandomStream::from_seed(1);
        let mut b = RandomStream::from_seed(2);
        assert_ne!(draws(&mut a, 8), draws(&mut b, 8));
    }

    #[test]
    fn uniform_in_unit_interval() {
        let mut s = RandomStream::from_seed(7);
        for x in draws(&mut s, 1000) {
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn int_range_is_inclusive() {
        let mut s = RandomStream::from_seed(3);
        let mut seen = [false; 3];
        for _ in 0..500 {
            let n = s.next_int_range(4, 6);
            assert!((4..=6).contains(&n));
            seen[(n - 4) as usize] = true;
        }
        assert_eq!(seen, [true, true, true]);
        assert_eq!(s.next_int_range(9, 9), 9);
    }

    #[test]
    fn snapshot_resumes_sequence() {
        let mut s = RandomStream::from_seed(99);
        draws(&mut s, 5);
        let snap = s.snapshot();
        let expected = draws(&mut s, 10);

        let mut resumed = RandomStream::from_seed(0);
        resumed.restore(&snap).unwrap();
        assert_eq!(draws(&mut resumed, 10), expected);
    }

    #[test]
    fn snapshot_json_round_trip() {
        let s = RandomStream::from_seed(5);
        let json = s.snapshot().to_json();
        assert!(json.contains(SNAPSHOT_FORMAT));
        assert_eq!(RandomSnapshot::from_json(&json).unwrap(), s.snapshot());
    }

    #[test]
    fn malformed_snapshots_are_rejected() {
        let mut s = RandomStream::from_seed(5);
        let mut foreign = s.snapshot();
        foreign.format = "mt19937".into();
        assert!(matches!(
            s.restore(&foreign),
            Err(InterpretError::RandomState(_))
        ));
        // A rejected restore leaves the stream untouched.
        assert_eq!(s, RandomStream::from_seed(5));

        assert!(matches!(
            RandomSnapshot::from_json("{\"format\": 3}"),
            Err(InterpretError::RandomState(_))
        ));
    }

    #[test]
    fn snapshot_mid_block_resumes_exactly() {
        let mut s = RandomStream::from_seed(11);
        // An odd number of 32-bit words leaves the position inside a block.
        s.rng.next_u32();
        let snap = s.snapshot();
        let expected = draws(&mut s, 4);

        let mut resumed = RandomStream::from_seed(12);
        resumed.restore(&snap).unwrap();
        assert_eq!(draws(&mut resumed, 4), expected);
    }
}
