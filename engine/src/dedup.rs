//! Two-tier deduplicator: an exact canonical-key set plus an optional
//! bloom-style probabilistic pre-check for cross-partition / cross-call
//! dedup.
//!
//! The probabilistic tier only ever *skips expensive work early*; a
//! positive is always rechecked against the exact tier, and a cycle is
//! never dropped solely on a probabilistic positive.

use crate::canonical::CanonicalKey;
use std::collections::HashSet;

/// Bit-set bloom filter sized by:
/// `m = ceil(-N ln ρ / (ln 2)^2)`, `k = max(1, round((m/N) ln 2))`.
///
/// Each `CanonicalKey` is already a uniform SHA-256 digest, so its first
/// two 8-byte halves serve directly as the two independent hash seeds for
/// Kirsch–Mitzenmacher double hashing (`h_i = h1 + i*h2 mod m`), with no
/// extra hash dependency needed.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: usize,
}

impl BloomFilter {
    pub fn new(capacity: usize, fp_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let fp_rate = fp_rate.clamp(1e-6, 0.5);
        let m = (-(capacity as f64) * fp_rate.ln() / (std::f64::consts::LN_2.powi(2))).ceil() as usize;
        let num_bits = m.max(64);
        let k = ((num_bits as f64 / capacity as f64) * std::f64::consts::LN_2).round() as usize;
        let num_hashes = k.max(1);
        Self {
            bits: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
            num_hashes,
        }
    }

    fn hash_pair(key: &CanonicalKey) -> (u64, u64) {
        let bytes = key.0;
        let mut h1 = [0u8; 8];
        let mut h2 = [0u8; 8];
        h1.copy_from_slice(&bytes[0..8]);
        h2.copy_from_slice(&bytes[8..16]);
        (u64::from_le_bytes(h1), u64::from_le_bytes(h2))
    }

    fn positions(&self, key: &CanonicalKey) -> impl Iterator<Item = usize> + '_ {
        let (h1, h2) = Self::hash_pair(key);
        (0..self.num_hashes).map(move |i| {
            let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
            (combined % self.num_bits as u64) as usize
        })
    }

    pub fn insert(&mut self, key: &CanonicalKey) {
        for pos in self.positions(key).collect::<Vec<_>>() {
            self.bits[pos / 64] |= 1 << (pos % 64);
        }
    }

    pub fn might_contain(&self, key: &CanonicalKey) -> bool {
        self.positions(key).all(|pos| self.bits[pos / 64] & (1 << (pos % 64)) != 0)
    }
}

/// The exact tier: authoritative canonical-key membership.
#[derive(Debug, Clone, Default)]
pub struct ExactSet {
    seen: HashSet<CanonicalKey>,
}

impl ExactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns `true` if `key` was not previously present.
    pub fn insert(&mut self, key: CanonicalKey) -> bool {
        self.seen.insert(key)
    }
}

/// Combines both tiers: always consult the exact tier for correctness; the
/// bloom filter (when enabled) is consulted first
/// purely as a fast-reject so callers can skip materializing a loop that is
/// almost certainly a duplicate, then still double-check exactly.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    exact: ExactSet,
    bloom: Option<BloomFilter>,
}

impl Deduplicator {
    pub fn new(enable_bloom: bool, bloom_capacity: usize, bloom_fp_rate: f64) -> Self {
        Self {
            exact: ExactSet::new(),
            bloom: enable_bloom.then(|| BloomFilter::new(bloom_capacity, bloom_fp_rate)),
        }
    }

    /// Fast pre-check only: `true` means "maybe seen, go verify exactly";
    /// `false` means "definitely new, skip the exact check if the caller
    /// wants to shortcut it". Never authoritative on its own.
    pub fn probably_seen(&self, key: &CanonicalKey) -> bool {
        match &self.bloom {
            Some(bloom) => bloom.might_contain(key),
            None => false,
        }
    }

    pub fn is_duplicate(&self, key: &CanonicalKey) -> bool {
        self.exact.contains(key)
    }

    /// Registers `key` as seen in both tiers. Returns `true` if this was a
    /// new key (i.e. it should be emitted).
    pub fn record(&mut self, key: CanonicalKey) -> bool {
        let is_new = self.exact.insert(key);
        if is_new {
            if let Some(bloom) = &mut self.bloom {
                bloom.insert(&key);
            }
        }
        is_new
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> CanonicalKey {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        CanonicalKey(bytes)
    }

    #[test]
    fn exact_set_rejects_duplicate_insert() {
        let mut set = ExactSet::new();
        assert!(set.insert(key(1)));
        assert!(!set.insert(key(1)));
    }

    #[test]
    fn bloom_never_false_negative() {
        let mut bloom = BloomFilter::new(1_000, 0.01);
        let keys: Vec<_> = (0..200).map(key).collect();
        for k in &keys {
            bloom.insert(k);
        }
        for k in &keys {
            assert!(bloom.might_contain(k), "bloom filter must never false-negative");
        }
    }

    #[test]
    fn probabilistic_positive_is_rechecked_never_authoritative() {
        let mut dedup = Deduplicator::new(true, 100, 0.01);
        let k = key(7);
        assert!(!dedup.probably_seen(&k));
        assert!(dedup.record(k));
        assert!(!dedup.record(k), "second record of the same key must report not-new");
        assert!(dedup.is_duplicate(&k));
    }
}
