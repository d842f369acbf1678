//! Symbol mixing for the Hash child-array representation (spec.md §4.4).
//!
//! The identity hash is forbidden: adversarial flat workloads (spec.md §8 S3, S7) insert
//! dense runs of small, consecutive symbols, which would all collide on the same low-order
//! bits and degrade every Hash array to a linear scan. This is the splitmix64 finalizer, a
//! standard fixed multiply/xorshift mix: bijective (and therefore loses no entropy) and
//! with no primary clustering on sequential or sparse inputs.
pub(crate) fn mix(symbol: u64) -> u64 {
    let mut x = symbol;
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn not_identity() {
        assert_ne!(mix(1), 1);
        assert_ne!(mix(1000), 1000);
    }

    #[test]
    fn bijective_on_a_sample() {
        // splitmix64's finalizer is a known bijection on u64; spot-check that a dense
        // consecutive run doesn't collide, which is the property the growth protocol
        // actually needs (no two distinct symbols probing into the same slot by construction).
        let mut seen = HashSet::new();
        for i in 0..100_000u64 {
            assert!(seen.insert(mix(i)), "collision mixing {i}");
        }
    }

    #[test]
    fn sequential_symbols_scatter_across_low_bits() {
        // A probe index is `mix(symbol) mod capacity`. For capacity a power of two this is
        // the low bits of the mix. A non-adversarial mixer should spread a dense run of
        // sequential symbols roughly evenly over a modest capacity, unlike the identity
        // function which would place symbol i straight into bucket i and only ever fill
        // low-numbered buckets for any capacity > number of symbols.
        const CAPACITY: u64 = 1024;
        let mut buckets = vec![0usize; CAPACITY as usize];
        for i in 1..=10_000u64 {
            buckets[(mix(i) & (CAPACITY - 1)) as usize] += 1;
        }
        let max = *buckets.iter().max().unwrap();
        let expected = 10_000 / CAPACITY as usize;
        // Allow generous slack; the point is ruling out gross clustering, not asserting a
        // tight statistical bound.
        assert!(
            max < expected * 4,
            "max bucket {max} far exceeds expected {expected}"
        );
    }
}
