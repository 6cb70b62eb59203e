use rand_chacha::ChaCha20Rng;
use rand::SeedableRng;

/// Splitmix64 finaliser; spreads nearby inputs over the whole u64 range.
#[inline]
pub fn mix(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

/// Stream id of a (bin, size index, temperature index) unit.
#[inline]
pub fn stream_id(bin: usize, size_idx: usize, temp_idx: usize) -> u64 {
    ((bin as u64) << 40) | ((size_idx as u64) << 20) | temp_idx as u64
}

/// Per‑unit deterministic RNG; independent of which worker runs the unit.
pub fn unit_rng(master: u64, stream: u64) -> ChaCha20Rng {
    let x = mix(master ^ mix(stream.wrapping_add(1).wrapping_mul(0x9E3779B97F4A7C15)));
    ChaCha20Rng::seed_from_u64(x)
}
