//! Small helpers shared by the engine modules.

/// FNV-1a over `s`, seeded. Used to derive stable per-job seeds.
pub fn fnv1a64(seed: u64, s: &str) -> u64 {
    let mut hash = 0xcbf29ce484222325u64 ^ seed;
    for b in s.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Seed for the `index`-th job of a run seeded with `run_seed`.
pub fn derive_seed(run_seed: u64, label: &str, index: usize) -> u64 {
    fnv1a64(run_seed, &format!("{}:{}", label, index))
}

/// Truncate a message for logs and grouping (first 200 chars).
pub fn truncate_message(msg: &str) -> String {
    const LIMIT: usize = 200;
    match msg.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &msg[..cut]),
        None => msg.to_string(),
    }
}
