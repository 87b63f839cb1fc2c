//! Composite rate-limit key construction (§4.3, §5).
//!
//! Keys are built from an ordered list of non-empty components (for
//! example tenant id, route, and user id) joined with `:`. Long keys are
//! hashed down to keep store lookups cheap and bounded in size.

/// Keys longer than this are collapsed to a hash.
const MAX_KEY_LEN: usize = 64;

/// Join non-empty `parts` with `:` into a single store key, hashing the
/// result down to a short base-36 digest if it would otherwise exceed
/// [`MAX_KEY_LEN`]. A single non-empty part is returned verbatim.
pub fn build_key(parts: &[&str]) -> String {
    let filtered: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if filtered.len() == 1 {
        return filtered[0].to_string();
    }
    let joined = filtered.join(":");
    if joined.len() <= MAX_KEY_LEN {
        joined
    } else {
        to_base36(fnv1a(joined.as_bytes()))
    }
}

/// FNV-1a, a fast non-cryptographic 64-bit hash; collisions are an
/// acceptable tradeoff for bounding key size, not a security property.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn build_key_is_always_bounded_and_deterministic(
            parts in prop::collection::vec("[a-zA-Z0-9_-]{0,40}", 1..6),
        ) {
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            let a = build_key(&refs);
            let b = build_key(&refs);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.len() <= MAX_KEY_LEN || a.len() <= 13);
        }
    }
}
