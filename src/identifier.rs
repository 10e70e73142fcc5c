//! Ring identifier arithmetic: hashing and the wraparound interval predicate
//! every other module routes through.

/// Number of bits in the identifier space. `2^M` is the ring size.
pub const M: u32 = 128;

/// A position on the ring. `u128` gives native wrapping arithmetic for the
/// whole space, so `Id` is a thin alias rather than a newtype.
pub type Id = u128;

/// Hashes an opaque byte string (a key or a peer address) into the ring.
///
/// Truncates a blake3 digest to its low 16 bytes, big-endian. 128 bits is
/// ample to avoid collisions for the node/key counts this crate targets and
/// keeps ring arithmetic on a native integer type.
pub fn hash(bytes: &[u8]) -> Id {
    let digest = blake3::hash(bytes);
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&digest.as_bytes()[..16]);
    Id::from_be_bytes(buf)
}

/// `(b - a) mod 2^M`, i.e. the clockwise distance from `a` to `b`.
pub fn distance(a: Id, b: Id) -> Id {
    b.wrapping_sub(a)
}

/// `(id + 2^i) mod 2^M`, the ring position a finger-table slot `i` routes to.
pub fn offset(id: Id, i: u32) -> Id {
    debug_assert!(i < M);
    id.wrapping_add(1u128.wrapping_shl(i))
}

/// Ring-interval membership test with wraparound, per the protocol's
/// standard "is v in (start, end]"-style predicates.
///
/// If `start == end` the interval is empty unless an endpoint is inclusive,
/// in which case it denotes the whole ring. Otherwise for `start < end` this
/// is the ordinary interval; for `start > end` it is the union
/// `(start, 2^M) ∪ [0, end)` with inclusivity applied at each endpoint.
pub fn in_range(v: Id, start: Id, end: Id, incl_start: bool, incl_end: bool) -> bool {
    if start == end {
        return incl_start || incl_end;
    }
    if start < end {
        let lower_ok = if incl_start { v >= start } else { v > start };
        let upper_ok = if incl_end { v <= end } else { v < end };
        lower_ok && upper_ok
    } else {
        // Wraps past the top of the ring: (start, MAX] ∪ [0, end), inclusivity at each end.
        let in_upper_arc = if incl_start { v >= start } else { v > start };
        let in_lower_arc = if incl_end { v <= end } else { v < end };
        in_upper_arc || in_lower_arc
    }
}
