//! Prefix-sum layout of degree arrays into index pointers

/// Write `indptr[0] = 0, indptr[i + 1] = indptr[i] + deg[i]` and return the total
///
/// `indptr` must hold exactly `deg.len() + 1` entries.
pub fn fill_indptr(indptr: &mut [u64], deg: &[u32]) -> u64 {
    debug_assert_eq!(indptr.len(), deg.len() + 1);

    indptr[0] = 0;
    let mut offset = 0u64;
    for (slot, &d) in indptr[1..].iter_mut().zip(deg) {
        offset += d as u64;
        *slot = offset;
    }

    offset
}

/// Allocate and fill an index pointer array for `deg`
pub fn prefix_sum(deg: &[u32]) -> Vec<u64> {
    let mut indptr = vec![0u64; deg.len() + 1];
    fill_indptr(&mut indptr, deg);
    indptr
}
