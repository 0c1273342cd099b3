use subtle::ConstantTimeEq;

/// Constant-time string equality.
///
/// The length check is folded into the result instead of short-circuiting,
/// and the byte comparison runs over the shorter of the two inputs, so the
/// running time depends only on `min(a.len(), b.len())`. Compare against a
/// fixed-length expected value (e.g. a 43-char signature) to make that
/// bound independent of the attacker's input.
pub fn secure_equals(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let n = a.len().min(b.len());
    let same_len = (a.len() as u64).ct_eq(&(b.len() as u64));
    let same_bytes = a[..n].ct_eq(&b[..n]);
    bool::from(same_len & same_bytes)
}
