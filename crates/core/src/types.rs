//! Identifier and byte-string types.
//!
//! Keys and values are opaque byte strings. Keys compare lexicographically,
//! which is what the ordered store and prefix scans rely on.

/// An opaque key. Zero length is legal.
pub type Key = Vec<u8>;

/// An opaque value. Zero length is legal.
pub type Value = Vec<u8>;

/// Log sequence number.
///
/// Assigned by the WAL, strictly monotonically increasing, starting at 1 on
/// a fresh log. An LSN of 0 means "no record" and never appears in a file.
pub type Lsn = u64;

/// Transaction identifier.
///
/// Allocated at `begin`, monotonically increasing, never reused within a
/// process lifetime.
pub type TxnId = u64;

/// Render a key for log output.
///
/// Keys are arbitrary bytes; anything that is not printable ASCII is shown
/// as a `\x` escape so log lines stay single-line.
pub fn display_key(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key {
        if (0x20..0x7f).contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_key_printable() {
        assert_eq!(display_key(b"user:1"), "user:1");
    }

    #[test]
    fn display_key_escapes_binary() {
        assert_eq!(display_key(&[0x00, b'a', 0xff]), "\\x00a\\xff");
    }

    #[test]
    fn display_key_empty() {
        assert_eq!(display_key(b""), "");
    }
}
