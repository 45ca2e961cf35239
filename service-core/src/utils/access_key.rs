use subtle::ConstantTimeEq;

/// Compare a presented shared secret against the configured one.
///
/// Byte-for-byte and constant time with respect to the content. A missing
/// key never matches, and neither does anything against an empty secret.
pub fn verify_access_key(presented: Option<&[u8]>, expected: &[u8]) -> bool {
    let Some(presented) = presented else {
        return false;
    };

    if expected.is_empty() || presented.len() != expected.len() {
        return false;
    }

    presented.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_key_is_accepted() {
        assert!(verify_access_key(Some(b"secret123".as_slice()), b"secret123"));
    }

    #[test]
    fn missing_key_is_rejected() {
        assert!(!verify_access_key(None, b"secret123"));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        assert!(!verify_access_key(Some(b"secret124".as_slice()), b"secret123"));
        assert!(!verify_access_key(Some(b"secret12".as_slice()), b"secret123"));
        assert!(!verify_access_key(Some(b"SECRET123".as_slice()), b"secret123"));
    }

    #[test]
    fn empty_secret_never_matches() {
        assert!(!verify_access_key(Some(b"".as_slice()), b""));
    }
}
