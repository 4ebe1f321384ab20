use crate::errors::{malformed_key, TagcacheResult};

/// The longest key the memcache protocol accepts, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// Checks whether `key` may be sent to the server.
///
/// A legal key is between 1 and 250 bytes long and holds no whitespace,
/// control characters (any byte up to and including `0x20`) or `DEL` (`0x7f`).
pub fn legal_key(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    key.bytes().all(|b| b > b' ' && b != 0x7f)
}

pub(crate) fn check_key(key: &str) -> TagcacheResult<()> {
    if legal_key(key) {
        Ok(())
    } else {
        Err(malformed_key())
    }
}
