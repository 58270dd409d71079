use crate::ObjectError;

/// Alphabet of constructor tags. A character's index is its 6-bit code.
const TAG_CHARS: &[u8; 64] =
    b"_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789'";

/// Only this many leading characters take part in the hash.
pub const MAX_TAG_LEN: usize = 5;

pub fn tag_hash(name: &[u8]) -> Result<i32, ObjectError> {
    let mut hash = 0i32;
    for &c in name.iter().take(MAX_TAG_LEN) {
        let code = TAG_CHARS
            .iter()
            .position(|&t| t == c)
            .ok_or(ObjectError::BadTagChar(c as char))?;
        hash = (hash << 6) | code as i32;
    }
    Ok(hash)
}

/// Inverse of [`tag_hash`] for tags of at most [`MAX_TAG_LEN`] characters.
pub fn tag_name(hash: i32) -> String {
    let mut bytes = Vec::with_capacity(MAX_TAG_LEN);
    let mut h = hash;
    while h != 0 {
        bytes.push(TAG_CHARS[(h & 0x3f) as usize]);
        h >>= 6;
    }
    bytes.reverse();
    String::from_utf8_lossy(&bytes).into_owned()
}
