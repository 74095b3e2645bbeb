pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Bytes that may start a bare word. Non-ASCII bytes count as word bytes so every word
/// boundary falls on an ASCII byte and slicing stays on char boundaries.
pub(super) fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

pub(super) fn is_word_byte(b: u8) -> bool {
    is_word_start(b) || b == b'$'
}

/// Prefixes of named parameters (`:name`, `@name`, `$name`).
pub(super) fn is_parameter_prefix(b: u8) -> bool {
    matches!(b, b':' | b'@' | b'$')
}

pub(super) fn scan_word(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() && is_word_byte(bytes[idx]) {
        idx += 1;
    }
    idx
}
