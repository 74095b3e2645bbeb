use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, is_parameter_prefix,
    is_word_start, scan_word,
};

#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    Bracketed,
    LineComment,
    BlockComment,
}

/// Bare words of a SQL string, skipping comments, string literals, quoted identifiers and
/// named parameters. Unterminated literals or comments swallow the rest of the input.
pub(super) struct Words<'a> {
    sql: &'a str,
    idx: usize,
}

impl<'a> Words<'a> {
    pub(super) fn new(sql: &'a str) -> Self {
        Self { sql, idx: 0 }
    }
}

impl<'a> Iterator for Words<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.sql.as_bytes();
        let mut state = State::Normal;

        while self.idx < bytes.len() {
            let idx = self.idx;
            let b = bytes[idx];
            match state {
                State::Normal => {
                    if is_word_start(b) {
                        let end = scan_word(bytes, idx);
                        self.idx = end;
                        return Some(&self.sql[idx..end]);
                    }
                    match b {
                        b'\'' => state = State::SingleQuoted,
                        b'"' => state = State::DoubleQuoted,
                        b'`' => state = State::Backticked,
                        b'[' => state = State::Bracketed,
                        _ if is_line_comment_start(bytes, idx) => {
                            state = State::LineComment;
                            self.idx += 1;
                        }
                        _ if is_block_comment_start(bytes, idx) => {
                            state = State::BlockComment;
                            self.idx += 1;
                        }
                        _ if is_parameter_prefix(b)
                            && bytes.get(idx + 1).is_some_and(|n| is_word_start(*n)) =>
                        {
                            self.idx = scan_word(bytes, idx + 1);
                            continue;
                        }
                        _ => {}
                    }
                }
                State::SingleQuoted => {
                    if b == b'\'' {
                        if bytes.get(idx + 1) == Some(&b'\'') {
                            self.idx += 1; // escaped quote
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::DoubleQuoted => {
                    if b == b'"' {
                        if bytes.get(idx + 1) == Some(&b'"') {
                            self.idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::Backticked => {
                    if b == b'`' {
                        if bytes.get(idx + 1) == Some(&b'`') {
                            self.idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::Bracketed => {
                    if b == b']' {
                        state = State::Normal;
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        state = State::Normal;
                    }
                }
                // SQLite block comments do not nest
                State::BlockComment => {
                    if is_block_comment_end(bytes, idx) {
                        state = State::Normal;
                        self.idx += 1;
                    }
                }
            }
            self.idx += 1;
        }
        None
    }
}
