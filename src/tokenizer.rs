//! Line-at-a-time tokenizer for VM source.
//!
//! Each call to [`Tokenizer::read_next_command`] consumes one physical line,
//! drops any `//` comment and splits the rest on runs of whitespace. Blank and
//! comment-only lines leave the token queue empty.

use std::collections::VecDeque;
use std::io::{self, BufRead, Seek, SeekFrom};

/// Split a raw line into tokens, ignoring anything after `//`.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let line = line.split_once("//").map(|(s, _)| s).unwrap_or(line);
    line.split_whitespace().map(str::to_string).collect()
}

pub struct Tokenizer<R> {
    reader: R,
    pending: Option<String>,
    tokens: VecDeque<String>,
    line: usize,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            pending: None,
            tokens: VecDeque::new(),
            line: 0,
        }
    }

    /// Whether another source line remains. Reads ahead by one line but does
    /// not consume it, so repeated calls are harmless.
    pub fn has_more_commands(&mut self) -> io::Result<bool> {
        if self.pending.is_none() {
            let mut buf = String::new();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(false);
            }
            self.pending = Some(buf);
        }
        Ok(true)
    }

    /// Move onto the next line and tokenize it. At end of input the token
    /// queue is simply left empty.
    pub fn read_next_command(&mut self) -> io::Result<()> {
        self.tokens.clear();
        if !self.has_more_commands()? {
            return Ok(());
        }
        if let Some(line) = self.pending.take() {
            self.line += 1;
            self.tokens.extend(tokenize_line(&line));
        }
        Ok(())
    }

    pub fn has_more_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn next_token(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }

    /// Tokens of the current line not yet taken.
    pub fn remaining(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// 1-based number of the line most recently read, 0 before the first.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead + Seek> Tokenizer<R> {
    /// Start again from the top of the source, for callers that make more
    /// than one pass.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.pending = None;
        self.tokens.clear();
        self.line = 0;
        Ok(())
    }
}

#[cfg(test)]
use std::io::Cursor;

#[test]
fn test_tokenize_line() {
    assert_eq!(tokenize_line("  push   constant\t7  // seven"), ["push", "constant", "7"]);
    assert!(tokenize_line("// just a comment").is_empty());
    assert!(tokenize_line("   \r").is_empty());
    assert_eq!(tokenize_line("add//no space"), ["add"]);
}

#[test]
fn test_line_by_line() {
    let mut t = Tokenizer::new(Cursor::new("push constant 1\n\n// note\nadd\n"));
    let mut lines = vec![];
    while t.has_more_commands().unwrap() {
        t.read_next_command().unwrap();
        let mut toks = vec![];
        while t.has_more_tokens() {
            toks.push(t.next_token().unwrap());
        }
        lines.push((t.line(), toks));
    }
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], (1, vec!["push".to_string(), "constant".into(), "1".into()]));
    assert!(lines[1].1.is_empty());
    assert!(lines[2].1.is_empty());
    assert_eq!(lines[3], (4, vec!["add".to_string()]));
    assert_eq!(t.next_token(), None);
}

#[test]
fn test_has_more_is_idempotent() {
    let mut t = Tokenizer::new(Cursor::new("neg"));
    assert!(t.has_more_commands().unwrap());
    assert!(t.has_more_commands().unwrap());
    t.read_next_command().unwrap();
    assert_eq!(t.next_token().as_deref(), Some("neg"));
    assert!(!t.has_more_commands().unwrap());
}

#[test]
fn test_rewind() {
    let mut t = Tokenizer::new(Cursor::new("label A\ngoto A\n"));
    t.read_next_command().unwrap();
    t.read_next_command().unwrap();
    assert_eq!(t.line(), 2);
    t.rewind().unwrap();
    assert_eq!(t.line(), 0);
    t.read_next_command().unwrap();
    assert_eq!(t.remaining().collect::<Vec<_>>(), ["label", "A"]);
}
