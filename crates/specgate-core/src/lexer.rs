//! Markdown tokenizer for spec documents
//!
//! This module splits raw markdown into a flat stream of tokens. Only the
//! constructs the validators care about are distinguished: headings, fenced
//! code blocks and `-`/`*` list items. Everything else is text.
//!
//! Fenced code blocks are opaque: a `#` inside a fence is never a heading.

use std::fmt;

/// Kind of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Lexing failed; the token value holds the message
    Error,
    /// End of input
    Eof,
    /// Plain text, passed through untouched
    Text,
    /// A `#`-prefixed heading line, trailing newline included
    Header,
    /// A fenced code block, from the opening fence through the closing one
    CodeBlock,
    /// A `- ` or `* ` list item line
    List,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Error => "error",
            TokenKind::Eof => "eof",
            TokenKind::Text => "text",
            TokenKind::Header => "header",
            TokenKind::CodeBlock => "code block",
            TokenKind::List => "list",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token borrowed from the lexed input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw source slice (for `Error`, the error message)
    pub value: &'a str,
    /// Line number (1-indexed) where the token starts
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Header,
    CodeBlock,
    List,
    Eof,
    Done,
}

const FENCE: &[u8] = b"```";

/// Pull-based tokenizer over a markdown string.
///
/// Yields tokens in source order and ends after the `Eof` token, or right
/// after an `Error` token if a code fence is never closed.
pub struct Lexer<'a> {
    input: &'a str,
    /// Start of the token being built
    start: usize,
    /// Line number at `start`
    line: usize,
    state: State,
}

/// Tokenize `input`.
pub fn tokenize(input: &str) -> Lexer<'_> {
    Lexer {
        input,
        start: 0,
        line: 1,
        state: State::Text,
    }
}

impl<'a> Lexer<'a> {
    fn is_line_start(&self, pos: usize) -> bool {
        pos == 0 || self.input.as_bytes()[pos - 1] == b'\n'
    }

    /// Emit `input[start..end]` as a token and move past it.
    fn emit(&mut self, kind: TokenKind, end: usize) -> Token<'a> {
        let value = &self.input[self.start..end];
        let token = Token {
            kind,
            value,
            line: self.line,
        };
        self.line += value.bytes().filter(|&b| b == b'\n').count();
        self.start = end;
        token
    }

    /// End of the line starting at or containing `pos`, newline included.
    fn line_end(&self, pos: usize) -> usize {
        match self.input[pos..].find('\n') {
            Some(idx) => pos + idx + 1,
            None => self.input.len(),
        }
    }

    /// Scan forward from `start` for the next structural construct.
    ///
    /// Returns its position and the state it switches to, or `None` when the
    /// rest of the input is plain text.
    fn next_boundary(&self) -> Option<(usize, State)> {
        let bytes = self.input.as_bytes();
        let mut pos = self.start;
        while pos < bytes.len() {
            if bytes[pos..].starts_with(FENCE) {
                return Some((pos, State::CodeBlock));
            }
            if self.is_line_start(pos) {
                if bytes[pos] == b'#' {
                    return Some((pos, State::Header));
                }
                if bytes[pos..].starts_with(b"- ") || bytes[pos..].starts_with(b"* ") {
                    return Some((pos, State::List));
                }
            }
            pos += 1;
        }
        None
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            match self.state {
                State::Text => match self.next_boundary() {
                    Some((pos, next)) => {
                        self.state = next;
                        if pos > self.start {
                            return Some(self.emit(TokenKind::Text, pos));
                        }
                    }
                    None => {
                        self.state = State::Eof;
                        if self.start < self.input.len() {
                            return Some(self.emit(TokenKind::Text, self.input.len()));
                        }
                    }
                },
                State::Header => {
                    self.state = State::Text;
                    let end = self.line_end(self.start);
                    return Some(self.emit(TokenKind::Header, end));
                }
                State::List => {
                    self.state = State::Text;
                    let end = self.line_end(self.start);
                    return Some(self.emit(TokenKind::List, end));
                }
                State::CodeBlock => {
                    let body = self.start + FENCE.len();
                    return match self.input[body..].find("```") {
                        Some(idx) => {
                            self.state = State::Text;
                            Some(self.emit(TokenKind::CodeBlock, body + idx + FENCE.len()))
                        }
                        None => {
                            self.state = State::Done;
                            Some(Token {
                                kind: TokenKind::Error,
                                value: "unclosed code block",
                                line: self.line,
                            })
                        }
                    };
                }
                State::Eof => {
                    self.state = State::Done;
                    return Some(Token {
                        kind: TokenKind::Eof,
                        value: "",
                        line: self.line,
                    });
                }
                State::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_header_and_text() {
        let tokens: Vec<_> = tokenize("# Title\nSome text\n").collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::Header);
        assert_eq!(tokens[0].value, "# Title\n");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].kind, TokenKind::Text);
        assert_eq!(tokens[1].value, "Some text\n");
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn test_hash_inside_code_block_is_not_a_header() {
        let input = "```bash\n# not a heading\n```\n## Real\n";
        let tokens: Vec<_> = tokenize(input).collect();
        assert_eq!(tokens[0].kind, TokenKind::CodeBlock);
        assert_eq!(tokens[0].value, "```bash\n# not a heading\n```");
        assert_eq!(tokens[1].kind, TokenKind::Text);
        assert_eq!(tokens[1].value, "\n");
        assert_eq!(tokens[2].kind, TokenKind::Header);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn test_list_items() {
        assert_eq!(
            kinds("- one\n* two\n-three\n"),
            vec![
                TokenKind::List,
                TokenKind::List,
                TokenKind::Text,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_markers_only_at_line_start() {
        // Indented or mid-line markers stay text
        assert_eq!(
            kinds("text # here\n  - nested\n"),
            vec![TokenKind::Text, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unclosed_code_block() {
        let tokens: Vec<_> = tokenize("intro\n```rust\nfn main() {}\n").collect();
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.value, "unclosed code block");
        assert_eq!(last.line, 2);
        // Nothing after the error, not even EOF
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Eof));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_header_without_trailing_newline() {
        let tokens: Vec<_> = tokenize("text\n### Requirement: X").collect();
        assert_eq!(tokens[1].kind, TokenKind::Header);
        assert_eq!(tokens[1].value, "### Requirement: X");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_values_cover_input() {
        let input = "# A\n\npara *emph*\n- item\n```\ncode\n```\n#### Scenario: s\nend";
        let joined: String = tokenize(input).map(|t| t.value).collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn test_line_numbers_after_code_block() {
        let input = "```\na\nb\n```\n- item\n";
        let list = tokenize(input)
            .find(|t| t.kind == TokenKind::List)
            .unwrap();
        assert_eq!(list.line, 5);
    }
}
