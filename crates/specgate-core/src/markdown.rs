//! Markdown parser producing the document model used by the validators.
//!
//! The parser consumes [`tokenize`](crate::lexer::tokenize) output one token
//! at a time and builds an ordered list of typed [`Node`]s. Every node keeps
//! its raw source slice, so concatenating [`Node::raw`] over a document
//! reproduces the input exactly.
//!
//! # Example
//!
//! ```
//! use specgate_core::markdown::{Node, parse};
//!
//! let doc = parse("## Requirements\n\n```sh\n# comment\n```\n").unwrap();
//! let headers: Vec<_> = doc.headers().collect();
//! assert_eq!(headers.len(), 1);
//! assert_eq!(headers[0].text, "Requirements");
//! assert!(matches!(doc.nodes[2], Node::CodeBlock(_)));
//! ```

use crate::lexer::{TokenKind, tokenize};

/// A `#`-prefixed heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Number of leading `#` characters
    pub level: usize,
    /// Heading text with markers and surrounding whitespace removed
    pub text: String,
    pub raw: String,
    pub line: usize,
}

/// A run of plain text, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub content: String,
    pub line: usize,
}

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string after the opening fence (e.g. `rust`), possibly empty
    pub language: String,
    /// Lines between the fences, joined by `\n`
    pub content: String,
    pub raw: String,
    pub line: usize,
}

/// A single `-` or `*` list item line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub marker: char,
    /// Item text with the marker and surrounding whitespace removed
    pub content: String,
    pub raw: String,
    pub line: usize,
}

/// A node of a parsed markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Header(Header),
    Text(Text),
    CodeBlock(CodeBlock),
    List(ListItem),
}

impl Node {
    /// Line number (1-indexed) where this node starts
    pub fn line(&self) -> usize {
        match self {
            Node::Header(h) => h.line,
            Node::Text(t) => t.line,
            Node::CodeBlock(c) => c.line,
            Node::List(l) => l.line,
        }
    }

    /// The exact source text this node was built from
    pub fn raw(&self) -> &str {
        match self {
            Node::Header(h) => &h.raw,
            Node::Text(t) => &t.content,
            Node::CodeBlock(c) => &c.raw,
            Node::List(l) => &l.raw,
        }
    }

    /// The heading, if this node is one
    pub fn as_header(&self) -> Option<&Header> {
        match self {
            Node::Header(h) => Some(h),
            _ => None,
        }
    }
}

/// A parsed markdown document: nodes in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    /// All headings in source order
    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.nodes.iter().filter_map(Node::as_header)
    }

    /// Reassemble the source text from the nodes
    pub fn to_source(&self) -> String {
        self.nodes.iter().map(Node::raw).collect()
    }
}

/// Fatal syntax error raised while parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// Line (1-indexed) where the offending construct starts
    pub line: usize,
    pub message: String,
}

/// Parse markdown into a [`Document`].
///
/// # Errors
///
/// Returns a [`ParseError`] if a code fence is never closed.
pub fn parse(input: &str) -> Result<Document, ParseError> {
    let mut nodes = Vec::new();

    for token in tokenize(input) {
        match token.kind {
            TokenKind::Header => nodes.push(Node::Header(parse_header(token.value, token.line))),
            TokenKind::CodeBlock => {
                nodes.push(Node::CodeBlock(parse_code_block(token.value, token.line)))
            }
            TokenKind::List => nodes.push(Node::List(parse_list_item(token.value, token.line))),
            TokenKind::Text => nodes.push(Node::Text(Text {
                content: token.value.to_string(),
                line: token.line,
            })),
            TokenKind::Error => {
                return Err(ParseError {
                    line: token.line,
                    message: token.value.to_string(),
                });
            }
            TokenKind::Eof => break,
        }
    }

    Ok(Document { nodes })
}

fn parse_header(raw: &str, line: usize) -> Header {
    let level = raw.bytes().take_while(|&b| b == b'#').count();
    Header {
        level,
        text: raw[level..].trim().to_string(),
        raw: raw.to_string(),
        line,
    }
}

fn parse_code_block(raw: &str, line: usize) -> CodeBlock {
    // The lexer guarantees an opening and a closing fence
    let inner = &raw[3..raw.len() - 3];
    let (info, body) = inner.split_once('\n').unwrap_or((inner, ""));

    // Drop the newline (and any indentation) in front of the closing fence
    let body = body.trim_end_matches([' ', '\t']);
    let body = body.strip_suffix('\n').unwrap_or(body);
    let body = body.strip_suffix('\r').unwrap_or(body);

    CodeBlock {
        language: info.trim_start_matches('`').trim().to_string(),
        content: body.to_string(),
        raw: raw.to_string(),
        line,
    }
}

fn parse_list_item(raw: &str, line: usize) -> ListItem {
    let marker = raw.chars().next().unwrap_or('-');
    ListItem {
        marker,
        content: raw[marker.len_utf8()..].trim().to_string(),
        raw: raw.to_string(),
        line,
    }
}
