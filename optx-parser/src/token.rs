//! Token definitions for operation documents
//!
//! Tokens are produced per line with the logos derive macro. The tokenizer never looks at
//! tokens across line boundaries: line types are derived from the token pattern of a single
//! line (see [`crate::lexing`]).

use logos::Logos;

/// All tokens that can appear on a single line of an operation document
#[derive(Logos, Debug, PartialEq, Eq, Clone)]
pub enum Token {
    /// The transaction delimiter
    #[token("~")]
    Delimiter,

    /// `[block]` or `[block <language>]`; carries the (possibly empty) language override
    #[regex(r"\[block([ \t]+[A-Za-z0-9_+.#-]+)?[ \t]*\]", block_language)]
    OpenBlock(String),

    #[token("[/block]")]
    CloseBlock,

    /// A `key:` prefix; carries the key without the colon
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*:", metadata_key)]
    MetadataKey(String),

    #[token(":")]
    Colon,

    #[token("[")]
    OpenBracket,

    #[regex(r"[ \t]+")]
    Whitespace,

    #[regex(r"[^ \t\r\n~\[:]+")]
    Text,
}

fn block_language(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice["[block".len()..slice.len() - 1].trim().to_string()
}

fn metadata_key(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[..slice.len() - 1].to_string()
}

impl Token {
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Token::Whitespace)
    }
}

/// Tokenize one line (without its line terminator), pairing tokens with byte spans.
///
/// Bytes logos cannot match are reported as [`Token::Text`], so every byte of the line
/// is covered by exactly one token.
pub fn tokenize_line(line: &str) -> Vec<(Token, logos::Span)> {
    let mut lexer = Token::lexer(line);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let token = result.unwrap_or(Token::Text);
        tokens.push((token, lexer.span()));
    }

    tokens
}
