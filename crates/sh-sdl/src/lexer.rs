use logos::Logos;
use std::fmt;

/// Token type for the scene description language.
///
/// Keywords are not distinguished here: `world`, `model`, `include` and
/// property names are all `Token::Word`, and the compiler decides what they
/// mean from their position.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Left brace `{`.
    LBrace,
    /// Right brace `}`.
    RBrace,
    /// Left bracket `[`.
    LBracket,
    /// Right bracket `]`.
    RBracket,
    /// Comma separator `,`.
    Comma,
    /// Newline (statement separator).
    Newline,
    /// Triple-quoted description (`"""..."""`).
    DocString(String),
    /// Double-quoted string literal.
    Str(String),
    /// Integer literal; underscores are allowed as digit separators.
    Integer(i64),
    /// Floating-point literal, optionally with an exponent.
    Float(f64),
    /// Bare word (element kind, property key, or identifier value).
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Newline => write!(f, "newline"),
            Token::DocString(_) => write!(f, "description"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Integer(n) => write!(f, "{n}"),
            Token::Float(n) => write!(f, "{n}"),
            Token::Word(w) => write!(f, "{w}"),
        }
    }
}

/// Raw logos token, converted to an owned [`Token`] after lexing.
#[derive(Logos, Debug)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
enum RawToken {
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,

    #[token("\n")]
    Newline,

    #[token("\"\"\"")]
    DocStringStart,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    #[regex(r"-?[0-9][0-9_]*(\.[0-9][0-9_]*)?[eE][+-]?[0-9]+")]
    #[regex(r"-?[0-9][0-9_]*\.[0-9][0-9_]*")]
    Float,

    #[regex(r"-?[0-9][0-9_]*")]
    Integer,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Word,
}

/// A lexer error with source location.
#[derive(Debug, Clone)]
pub struct LexError {
    /// Byte range of the offending input.
    pub span: std::ops::Range<usize>,
    /// Human-readable description.
    pub message: String,
}

/// Lex source text into `(Token, Span)` pairs.
///
/// Lexing continues past errors so that every problem in a file is
/// reported in one pass.
pub fn lex(source: &str) -> (Vec<(Token, std::ops::Range<usize>)>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let raw = match result {
            Ok(raw) => raw,
            Err(()) => {
                errors.push(LexError {
                    span: span.clone(),
                    message: format!("unexpected character: {:?}", &source[span]),
                });
                continue;
            }
        };

        let token = match raw {
            RawToken::LBrace => Token::LBrace,
            RawToken::RBrace => Token::RBrace,
            RawToken::LBracket => Token::LBracket,
            RawToken::RBracket => Token::RBracket,
            RawToken::Comma => Token::Comma,
            RawToken::Newline => Token::Newline,
            RawToken::DocStringStart => {
                let remainder = lexer.remainder();
                let Some(end) = remainder.find("\"\"\"") else {
                    errors.push(LexError {
                        span,
                        message: "unterminated description (missing closing \"\"\")".to_string(),
                    });
                    // Swallow the rest of the input; nothing after it can be trusted.
                    lexer.bump(remainder.len());
                    continue;
                };
                let text = remainder[..end].trim().to_string();
                lexer.bump(end + 3);
                tokens.push((Token::DocString(text), span.start..lexer.span().end));
                continue;
            }
            RawToken::Str => {
                let slice = lexer.slice();
                Token::Str(unescape(&slice[1..slice.len() - 1]))
            }
            RawToken::Float => match lexer.slice().replace('_', "").parse::<f64>() {
                Ok(n) => Token::Float(n),
                Err(_) => {
                    errors.push(LexError {
                        span,
                        message: format!("invalid float literal: {}", lexer.slice()),
                    });
                    continue;
                }
            },
            RawToken::Integer => match lexer.slice().replace('_', "").parse::<i64>() {
                Ok(n) => Token::Integer(n),
                Err(_) => {
                    errors.push(LexError {
                        span,
                        message: format!("integer literal out of range: {}", lexer.slice()),
                    });
                    continue;
                }
            },
            RawToken::Word => Token::Word(lexer.slice().to_string()),
        };
        tokens.push((token, span));
    }

    (tokens, errors)
}

/// Resolve `\\`, `\n`, `\t` and `\"` escapes. Unknown escapes are kept verbatim.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
