use logos::Logos;

use super::error::TemplateError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    // Keywords
    #[token("for")]
    For,
    #[token("of")]
    Of,
    #[token("const")]
    Const,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("include")]
    Include,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLit(i64),
    #[regex(r#""([^"\\]|\\.)*""#, unquote)]
    #[regex(r"'([^'\\]|\\.)*'", unquote)]
    StringLit(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

fn unquote(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// Lex the code inside one tag. `first_line` is the template line the code
/// starts on.
pub fn lex(code: &str, first_line: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut line = first_line;
    let mut line_start = 0usize;
    let mut scanned = 0usize;

    let mut lexer = TokenKind::lexer(code);

    while let Some(result) = lexer.next() {
        let span = lexer.span();

        for (offset, ch) in code[scanned..span.start].char_indices() {
            if ch == '\n' {
                line += 1;
                line_start = scanned + offset + 1;
            }
        }
        scanned = span.start;
        let col = span.start - line_start + 1;

        match result {
            Ok(kind) => tokens.push(Token { kind, line, col }),
            Err(_) => {
                return Err(TemplateError::Lexer {
                    line,
                    col,
                    found: code[span].to_string(),
                })
            }
        }
    }

    Ok(tokens)
}
