use super::error::TemplateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    Escaped,
    Raw,
    Comment,
    Scriptlet,
}

impl TagKind {
    fn opener(self) -> &'static str {
        match self {
            TagKind::Escaped => "<%=",
            TagKind::Raw => "<%-",
            TagKind::Comment => "<%#",
            TagKind::Scriptlet => "<%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Text(String),
    Tag {
        kind: TagKind,
        code: String,
        line: usize,
    },
}

fn newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

/// Split a template into literal text and tags.
pub(crate) fn scan(source: &str) -> Result<Vec<Piece>, TemplateError> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut rest = source;
    let mut line = 1usize;

    while let Some(open) = rest.find("<%") {
        text.push_str(&rest[..open]);
        line += newlines(&rest[..open]);
        let after = &rest[open + 2..];

        if let Some(literal) = after.strip_prefix('%') {
            text.push_str("<%");
            rest = literal;
            continue;
        }

        let (kind, body) = match after.as_bytes().first() {
            Some(b'=') => (TagKind::Escaped, &after[1..]),
            Some(b'-') => (TagKind::Raw, &after[1..]),
            Some(b'#') => (TagKind::Comment, &after[1..]),
            Some(b'_') => (TagKind::Scriptlet, &after[1..]),
            _ => (TagKind::Scriptlet, after),
        };

        let Some(close) = body.find("%>") else {
            return Err(TemplateError::Unclosed {
                line,
                open: kind.opener().to_string(),
            });
        };

        let inner = &body[..close];
        let (code, slurp_newline) = match inner.strip_suffix('-') {
            Some(code) => (code, true),
            None => (inner.strip_suffix('_').unwrap_or(inner), false),
        };

        if !text.is_empty() {
            pieces.push(Piece::Text(std::mem::take(&mut text)));
        }
        pieces.push(Piece::Tag {
            kind,
            code: code.to_string(),
            line,
        });

        line += newlines(inner);
        rest = &body[close + 2..];
        if slurp_newline {
            if let Some(r) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
                rest = r;
                line += 1;
            }
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(pieces)
}
