use super::error::TemplateError;
use super::lexer::{lex, Token, TokenKind};
use super::scan::{Piece, TagKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(Vec<Segment>),
    Str(String),
    Int(i64),
    Bool(bool),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output {
        expr: Expr,
        escape: bool,
    },
    Include {
        view: String,
        bindings: Vec<(String, Expr)>,
    },
    Each {
        binding: String,
        list: Expr,
        body: Vec<Node>,
    },
    If {
        cond: Expr,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
}

enum Block {
    Each { binding: String, list: Expr },
    If { cond: Expr, then_branch: Option<Vec<Node>> },
}

struct Frame {
    block: Block,
    line: usize,
    body: Vec<Node>,
}

impl Frame {
    fn close(self) -> Node {
        match self.block {
            Block::Each { binding, list } => Node::Each {
                binding,
                list,
                body: self.body,
            },
            Block::If {
                cond,
                then_branch: Some(then_branch),
            } => Node::If {
                cond,
                then_branch,
                else_branch: self.body,
            },
            Block::If {
                cond,
                then_branch: None,
            } => Node::If {
                cond,
                then_branch: self.body,
                else_branch: Vec::new(),
            },
        }
    }
}

enum Scriptlet {
    Empty,
    Open(Block),
    Else,
    Close,
}

pub(crate) fn parse(pieces: &[Piece]) -> Result<Vec<Node>, TemplateError> {
    let mut root = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    for piece in pieces {
        let node = match piece {
            Piece::Text(text) => Node::Text(text.clone()),
            Piece::Tag {
                kind: TagKind::Comment,
                ..
            } => continue,
            Piece::Tag { kind, code, line } => {
                let tokens = lex(code, *line)?;
                let mut cursor = Cursor::new(&tokens, *line);
                match kind {
                    TagKind::Escaped => cursor.output(true)?,
                    TagKind::Raw => cursor.output(false)?,
                    _ => match cursor.scriptlet()? {
                        Scriptlet::Empty => continue,
                        Scriptlet::Open(block) => {
                            frames.push(Frame {
                                block,
                                line: *line,
                                body: Vec::new(),
                            });
                            continue;
                        }
                        Scriptlet::Else => {
                            match frames.last_mut() {
                                Some(Frame {
                                    block: Block::If { then_branch, .. },
                                    body,
                                    ..
                                }) if then_branch.is_none() => {
                                    *then_branch = Some(std::mem::take(body));
                                }
                                _ => {
                                    return Err(TemplateError::Unbalanced {
                                        line: *line,
                                        msg: "`else` without a matching `if`".into(),
                                    })
                                }
                            }
                            continue;
                        }
                        Scriptlet::Close => match frames.pop() {
                            Some(frame) => frame.close(),
                            None => {
                                return Err(TemplateError::Unbalanced {
                                    line: *line,
                                    msg: "unexpected `}`".into(),
                                })
                            }
                        },
                    },
                }
            }
        };
        match frames.last_mut() {
            Some(frame) => frame.body.push(node),
            None => root.push(node),
        }
    }

    if let Some(frame) = frames.last() {
        return Err(TemplateError::Unbalanced {
            line: frame.line,
            msg: "missing `}` for block opened".into(),
        });
    }
    Ok(root)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token], line: usize) -> Self {
        Cursor {
            tokens,
            pos: 0,
            line,
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(self.line)
    }

    fn advance(&mut self) -> Option<&TokenKind> {
        let token = self.tokens.get(self.pos).map(|t| &t.kind);
        self.pos += 1;
        token
    }

    fn error(&self, msg: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            line: self.current_line(),
            msg: msg.into(),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), TemplateError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", self.describe())))
        }
    }

    fn describe(&self) -> String {
        match self.peek() {
            Some(kind) => format!("{kind:?}"),
            None => "end of tag".into(),
        }
    }

    fn finish(&mut self) -> Result<(), TemplateError> {
        self.eat(&TokenKind::Semi);
        if self.peek().is_some() {
            return Err(self.error(format!("unexpected {}", self.describe())));
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<String, TemplateError> {
        match self.peek() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected identifier, found {}", self.describe()))),
        }
    }

    fn output(&mut self, escape: bool) -> Result<Node, TemplateError> {
        if !escape && self.eat(&TokenKind::Include) {
            let node = self.include()?;
            self.finish()?;
            return Ok(node);
        }
        let expr = self.expr()?;
        self.finish()?;
        Ok(Node::Output { expr, escape })
    }

    fn include(&mut self) -> Result<Node, TemplateError> {
        self.expect(TokenKind::LParen, "`(` after include")?;
        let view = match self.advance().cloned() {
            Some(TokenKind::StringLit(name)) => name,
            _ => return Err(self.error("include expects a quoted view name")),
        };
        let mut bindings = Vec::new();
        if self.eat(&TokenKind::Comma) {
            self.expect(TokenKind::LBrace, "`{` opening include locals")?;
            while !self.eat(&TokenKind::RBrace) {
                let key = match self.advance().cloned() {
                    Some(TokenKind::Ident(key)) | Some(TokenKind::StringLit(key)) => key,
                    _ => return Err(self.error("expected a key in include locals")),
                };
                self.expect(TokenKind::Colon, "`:` after include key")?;
                let value = self.expr()?;
                bindings.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    self.expect(TokenKind::RBrace, "`}` closing include locals")?;
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)` closing include")?;
        Ok(Node::Include { view, bindings })
    }

    fn scriptlet(&mut self) -> Result<Scriptlet, TemplateError> {
        match self.peek() {
            None => Ok(Scriptlet::Empty),
            Some(TokenKind::For) => {
                self.pos += 1;
                self.expect(TokenKind::LParen, "`(` after for")?;
                if !self.eat(&TokenKind::Const) {
                    self.eat(&TokenKind::Let);
                }
                let binding = self.ident()?;
                self.expect(TokenKind::Of, "`of` in for loop")?;
                let list = self.expr()?;
                self.expect(TokenKind::RParen, "`)` closing for")?;
                self.expect(TokenKind::LBrace, "`{` opening loop body")?;
                self.finish()?;
                Ok(Scriptlet::Open(Block::Each { binding, list }))
            }
            Some(TokenKind::If) => {
                self.pos += 1;
                self.expect(TokenKind::LParen, "`(` after if")?;
                let cond = self.expr()?;
                self.expect(TokenKind::RParen, "`)` closing if")?;
                self.expect(TokenKind::LBrace, "`{` opening if body")?;
                self.finish()?;
                Ok(Scriptlet::Open(Block::If {
                    cond,
                    then_branch: None,
                }))
            }
            Some(TokenKind::RBrace) => {
                self.pos += 1;
                if self.eat(&TokenKind::Else) {
                    self.expect(TokenKind::LBrace, "`{` after else")?;
                    self.finish()?;
                    return Ok(Scriptlet::Else);
                }
                self.finish()?;
                Ok(Scriptlet::Close)
            }
            Some(_) => Err(self.error(format!(
                "unsupported scriptlet starting with {}",
                self.describe()
            ))),
        }
    }

    fn expr(&mut self) -> Result<Expr, TemplateError> {
        match self.advance().cloned() {
            Some(TokenKind::Bang) => Ok(Expr::Not(Box::new(self.expr()?))),
            Some(TokenKind::StringLit(s)) => Ok(Expr::Str(s)),
            Some(TokenKind::IntLit(n)) => Ok(Expr::Int(n)),
            Some(TokenKind::True) => Ok(Expr::Bool(true)),
            Some(TokenKind::False) => Ok(Expr::Bool(false)),
            Some(TokenKind::Ident(head)) => {
                let mut segments = vec![Segment::Key(head)];
                loop {
                    if self.eat(&TokenKind::Dot) {
                        segments.push(Segment::Key(self.ident()?));
                    } else if self.eat(&TokenKind::LBracket) {
                        let segment = match self.advance().cloned() {
                            Some(TokenKind::StringLit(key)) => Segment::Key(key),
                            Some(TokenKind::IntLit(n)) if n >= 0 => Segment::Index(n as usize),
                            _ => return Err(self.error("expected a string or index inside `[]`")),
                        };
                        self.expect(TokenKind::RBracket, "`]`")?;
                        segments.push(segment);
                    } else {
                        break;
                    }
                }
                Ok(Expr::Path(segments))
            }
            Some(other) => {
                self.pos -= 1;
                Err(self.error(format!("unexpected {other:?} in expression")))
            }
            None => Err(self.error("missing expression")),
        }
    }
}
