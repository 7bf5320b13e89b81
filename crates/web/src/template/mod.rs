//! A compiler for the EJS subset the views are written in.
//!
//! Tags: `<%= expr %>` (escaped), `<%- expr %>` (raw, also `include(..)`),
//! `<%# comment %>`, `<%% ` for a literal `<%`, and scriptlets limited to
//! `for (const x of list) {`, `if (cond) {`, `} else {` and `}`. A closing
//! `-%>` swallows the newline that follows it.

mod error;
mod lexer;
mod parser;
mod render;
mod scan;

pub use error::{TemplateError, COMPILE_MARKER};
pub use lexer::{lex, Token, TokenKind};
pub use parser::{Expr, Node, Segment};
pub use render::IncludeResolver;

use std::collections::BTreeSet;

/// A parsed template, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    nodes: Vec<Node>,
}

pub fn compile(source: &str) -> Result<CompiledTemplate, TemplateError> {
    let pieces = scan::scan(source)?;
    let nodes = parser::parse(&pieces)?;
    Ok(CompiledTemplate { nodes })
}

impl CompiledTemplate {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Names of the views this template includes, in sorted order.
    pub fn includes(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_includes(&self.nodes, &mut names);
        names
    }
}

fn collect_includes(nodes: &[Node], names: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Include { view, .. } => {
                names.insert(view.clone());
            }
            Node::Each { body, .. } => collect_includes(body, names),
            Node::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_includes(then_branch, names);
                collect_includes(else_branch, names);
            }
            Node::Text(_) | Node::Output { .. } => {}
        }
    }
}
