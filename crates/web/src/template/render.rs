use serde_json::{Map, Value};

use super::error::TemplateError;
use super::parser::{Expr, Node, Segment};
use super::CompiledTemplate;

const MAX_INCLUDE_DEPTH: usize = 32;

/// Resolves `include('name')` to a compiled template.
pub trait IncludeResolver {
    fn resolve(&self, name: &str) -> Result<CompiledTemplate, TemplateError>;
}

struct Scope<'a> {
    locals: &'a Map<String, Value>,
    bindings: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Value {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.locals.get(name).cloned())
            .unwrap_or(Value::Null)
    }

    fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Str(s) => Value::String(s.clone()),
            Expr::Int(n) => Value::from(*n),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Not(inner) => Value::Bool(!truthy(&self.eval(inner))),
            Expr::Path(segments) => {
                let mut iter = segments.iter();
                let mut value = match iter.next() {
                    Some(Segment::Key(head)) => self.lookup(head),
                    _ => Value::Null,
                };
                for segment in iter {
                    value = match (segment, &value) {
                        (Segment::Key(key), Value::Object(map)) => {
                            map.get(key).cloned().unwrap_or(Value::Null)
                        }
                        (Segment::Key(key), Value::Array(items)) if key == "length" => {
                            Value::from(items.len())
                        }
                        (Segment::Key(key), Value::String(s)) if key == "length" => {
                            Value::from(s.chars().count())
                        }
                        (Segment::Index(i), Value::Array(items)) => {
                            items.get(*i).cloned().unwrap_or(Value::Null)
                        }
                        _ => Value::Null,
                    };
                }
                value
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

impl CompiledTemplate {
    /// Render with `locals` (a JSON object; anything else counts as empty).
    pub fn render(
        &self,
        locals: &Value,
        includes: &dyn IncludeResolver,
    ) -> Result<String, TemplateError> {
        let empty = Map::new();
        let locals = locals.as_object().unwrap_or(&empty);
        let mut out = String::new();
        let mut scope = Scope {
            locals,
            bindings: Vec::new(),
        };
        render_nodes(self.nodes(), &mut scope, includes, 0, &mut out)?;
        Ok(out)
    }
}

fn render_nodes(
    nodes: &[Node],
    scope: &mut Scope<'_>,
    includes: &dyn IncludeResolver,
    depth: usize,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output { expr, escape } => {
                let text = display(&scope.eval(expr));
                if *escape {
                    escape_html(&text, out);
                } else {
                    out.push_str(&text);
                }
            }
            Node::Include { view, bindings } => {
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(TemplateError::Render(format!(
                        "include depth exceeded at `{view}`"
                    )));
                }
                let mut data = scope.locals.clone();
                for (key, expr) in bindings {
                    data.insert(key.clone(), scope.eval(expr));
                }
                let template = includes.resolve(view)?;
                let mut inner = Scope {
                    locals: &data,
                    bindings: Vec::new(),
                };
                render_nodes(template.nodes(), &mut inner, includes, depth + 1, out)?;
            }
            Node::Each {
                binding,
                list,
                body,
            } => {
                let items = match scope.eval(list) {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    other => {
                        return Err(TemplateError::Render(format!(
                            "`{binding}` loop over a non-list value: {other}"
                        )))
                    }
                };
                for item in items {
                    scope.bindings.push((binding.clone(), item));
                    let result = render_nodes(body, scope, includes, depth, out);
                    scope.bindings.pop();
                    result?;
                }
            }
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let branch = if truthy(&scope.eval(cond)) {
                    then_branch
                } else {
                    else_branch
                };
                render_nodes(branch, scope, includes, depth, out)?;
            }
        }
    }
    Ok(())
}
