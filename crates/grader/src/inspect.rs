use regex::Regex;
use scraper::{Html, Selector};
use tellerkit_web::template::{self, TemplateError, COMPILE_MARKER};

use crate::error::{CheckError, Failure, HarnessError};

/// The raw text of one view file.
#[derive(Debug, Clone)]
pub struct ViewSource {
    pub file: String,
    pub text: String,
}

impl ViewSource {
    /// Compile the view, turning a compiler error into a failure that names
    /// the file.
    pub fn compile(&self) -> Result<(), Failure> {
        template::compile(&self.text)
            .map(|_| ())
            .map_err(|err| Failure::new(focused_diagnostic(&err, &self.file)))
    }

    pub fn matches(&self, pattern: &str) -> Result<bool, HarnessError> {
        matches(&self.text, pattern)
    }

    /// Fail with `message` unless `pattern` matches somewhere in the view.
    pub fn require(&self, pattern: &str, message: &str) -> Result<(), CheckError> {
        if self.matches(pattern)? {
            Ok(())
        } else {
            Err(Failure::new(message).into())
        }
    }

    pub fn markup(&self) -> Markup {
        Markup::parse(&self.text)
    }
}

/// Keep the compiler's description of the problem, drop its own trailer and
/// name the template instead: `... at line 3 compiling index.ejs`.
pub fn focused_diagnostic(err: &TemplateError, file: &str) -> String {
    let message = err.to_string();
    let head = match message.find(COMPILE_MARKER) {
        Some(at) => message[..at].trim_end().trim_end_matches("while").trim_end(),
        None => message.as_str(),
    };
    format!("{head} compiling {file}")
}

pub fn matches(text: &str, pattern: &str) -> Result<bool, HarnessError> {
    let regex = Regex::new(pattern).map_err(|e| HarnessError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Ok(regex.is_match(text))
}

/// Parsed markup queried with CSS selectors. Template tags stay as literal
/// text and attribute values.
pub struct Markup {
    html: Html,
}

impl Markup {
    pub fn parse(text: &str) -> Self {
        Markup {
            html: Html::parse_document(text),
        }
    }

    fn selector(selector: &str) -> Result<Selector, HarnessError> {
        Selector::parse(selector).map_err(|_| HarnessError::Selector(selector.to_string()))
    }

    pub fn count(&self, selector: &str) -> Result<usize, HarnessError> {
        let selector = Markup::selector(selector)?;
        Ok(self.html.select(&selector).count())
    }

    /// Attribute of the `index`th element matching `selector`.
    pub fn nth_attr(
        &self,
        selector: &str,
        index: usize,
        attr: &str,
    ) -> Result<Option<String>, HarnessError> {
        let selector = Markup::selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .nth(index)
            .and_then(|el| el.value().attr(attr))
            .map(str::to_string))
    }

    pub fn attr(&self, selector: &str, attr: &str) -> Result<Option<String>, HarnessError> {
        self.nth_attr(selector, 0, attr)
    }

    pub fn last_attr(&self, selector: &str, attr: &str) -> Result<Option<String>, HarnessError> {
        let selector = Markup::selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .last()
            .and_then(|el| el.value().attr(attr))
            .map(str::to_string))
    }
}
