// File-name templates: rendering concrete names and compiling matchers that
// recover attempt numbers from directory listings.
//
// Syntax follows the familiar `{name}` placeholder form. `{{` and `}}` stand
// for literal braces; a lone `}` is also taken literally.

use std::fmt;

use regex::Regex;

/// Placeholder bound to the submitting user.
pub const USER: &str = "user";
/// Placeholder bound to the attempt number.
pub const ATTEMPT: &str = "attempt";

/// Every placeholder name a game template may use.
pub const PLACEHOLDERS: [&str; 2] = [USER, ATTEMPT];

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}`")]
    UnknownPlaceholder(String),
    #[error("unclosed placeholder in template `{template}`")]
    UnclosedPlaceholder { template: String },
    #[error("template has no `{{{0}}}` placeholder to capture")]
    MissingCapture(String),
    /// Rendered names must stay a single entry of the stage directory.
    #[error("template `{0}` does not describe a plain file name")]
    NotAFileName(String),
    #[error("invalid matcher pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed file-name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Split `source` into literal runs and placeholders.
    ///
    /// Placeholder names are not checked here; an unknown name only fails
    /// once the template is rendered or compiled without a value for it.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                literal.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                literal.push('}');
                rest = &tail[1..];
                continue;
            }

            let close = tail
                .find('}')
                .ok_or_else(|| TemplateError::UnclosedPlaceholder {
                    template: source.to_string(),
                })?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(tail[1..close].to_string()));
            rest = &tail[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance (repeats included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Whether every rendering is a single file name: no path separators in
    /// the literal text, and never empty, `.` or `..`.
    pub fn is_file_name(&self) -> bool {
        let separator_free = self.segments.iter().all(|segment| match segment {
            Segment::Literal(text) => !text.contains(|c: char| c == '/' || c == '\\'),
            Segment::Placeholder(_) => true,
        });
        let has_placeholder = self.placeholders().next().is_some();
        separator_free && (has_placeholder || !matches!(self.source.as_str(), "" | "." | ".."))
    }

    /// Substitute every placeholder with its bound value.
    pub fn render(&self, bindings: &Bindings<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = bindings
                        .value(name)
                        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.clone()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    /// Compile into a full-match pattern where `capture` becomes a group of
    /// one or more digits and every other placeholder is replaced by its bound
    /// value. Literal text and bound values are escaped, so metacharacters in
    /// either never act as pattern syntax.
    pub fn matcher(&self, capture: &str, bindings: &Bindings<'_>) -> Result<Matcher, TemplateError> {
        let mut pattern = String::from(r"\A(?:");
        let mut groups = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Placeholder(name) if name == capture => {
                    pattern.push_str("([0-9]+)");
                    groups += 1;
                }
                Segment::Placeholder(name) => {
                    let value = bindings
                        .value(name)
                        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.clone()))?;
                    pattern.push_str(&regex::escape(&value));
                }
            }
        }

        if groups == 0 {
            return Err(TemplateError::MissingCapture(capture.to_string()));
        }
        pattern.push_str(r")\z");

        Ok(Matcher {
            regex: Regex::new(&pattern)?,
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Values available to a template. Unset fields count as not supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bindings<'a> {
    pub user: Option<&'a str>,
    pub attempt: Option<u64>,
}

impl<'a> Bindings<'a> {
    pub fn new(user: &'a str, attempt: u64) -> Self {
        Self {
            user: Some(user),
            attempt: Some(attempt),
        }
    }

    pub fn user(user: &'a str) -> Self {
        Self {
            user: Some(user),
            attempt: None,
        }
    }

    fn value(&self, name: &str) -> Option<String> {
        match name {
            USER => self.user.map(str::to_string),
            ATTEMPT => self.attempt.map(|a| a.to_string()),
            _ => None,
        }
    }
}

/// Compiled matcher returned by [`Template::matcher`].
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Match the whole of `candidate` and return the captured number.
    ///
    /// When the captured placeholder occurs more than once, every occurrence
    /// must carry the same digits.
    pub fn extract(&self, candidate: &str) -> Option<u64> {
        let captures = self.regex.captures(candidate)?;
        let mut groups = captures.iter().skip(1).flatten().map(|m| m.as_str());
        let first = groups.next()?;
        if groups.any(|g| g != first) {
            return None;
        }
        first.parse().ok()
    }

    /// The compiled pattern, mostly useful in log lines.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}
