//! Pages, page sources and front matter.
//!
//! A page may open with an HTML comment holding `key: value` lines:
//!
//! ```text
//! <!--
//! title: Home
//! layout: site-layout
//! -->
//! ```
//!
//! The entries become page args; `layout` selects the layout page.

use std::sync::Arc;

use dashmap::DashMap;
use quill_ir::{Name, PageFragment};
use quill_parse::{parse_template, TemplateSyntax};
use quill_value::{EvalError, Number, Value};
use rustc_hash::FxHashMap;

/// A parsed template page.
#[derive(Clone, Debug)]
pub struct Page {
    pub path: Arc<str>,
    pub fragments: Vec<PageFragment>,
    pub args: FxHashMap<Name, Value>,
    pub layout: Option<Arc<str>>,
}

impl Page {
    pub fn parse(path: &str, source: &str, syntax: &TemplateSyntax) -> Result<Page, EvalError> {
        let (front_matter, body) = split_front_matter(source);
        let fragments = parse_template(body, syntax)
            .map_err(|err| EvalError::from(err).with_note(format!("in page '{path}'")))?;

        let mut args = FxHashMap::default();
        let mut layout = None;
        for (key, value) in front_matter {
            if key == "layout" {
                layout = Some(Arc::from(value));
                continue;
            }
            args.insert(Name::intern(key), front_matter_value(value));
        }
        tracing::debug!(path, fragments = fragments.len(), "parsed page");
        Ok(Page {
            path: Arc::from(path),
            fragments,
            args,
            layout,
        })
    }

    /// Page built from already parsed fragments.
    pub fn from_fragments(path: &str, fragments: Vec<PageFragment>) -> Page {
        Page {
            path: Arc::from(path),
            fragments,
            args: FxHashMap::default(),
            layout: None,
        }
    }
}

fn front_matter_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Number::parse(raw).map_or_else(|| Value::string(raw), Number::into_value),
    }
}

/// Split `<!-- key: value ... -->` off the top of a page.
fn split_front_matter(source: &str) -> (Vec<(&str, &str)>, &str) {
    let trimmed = source.trim_start();
    let Some(rest) = trimmed
        .strip_prefix("<!--")
        .and_then(|r| r.strip_prefix("\r\n").or_else(|| r.strip_prefix('\n')))
    else {
        return (Vec::new(), source);
    };
    let Some(end) = rest.find("-->") else {
        return (Vec::new(), source);
    };

    let mut entries = Vec::new();
    for line in rest[..end].lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // A line without `key:` means this was an ordinary comment.
        let Some((key, value)) = line.split_once(':') else {
            return (Vec::new(), source);
        };
        entries.push((key.trim(), value.trim()));
    }

    let body = &rest[end + 3..];
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    (entries, body)
}

/// Virtual path lookup for page sources.
pub trait PageSource: Send + Sync {
    fn load(&self, path: &str) -> Option<Arc<str>>;
}

/// Normalize a virtual path: no leading `/`, no `.html` extension.
pub fn normalize_path(path: &str) -> &str {
    let path = path.trim().trim_start_matches('/');
    path.strip_suffix(".html").unwrap_or(path)
}

/// In-memory page source.
#[derive(Debug, Default)]
pub struct MemoryPages {
    pages: DashMap<String, Arc<str>>,
}

impl MemoryPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, path: &str, source: &str) {
        self.pages
            .insert(normalize_path(path).to_owned(), Arc::from(source));
    }

    #[must_use]
    pub fn with_page(self, path: &str, source: &str) -> Self {
        self.add(path, source);
        self
    }
}

impl PageSource for MemoryPages {
    fn load(&self, path: &str) -> Option<Arc<str>> {
        self.pages
            .get(normalize_path(path))
            .map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_front_matter_becomes_args_and_layout() {
        let source = "<!--\ntitle: Home\ncount: 3\nlayout: plain\n-->\n<h1>{{ title }}</h1>";
        let page = Page::parse("index", source, &TemplateSyntax::default()).unwrap();
        assert_eq!(page.args.get(&Name::intern("title")), Some(&Value::string("Home")));
        assert_eq!(page.args.get(&Name::intern("count")), Some(&Value::Int(3)));
        assert_eq!(page.layout.as_deref(), Some("plain"));
        assert_eq!(page.fragments[0], PageFragment::text("<h1>"));
    }

    #[test]
    fn test_plain_comment_is_not_front_matter() {
        let source = "<!--\njust a note\n-->\nbody";
        let (entries, body) = split_front_matter(source);
        assert!(entries.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn test_memory_pages_normalize_paths() {
        let pages = MemoryPages::new().with_page("/docs/intro.html", "hi");
        assert_eq!(pages.load("docs/intro").as_deref(), Some("hi"));
        assert_eq!(pages.load("/docs/intro").as_deref(), Some("hi"));
        assert!(pages.load("docs/missing").is_none());
    }
}
