//! Markdown documents with YAML front matter.
//!
//! A document is an optional front matter block followed by a body:
//!
//! ```text
//! ---
//! tags:
//!   - failed-on-20240101
//! ---
//! # Body text
//! ```
//!
//! `Document::parse` and `Document::render` are the only place front matter
//! text is read or written. Everything else works on the typed `FrontMatter`.

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::error::{Result, SetbackError};

const FENCE: &str = "---";
const TAGS_KEY: &str = "tags";

/// Parsed front matter. Keys keep their original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    fields: Mapping,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build front matter from any serializable value that maps to a YAML
    /// mapping.
    pub fn from_serializable<T: serde::Serialize>(value: &T) -> Result<Self> {
        match serde_yaml::to_value(value)? {
            Value::Mapping(fields) => Ok(Self { fields }),
            _ => Err(SetbackError::document("front matter must be a mapping")),
        }
    }

    /// Deserialize the whole front matter into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_yaml::from_value(Value::Mapping(self.fields.clone()))?)
    }

    /// Raw field lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Whether a `tags` field exists (list or single string).
    pub fn has_tags_field(&self) -> bool {
        matches!(
            self.fields.get(TAGS_KEY),
            Some(Value::Sequence(_)) | Some(Value::String(_))
        )
    }

    /// Tags listed in the `tags` field, as written.
    pub fn tags(&self) -> Vec<String> {
        match self.fields.get(TAGS_KEY) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => single
                .split([',', ' '])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `tag` is listed, ignoring a leading `#` on either side.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = normalize_tag(tag);
        self.tags().iter().any(|t| normalize_tag(t) == wanted)
    }

    /// Add `tag` to the `tags` field, converting a single-string field to a
    /// list. Returns false if it was already present.
    pub fn insert_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        let mut tags: Vec<Value> = self.tags().into_iter().map(Value::String).collect();
        tags.push(Value::String(normalize_tag(tag).to_string()));
        self.fields
            .insert(Value::String(TAGS_KEY.to_string()), Value::Sequence(tags));
        true
    }

    fn to_yaml(&self) -> Result<String> {
        if self.fields.is_empty() {
            return Ok(String::new());
        }
        Ok(serde_yaml::to_string(&self.fields)?)
    }
}

/// Strip the leading `#` markdown uses for inline tags.
pub fn normalize_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches('#')
}

/// A markdown document split into front matter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub front_matter: Option<FrontMatter>,
    pub body: String,
}

impl Document {
    /// Split `content` into front matter and body.
    ///
    /// A document without an opening `---` line has no front matter. An
    /// opening fence without a closing one is an error.
    pub fn parse(content: &str) -> Result<Self> {
        let Some(rest) = strip_fence_line(content) else {
            return Ok(Self {
                front_matter: None,
                body: content.to_string(),
            });
        };

        let mut offset = 0;
        for line in rest.split_inclusive('\n') {
            if line.trim_end_matches(['\r', '\n']) == FENCE {
                let yaml = &rest[..offset];
                let body = &rest[offset + line.len()..];
                let fields = if yaml.trim().is_empty() {
                    Mapping::new()
                } else {
                    match serde_yaml::from_str::<Value>(yaml)? {
                        Value::Mapping(m) => m,
                        Value::Null => Mapping::new(),
                        _ => {
                            return Err(SetbackError::document(
                                "front matter must be a mapping",
                            ))
                        }
                    }
                };
                return Ok(Self {
                    front_matter: Some(FrontMatter { fields }),
                    body: body.to_string(),
                });
            }
            offset += line.len();
        }

        Err(SetbackError::document("unterminated front matter"))
    }

    /// Render back to markdown text.
    pub fn render(&self) -> Result<String> {
        match &self.front_matter {
            None => Ok(self.body.clone()),
            Some(fm) => Ok(format!("{FENCE}\n{}{FENCE}\n{}", fm.to_yaml()?, self.body)),
        }
    }

    /// Whether `tag` appears as a whitespace-delimited token in the body.
    pub fn body_has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.body.split_whitespace().any(|token| token == tag)
    }

    /// Whether `tag` is present anywhere in the document.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.front_matter.as_ref().is_some_and(|fm| fm.has_tag(tag)) || self.body_has_tag(tag)
    }

    /// Add `tag` in the least invasive place: the front matter `tags` field
    /// when one exists, otherwise a new line at the end of the body.
    /// Returns false when the tag was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        if let Some(fm) = self.front_matter.as_mut() {
            if fm.has_tags_field() {
                return fm.insert_tag(tag);
            }
        }
        append_line(&mut self.body, tag.trim());
        true
    }
}

/// Append `line` to `text` on its own line.
pub fn append_line(text: &mut String, line: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    text.push('\n');
}

fn strip_fence_line(content: &str) -> Option<&str> {
    content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))
}
