//! Turning a staged text artifact into the fields of a document payload.

use crate::config::DocumentsConfig;
use crate::error::{HubError, Result};
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

#[derive(Debug, Default, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, alias = "doc_id")]
    pub target_doc_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArtifact {
    pub title: String,
    pub body: String,
    /// Resolved collection id.
    pub collection_id: Option<String>,
    pub parent_document_id: Option<String>,
    pub target_doc_id: Option<String>,
}

pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Split optional `---` delimited YAML front-matter from the body.
pub fn split_front_matter<'a>(key: &str, content: &'a str) -> Result<(FrontMatter, &'a str)> {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return Ok((FrontMatter::default(), content));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let fm = if yaml.trim().is_empty() {
                FrontMatter::default()
            } else {
                serde_yaml::from_str(yaml).map_err(|e| HubError::MalformedEntry {
                    key: key.to_string(),
                    reason: format!("invalid front-matter: {e}"),
                })?
            };
            return Ok((fm, body));
        }
        offset += line.len();
    }
    Err(HubError::MalformedEntry {
        key: key.to_string(),
        reason: "front-matter is not closed by '---'".to_string(),
    })
}

/// Remove the first `# ` heading from `body` and return its text.
fn take_heading(body: &str) -> Option<(String, String)> {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if let Some(title) = line.trim_end().strip_prefix("# ") {
            let title = title.trim();
            if !title.is_empty() {
                let rest = format!("{}{}", &body[..offset], &body[offset + line.len()..]);
                return Some((title.to_string(), rest));
            }
        }
        offset += line.len();
    }
    None
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([A-Za-z0-9][A-Za-z0-9_-]*)").expect("valid regex"))
}

/// Find the first `#Name` hashtag naming a configured collection, strip it,
/// and return the collection id.
fn take_hashtag_collection(body: &str, docs: &DocumentsConfig) -> Option<(String, String)> {
    for caps in hashtag_re().captures_iter(body) {
        let name = caps.get(1)?;
        let configured = docs
            .collections
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_str()));
        if let Some((_, id)) = configured {
            // Drop the `#` along with the name.
            let start = name.start() - 1;
            let rest = format!("{}{}", &body[..start], &body[name.end()..]);
            return Some((id.clone(), rest));
        }
    }
    None
}

/// Parse a staged artifact.
///
/// Title: front-matter `title`, else the first `# ` heading (removed from
/// the body). Collection: front-matter `collection`, else the first matching
/// hashtag (removed), else the configured default.
pub fn parse_artifact(key: &str, content: &str, docs: &DocumentsConfig) -> Result<ParsedArtifact> {
    let (fm, body) = split_front_matter(key, content)?;
    let mut body = body.to_string();

    let title = match fm.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => {
            let (t, rest) = take_heading(&body).ok_or_else(|| HubError::MalformedEntry {
                key: key.to_string(),
                reason: "no title in front-matter and no '# ' heading".to_string(),
            })?;
            body = rest;
            t
        }
    };

    let collection_id = match fm.collection.as_deref() {
        Some(name) => Some(
            docs.resolve_collection(name)
                .map(str::to_string)
                .ok_or_else(|| HubError::MalformedEntry {
                    key: key.to_string(),
                    reason: format!("unknown collection '{name}'"),
                })?,
        ),
        None => match take_hashtag_collection(&body, docs) {
            Some((id, rest)) => {
                body = rest;
                Some(id)
            }
            None => docs.default_collection_id(),
        },
    };

    Ok(ParsedArtifact {
        title,
        body: body.trim().to_string(),
        collection_id,
        parent_document_id: fm.parent,
        target_doc_id: fm.target_doc_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> DocumentsConfig {
        let mut d = DocumentsConfig::default();
        d.collections.insert("Inbox".into(), "col-inbox".into());
        d.collections.insert("Projects".into(), "col-proj".into());
        d.default_collection = Some("Inbox".into());
        d
    }

    #[test]
    fn title_from_heading_is_removed_from_body() {
        let p = parse_artifact("hello", "# Hello\n\nSome text.\n", &docs()).unwrap();
        assert_eq!(p.title, "Hello");
        assert_eq!(p.body, "Some text.");
        assert_eq!(p.collection_id.as_deref(), Some("col-inbox"));
    }

    #[test]
    fn subheadings_are_not_titles() {
        let p = parse_artifact("a", "## Notes\n# Real Title\nbody", &docs()).unwrap();
        assert_eq!(p.title, "Real Title");
        assert_eq!(p.body, "## Notes\nbody");
    }

    #[test]
    fn front_matter_wins() {
        let content = "---\ntitle: Plan\ncollection: Projects\nparent: doc-1\ndoc_id: doc-9\n---\n# Heading\nBody\n";
        let p = parse_artifact("update-plan", content, &docs()).unwrap();
        assert_eq!(p.title, "Plan");
        assert_eq!(p.body, "# Heading\nBody");
        assert_eq!(p.collection_id.as_deref(), Some("col-proj"));
        assert_eq!(p.parent_document_id.as_deref(), Some("doc-1"));
        assert_eq!(p.target_doc_id.as_deref(), Some("doc-9"));
    }

    #[test]
    fn hashtag_selects_collection_and_is_stripped() {
        let p = parse_artifact("a", "# Idea\nFiled under #projects today.", &docs()).unwrap();
        assert_eq!(p.collection_id.as_deref(), Some("col-proj"));
        assert_eq!(p.body, "Filed under  today.");
    }

    #[test]
    fn unknown_hashtag_is_left_alone() {
        let p = parse_artifact("a", "# Idea\nSee #random", &docs()).unwrap();
        assert_eq!(p.collection_id.as_deref(), Some("col-inbox"));
        assert_eq!(p.body, "See #random");
    }

    #[test]
    fn no_default_means_no_collection() {
        let p = parse_artifact("a", "# T\nx", &DocumentsConfig::default()).unwrap();
        assert_eq!(p.collection_id, None);
    }

    #[test]
    fn missing_title_is_malformed() {
        let err = parse_artifact("a", "just text\n", &docs()).unwrap_err();
        assert!(matches!(err, HubError::MalformedEntry { ref key, .. } if key == "a"));
    }

    #[test]
    fn unknown_front_matter_collection_is_malformed() {
        let err = parse_artifact("a", "---\ncollection: Nope\n---\n# T\n", &docs()).unwrap_err();
        assert!(matches!(err, HubError::MalformedEntry { .. }));
    }

    #[test]
    fn unclosed_front_matter_is_malformed() {
        let err = parse_artifact("a", "---\ntitle: x\n# T\n", &docs()).unwrap_err();
        assert!(matches!(err, HubError::MalformedEntry { .. }));
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = content_hash("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash("abc"));
        assert_ne!(h, content_hash("abd"));
    }
}
