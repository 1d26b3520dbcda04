//! Structured rich-text document used for stored descriptions.
//!
//! The storage layer expects a root → paragraph → text tree. Only the single
//! paragraph shape produced from plain text is modelled here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    pub root: RootNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
    pub indent: u32,
    pub version: u32,
    pub children: Vec<ParagraphNode>,
    pub direction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
    pub indent: u32,
    pub version: u32,
    pub children: Vec<TextNode>,
    pub direction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub format: u32,
    pub detail: u32,
    pub mode: String,
    pub style: String,
    pub text: String,
    pub version: u32,
}

impl RichText {
    /// Wrap plain text in a single paragraph. Blank input yields `None`.
    pub fn from_plain(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }

        let text_node = TextNode {
            kind: "text".to_string(),
            format: 0,
            detail: 0,
            mode: "normal".to_string(),
            style: String::new(),
            text: text.to_string(),
            version: 1,
        };

        let paragraph = ParagraphNode {
            kind: "paragraph".to_string(),
            format: String::new(),
            indent: 0,
            version: 1,
            children: vec![text_node],
            direction: "ltr".to_string(),
        };

        Some(Self {
            root: RootNode {
                kind: "root".to_string(),
                format: String::new(),
                indent: 0,
                version: 1,
                children: vec![paragraph],
                direction: "ltr".to_string(),
            },
        })
    }

    /// Concatenated text of every paragraph, one paragraph per line.
    pub fn plain_text(&self) -> String {
        self.root
            .children
            .iter()
            .map(|p| p.children.iter().map(|t| t.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_plain_builds_document_shape() {
        let doc = RichText::from_plain("Monthly forum for CEOs").unwrap();
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["root"]["type"], "root");
        assert_eq!(json["root"]["children"][0]["type"], "paragraph");
        assert_eq!(json["root"]["children"][0]["children"][0]["type"], "text");
        assert_eq!(
            json["root"]["children"][0]["children"][0]["text"],
            "Monthly forum for CEOs"
        );
        assert_eq!(doc.plain_text(), "Monthly forum for CEOs");
    }

    #[test]
    fn test_blank_text_has_no_document() {
        assert!(RichText::from_plain("   ").is_none());
    }
}
