//! SFC block extraction for the asyncLoad loader.
//!
//! Splits single-file component source into its `<script>` and `<template>`
//! blocks before the script tree is parsed. Block contents keep their byte
//! ranges so the transform can splice rewritten text back without touching
//! anything outside the block.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

lazy_static! {
    /// Script block regex
    static ref SCRIPT_REGEX: Regex =
        Regex::new(r"(?is)<script\b([^>]*)>([\s\S]*?)</script>").unwrap();

    /// Template block regex. Greedy body so nested <template> elements stay
    /// inside the block (the match runs to the last closing tag).
    static ref TEMPLATE_REGEX: Regex =
        Regex::new(r"(?is)<template\b([^>]*)>([\s\S]*)</template>").unwrap();

    /// Attribute regex for parsing block-tag attributes
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"(?i)([a-z0-9-]+)(?:=(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One top-level block of a single-file component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SfcBlock {
    /// Inner content, exclusive of the block tags.
    pub content: String,
    /// Byte offset of the content within the source text.
    pub start: usize,
    /// Byte offset one past the end of the content.
    pub end: usize,
    /// Attributes on the opening block tag (`lang`, `setup`, ...). Valueless
    /// attributes map to `"true"`.
    pub attributes: HashMap<String, String>,
}

impl SfcBlock {
    /// Whether the block is declared as TypeScript (`lang="ts"` / `lang="tsx"`).
    pub fn is_typescript(&self) -> bool {
        matches!(
            self.attributes.get("lang").map(|s| s.as_str()),
            Some("ts") | Some("tsx")
        )
    }
}

/// The split view of a component source: at most one script block and at most
/// one template block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SfcDescriptor {
    pub script: Option<SfcBlock>,
    pub template: Option<SfcBlock>,
}

impl SfcDescriptor {
    /// A source with neither block is passed through the transform untouched.
    pub fn is_empty(&self) -> bool {
        self.script.is_none() && self.template.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_attributes(attr_string: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    for caps in ATTR_REGEX.captures_iter(attr_string) {
        if let Some(name) = caps.get(1) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "true".to_string());
            attributes.insert(name.as_str().to_string(), value);
        }
    }
    attributes
}

fn capture_block(source: &str, regex: &Regex) -> Option<SfcBlock> {
    let caps = regex.captures(source)?;
    let attr_string = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let content = caps.get(2)?;
    Some(SfcBlock {
        content: content.as_str().to_string(),
        start: content.start(),
        end: content.end(),
        attributes: parse_attributes(attr_string),
    })
}

/// Split component source text into its script and template blocks. Only the
/// first block of each kind is recognized.
pub fn parse_component(source: &str) -> SfcDescriptor {
    SfcDescriptor {
        script: capture_block(source, &SCRIPT_REGEX),
        template: capture_block(source, &TEMPLATE_REGEX),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_script_and_template() {
        let source =
            "<template>\n  <div></div>\n</template>\n<script>\nexport default {};\n</script>\n";
        let sfc = parse_component(source);

        let template = sfc.template.expect("template block");
        assert_eq!(template.content, "\n  <div></div>\n");
        assert_eq!(&source[template.start..template.end], template.content);

        let script = sfc.script.expect("script block");
        assert_eq!(script.content, "\nexport default {};\n");
        assert_eq!(&source[script.start..script.end], script.content);
    }

    #[test]
    fn test_block_attributes() {
        let source = r#"<script lang="ts" setup>const x = 1;</script>"#;
        let sfc = parse_component(source);
        let script = sfc.script.expect("script block");
        assert_eq!(script.attributes.get("lang"), Some(&"ts".to_string()));
        assert_eq!(script.attributes.get("setup"), Some(&"true".to_string()));
        assert!(script.is_typescript());
    }

    #[test]
    fn test_nested_template_stays_in_block() {
        let source = "<template><div><template #default>inner</template></div></template><script>export default {};</script>";
        let sfc = parse_component(source);
        let template = sfc.template.expect("template block");
        assert!(template
            .content
            .contains("<template #default>inner</template>"));
        assert!(template.content.ends_with("</div>"));
    }

    #[test]
    fn test_no_blocks() {
        let sfc = parse_component("just some text");
        assert!(sfc.is_empty());
    }

    #[test]
    fn test_template_only() {
        let sfc = parse_component("<template><div ref=\"a\"></div></template>");
        assert!(sfc.script.is_none());
        assert!(sfc.template.is_some());
        assert!(!sfc.is_empty());
    }
}
