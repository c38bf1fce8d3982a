//! Template wiring: binds the parent's resolver into referenced children.
//!
//! Every element the template addresses with `ref="<name>"` gets the binding
//! `:asyncLoadProp="asyncLoad"` appended to its open tag, so the readiness
//! field installed by the consumer pass flows into the child's resolver prop.
//! The rewrite is purely textual; every byte outside the touched open tags is
//! preserved.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// Open tags carrying a word-valued ref attribute. The `/?>` tail is
    /// captured separately so self-closing tags keep their slash intact.
    static ref REF_ELEMENT_REGEX: Regex =
        Regex::new(r#"(<[a-zA-Z][^>]*\bref="\w+"[^>]*?)(\s*/?>)"#).unwrap();
}

/// Binding attached to each referenced element.
const CAPABILITY_BINDING: &str = r#":asyncLoadProp="asyncLoad""#;

/// Rewrite `ref`-bearing open tags in template text to carry the resolver
/// binding. Tags that already mention `asyncLoadProp` anywhere in the open tag
/// are left alone, which makes the rewrite idempotent. Returns the rewritten
/// text and whether anything changed.
pub fn wire_template(template: &str) -> (String, bool) {
    let mut changed = false;
    let wired = REF_ELEMENT_REGEX.replace_all(template, |caps: &Captures| {
        let head = &caps[1];
        let tail = &caps[2];
        if head.contains("asyncLoadProp") {
            caps[0].to_string()
        } else {
            changed = true;
            format!("{} {}{}", head, CAPABILITY_BINDING, tail)
        }
    });
    (wired.into_owned(), changed)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
