//! Transform orchestration: classification, per-file entry point, fail-soft
//! boundary, and the Node-facing exports.
//!
//! A file is transformed along two independent axes. The consumer axis covers
//! components that read children through `this.$refs`: script barriers plus
//! template wiring. The provider axis covers components that are read: the
//! resolver contract in the script. A file may be both.
//!
//! Any failure inside the transform degrades to a fallback result carrying
//! the original source text, so a build never breaks on a file this pass
//! cannot handle.

use oxc_allocator::Allocator;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::consumer::instrument_consumer;
use crate::parse::parse_component;
use crate::provider::instrument_provider;
use crate::script::{parse_program, print_program, source_type_for};
use crate::wire::wire_template;

#[cfg(feature = "napi")]
use napi_derive::napi;

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Which instrumentation axes apply to a file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub consumer: bool,
    pub provider: bool,
}

impl Classification {
    pub fn is_inert(&self) -> bool {
        !self.consumer && !self.provider
    }
}

/// Path roots selecting which files get which instrumentation. An empty root
/// set matches every file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    pub consumer_roots: Vec<String>,
    pub provider_roots: Vec<String>,
}

/// Classify a file path against the configured roots.
pub fn classify(file_path: &str, options: &TransformOptions) -> Classification {
    Classification {
        consumer: matches_roots(file_path, &options.consumer_roots),
        provider: matches_roots(file_path, &options.provider_roots),
    }
}

fn resolve(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn matches_roots(file_path: &str, roots: &[String]) -> bool {
    if roots.is_empty() {
        return true;
    }
    let file = resolve(file_path);
    roots.iter().any(|root| file.starts_with(resolve(root)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformStatus {
    /// Instrumentation was applied; `code` differs from the input.
    Transformed,
    /// Nothing to do; `code` is the input, byte for byte.
    Unchanged,
    /// The file could not be processed; `code` is the input, byte for byte,
    /// and `diagnostic` says why.
    Fallback,
}

/// Why a file fell back: a stable code plus human-readable context, in the
/// shape the build pipeline's error reporters already consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformDiagnostic {
    pub code: String,
    pub message: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub code: String,
    pub status: TransformStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<TransformDiagnostic>,
}

impl TransformResult {
    fn unchanged(source: &str) -> Self {
        TransformResult {
            code: source.to_string(),
            status: TransformStatus::Unchanged,
            diagnostic: None,
        }
    }

    fn fallback(source: &str, file_path: &str, code: &str, message: String) -> Self {
        eprintln!("[AsyncLoadNative] {} falling back for {}: {}", code, file_path, message);
        TransformResult {
            code: source.to_string(),
            status: TransformStatus::Fallback,
            diagnostic: Some(TransformDiagnostic {
                code: code.to_string(),
                message,
                file: file_path.to_string(),
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM
// ═══════════════════════════════════════════════════════════════════════════════

/// Transform one component source. Never panics and never errors: every
/// outcome is a `TransformResult` whose `code` is always valid output for the
/// file (instrumented, or the input unchanged).
pub fn transform(source: &str, file_path: &str, classification: Classification) -> TransformResult {
    if classification.is_inert() {
        return TransformResult::unchanged(source);
    }
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        transform_inner(source, file_path, classification)
    }));
    match outcome {
        Ok(result) => result,
        Err(_) => TransformResult::fallback(
            source,
            file_path,
            "E_INTERNAL",
            "transform panicked; source passed through".to_string(),
        ),
    }
}

/// Classify, then transform.
pub fn transform_with_options(
    source: &str,
    file_path: &str,
    options: &TransformOptions,
) -> TransformResult {
    transform(source, file_path, classify(file_path, options))
}

fn transform_inner(
    source: &str,
    file_path: &str,
    classification: Classification,
) -> TransformResult {
    let descriptor = parse_component(source);
    if descriptor.is_empty() {
        return TransformResult::unchanged(source);
    }
    let script = match &descriptor.script {
        Some(script) => script,
        None => {
            return TransformResult::fallback(
                source,
                file_path,
                "E_NO_SCRIPT",
                "component has no <script> block to instrument".to_string(),
            );
        }
    };

    // The block regexes are textual; script content containing the literal
    // string "</template>" can drag the template range across the script
    // range. Splicing overlapping ranges would corrupt the output, so such
    // files pass through untouched.
    if let Some(template) = &descriptor.template {
        if template.start < script.end && script.start < template.end {
            return TransformResult::fallback(
                source,
                file_path,
                "E_BLOCK_OVERLAP",
                "script and template block ranges overlap".to_string(),
            );
        }
    }

    let allocator = Allocator::default();
    let source_type = source_type_for(script.is_typescript());
    let mut program = match parse_program(&allocator, &script.content, source_type) {
        Some(program) => program,
        None => {
            return TransformResult::fallback(
                source,
                file_path,
                "E_SCRIPT_PARSE",
                "script block failed to parse".to_string(),
            );
        }
    };

    let mut script_changed = false;
    if classification.consumer {
        script_changed |= instrument_consumer(&allocator, &mut program);
    }
    if classification.provider {
        script_changed |= instrument_provider(&allocator, &mut program);
    }

    let mut template_edit = None;
    if classification.consumer {
        if let Some(template) = &descriptor.template {
            let (wired, changed) = wire_template(&template.content);
            if changed {
                template_edit = Some((template.start, template.end, wired));
            }
        }
    }

    if !script_changed && template_edit.is_none() {
        // Byte-identical pass-through keeps re-runs exact.
        return TransformResult::unchanged(source);
    }

    let mut edits: Vec<(usize, usize, String)> = Vec::with_capacity(2);
    if script_changed {
        edits.push((script.start, script.end, print_program(&program)));
    }
    if let Some(edit) = template_edit {
        edits.push(edit);
    }
    // Splice back-to-front so earlier offsets stay valid.
    edits.sort_by(|a, b| b.0.cmp(&a.0));
    let mut output = source.to_string();
    for (start, end, text) in edits {
        output.replace_range(start..end, &text);
    }

    TransformResult {
        code: output,
        status: TransformStatus::Transformed,
        diagnostic: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn transform_native(
    source: String,
    file_path: String,
    options: serde_json::Value,
) -> napi::Result<serde_json::Value> {
    let options: TransformOptions =
        serde_json::from_value(options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let result = transform_with_options(&source, &file_path, &options);
    serde_json::to_value(result).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn classify_native(file_path: String, options: serde_json::Value) -> Option<serde_json::Value> {
    let options: TransformOptions = serde_json::from_value(options).ok()?;
    serde_json::to_value(classify(&file_path, &options)).ok()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: Classification = Classification {
        consumer: true,
        provider: true,
    };

    #[test]
    fn test_empty_roots_match_everything() {
        let options = TransformOptions::default();
        let c = classify("src/pages/Home.vue", &options);
        assert!(c.consumer);
        assert!(c.provider);
    }

    #[test]
    fn test_roots_select_by_prefix() {
        let options = TransformOptions {
            consumer_roots: vec!["src/pages".to_string()],
            provider_roots: vec!["src/widgets".to_string()],
        };
        let page = classify("src/pages/Home.vue", &options);
        assert!(page.consumer);
        assert!(!page.provider);
        let widget = classify("src/widgets/Chart.vue", &options);
        assert!(!widget.consumer);
        assert!(widget.provider);
        let other = classify("src/lib/util.vue", &options);
        assert!(other.is_inert());
    }

    #[test]
    fn test_inert_classification_is_unchanged() {
        let source = "<script>not even valid js <<<</script>";
        let result = transform(source, "a.vue", Classification::default());
        assert_eq!(result.status, TransformStatus::Unchanged);
        assert_eq!(result.code, source);
    }

    #[test]
    fn test_blockless_source_is_unchanged() {
        let result = transform("plain text, no blocks", "a.vue", BOTH);
        assert_eq!(result.status, TransformStatus::Unchanged);
        assert_eq!(result.code, "plain text, no blocks");
    }

    #[test]
    fn test_template_only_falls_back() {
        let source = "<template><div ref=\"a\"></div></template>";
        let result = transform(source, "a.vue", BOTH);
        assert_eq!(result.status, TransformStatus::Fallback);
        assert_eq!(result.code, source);
        let diagnostic = result.diagnostic.expect("diagnostic");
        assert_eq!(diagnostic.code, "E_NO_SCRIPT");
        assert_eq!(diagnostic.file, "a.vue");
    }

    #[test]
    fn test_broken_script_falls_back() {
        let source = "<template><div></div></template><script>export default {</script>";
        let result = transform(source, "a.vue", BOTH);
        assert_eq!(result.status, TransformStatus::Fallback);
        assert_eq!(result.code, source);
        assert_eq!(result.diagnostic.expect("diagnostic").code, "E_SCRIPT_PARSE");
    }

    #[test]
    fn test_closing_template_tag_inside_script_falls_back() {
        // "</template>" in a script string literal drags the greedy template
        // range across the script block; the file must pass through intact
        // instead of being spliced into garbage.
        let source = "<template><w ref=\"a\"></w></template>\n<script>\nexport default { methods: { go() { this.$refs.a.x(\"</template>\"); } } };\n</script>\n";
        let result = transform(source, "a.vue", BOTH);
        assert_eq!(result.status, TransformStatus::Fallback);
        assert_eq!(result.code, source);
        assert_eq!(
            result.diagnostic.expect("diagnostic").code,
            "E_BLOCK_OVERLAP"
        );
    }

    #[test]
    fn test_script_and_template_spliced_in_place() {
        let source = "<!-- header -->\n<template>\n  <child-view ref=\"c\"></child-view>\n</template>\n<script>\nexport default { methods: { go() { this.$refs.c.x(); } } };\n</script>\n<!-- footer -->\n";
        let result = transform(
            source,
            "a.vue",
            Classification {
                consumer: true,
                provider: false,
            },
        );
        assert_eq!(result.status, TransformStatus::Transformed);
        assert!(result.code.starts_with("<!-- header -->\n"));
        assert!(result.code.ends_with("<!-- footer -->\n"));
        assert!(result.code.contains(":asyncLoadProp=\"asyncLoad\""));
        assert!(result.code.contains("async go()"));
        assert!(result.code.contains("await promise_"));
    }

    #[test]
    fn test_provider_axis_leaves_template_alone() {
        let source = "<template><div ref=\"a\"></div></template><script>export default {};</script>";
        let result = transform(
            source,
            "a.vue",
            Classification {
                consumer: false,
                provider: true,
            },
        );
        assert_eq!(result.status, TransformStatus::Transformed);
        assert!(!result.code.contains(":asyncLoadProp=\"asyncLoad\""));
        assert!(result.code.contains("props:"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = transform("plain", "a.vue", BOTH);
        let json = serde_json::to_value(&result).expect("serializes");
        assert_eq!(json["status"], "unchanged");
        assert!(json.get("diagnostic").is_none());
        assert_eq!(json["code"], "plain");
    }
}
