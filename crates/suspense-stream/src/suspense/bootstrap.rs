use regex::Regex;
use std::sync::LazyLock;

use super::types::{BoundaryId, ReadyChunk};

/// Opens the script block and defines `insertSuspense`. A missing placeholder
/// is logged in the browser and does not stop later instructions.
pub const BOOTSTRAP_SCRIPT_START: &str = concat!(
    "<script>{",
    "const range = new Range();",
    "const template = document.createElement('template');",
    "range.selectNodeContents(template);",
    "const insertSuspense = (id, content) => {",
    "try {",
    "document.querySelector('[data-suspense-fallback=\"' + id + '\"]').replaceWith(",
    "range.createContextualFragment(content)",
    ");",
    "} catch (e) {",
    "console.error(\"Failed to insert async content (Suspense boundary id: \" + id + \")\", e);",
    "}",
    "};",
);

pub const BOOTSTRAP_SCRIPT_END: &str = "}</script>";

static SCRIPT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(script)").expect("static regex"));

/// JSON string literal safe to embed inside an inline `<script>` element.
pub fn script_safe_json(content: &str) -> String {
    let json = serde_json::to_string(content).unwrap_or_else(|_| String::from("\"\""));
    let json = SCRIPT_CLOSE.replace_all(&json, r"<\/$1");
    json.replace("<!--", r"<\u0021--")
}

pub fn insertion_instruction(id: &BoundaryId, content: &str) -> String {
    format!("insertSuspense({}, {});", id.to_js_literal(), script_safe_json(content))
}

pub fn chunk_instruction(chunk: &ReadyChunk) -> String {
    insertion_instruction(&chunk.id, &chunk.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_format() {
        let instruction = insertion_instruction(&BoundaryId::from(1u64), "<p>done</p>");
        assert_eq!(instruction, r#"insertSuspense(1, "<p>done</p>");"#);
    }

    #[test]
    fn test_named_boundary_instruction() {
        let chunk = ReadyChunk::new("sidebar", "<aside>ok</aside>");
        assert_eq!(chunk_instruction(&chunk), r#"insertSuspense("sidebar", "<aside>ok</aside>");"#);
    }

    #[test]
    fn test_json_escaping() {
        let instruction = insertion_instruction(&BoundaryId::from(2u64), "say \"hi\"\n");
        assert_eq!(instruction, r#"insertSuspense(2, "say \"hi\"\n");"#);
    }

    #[test]
    fn test_script_terminators_are_neutralised() {
        let json = script_safe_json("<p></SCRIPT><script>alert(1)</script><!-- x --></p>");
        assert!(!json.to_ascii_lowercase().contains("</script"));
        assert!(!json.contains("<!--"));
        assert!(json.contains(r"<\/SCRIPT>"));
        assert!(json.contains(r"<\u0021-- x -->"));
        assert!(json.contains("</p>"));
    }

    #[test]
    fn test_bootstrap_is_single_line() {
        assert!(BOOTSTRAP_SCRIPT_START.starts_with("<script>{"));
        assert!(!BOOTSTRAP_SCRIPT_START.contains('\n'));
        assert!(!BOOTSTRAP_SCRIPT_START.contains('\t'));
        assert!(BOOTSTRAP_SCRIPT_START.contains("const insertSuspense = (id, content) =>"));
        assert!(BOOTSTRAP_SCRIPT_START.contains("data-suspense-fallback"));
        assert_eq!(BOOTSTRAP_SCRIPT_END, "}</script>");
    }
}
