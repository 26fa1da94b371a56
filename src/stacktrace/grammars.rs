use crate::patterns::Language;
use regex::Regex;
use std::sync::OnceLock;

/// How a matched line contributes to the parse: a full frame, or a location
/// continuation that attaches file/line to the frame above it (Rust, Go).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarKind {
    Frame,
    Location,
}

pub struct LineGrammar {
    pub kind: GrammarKind,
    pub regex: Regex,
}

fn grammar(kind: GrammarKind, pattern: &str) -> LineGrammar {
    LineGrammar {
        kind,
        regex: Regex::new(pattern).expect("grammar table regex"),
    }
}

/// Ordered grammars per language; the first match wins and unmatched lines
/// are dropped.
pub fn grammars_for(language: Language) -> &'static [LineGrammar] {
    match language {
        Language::JavaScript | Language::TypeScript => javascript_grammars(),
        Language::Python => python_grammars(),
        Language::Java => java_grammars(),
        Language::Rust => rust_grammars(),
        Language::Go => go_grammars(),
        Language::Generic => generic_grammars(),
    }
}

fn javascript_grammars() -> &'static [LineGrammar] {
    static GRAMMARS: OnceLock<Vec<LineGrammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        vec![
            grammar(
                GrammarKind::Frame,
                r"^\s*at\s+(?P<function>.+?)\s+\((?P<file>[^()]+?):(?P<line>\d+):(?P<column>\d+)\)\s*$",
            ),
            grammar(
                GrammarKind::Frame,
                r"^\s*at\s+(?P<file>[^()\s]+?):(?P<line>\d+):(?P<column>\d+)\s*$",
            ),
            grammar(
                GrammarKind::Frame,
                r"^\s*at\s+(?P<function>[^()\s]+)\s+\((?P<file>native|node:[\w/]+)\)\s*$",
            ),
        ]
    })
}

fn python_grammars() -> &'static [LineGrammar] {
    static GRAMMARS: OnceLock<Vec<LineGrammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        vec![
            grammar(
                GrammarKind::Frame,
                r#"^\s*File "(?P<file>[^"]+)", line (?P<line>\d+), in (?P<function>.+?)\s*$"#,
            ),
            grammar(
                GrammarKind::Frame,
                r#"^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)\s*$"#,
            ),
        ]
    })
}

fn java_grammars() -> &'static [LineGrammar] {
    static GRAMMARS: OnceLock<Vec<LineGrammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        vec![
            grammar(
                GrammarKind::Frame,
                r"^\s*at\s+(?P<function>[\w$.<>/]+)\((?P<file>[^:()]+):(?P<line>\d+)\)\s*$",
            ),
            grammar(
                GrammarKind::Frame,
                r"^\s*at\s+(?P<function>[\w$.<>/]+)\((?:Native Method|Unknown Source)\)\s*$",
            ),
        ]
    })
}

fn rust_grammars() -> &'static [LineGrammar] {
    static GRAMMARS: OnceLock<Vec<LineGrammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        vec![
            grammar(
                GrammarKind::Location,
                r"^\s+at\s+(?P<file>[^:\s]+):(?P<line>\d+)(?::(?P<column>\d+))?\s*$",
            ),
            grammar(
                GrammarKind::Frame,
                r"^\s*\d+:\s+(?:0x[0-9a-f]+ - )?(?P<function>.+?)\s*$",
            ),
        ]
    })
}

fn go_grammars() -> &'static [LineGrammar] {
    static GRAMMARS: OnceLock<Vec<LineGrammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        vec![
            grammar(
                GrammarKind::Location,
                r"^\s+(?P<file>[^:\s]+\.go):(?P<line>\d+)(?:\s+\+0x[0-9a-f]+)?\s*$",
            ),
            grammar(
                GrammarKind::Frame,
                r"^(?P<function>[\w.\-/*()\[\]]+)\(.*\)\s*$",
            ),
        ]
    })
}

fn generic_grammars() -> &'static [LineGrammar] {
    static GRAMMARS: OnceLock<Vec<LineGrammar>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        vec![grammar(
            GrammarKind::Frame,
            r"^\s*(?:at\s+)?(?P<function>[\w$.:<>]+)\s*\(?(?P<file>[\w./\-]+):(?P<line>\d+)(?::(?P<column>\d+))?\)?\s*$",
        )]
    })
}

/// Guesses the trace language from formatting cues when the caller does not
/// supply one.
pub fn infer_language(trace: &str) -> Language {
    if trace.contains("Traceback (most recent call last)")
        || (trace.contains("File \"") && trace.contains(", line "))
    {
        return Language::Python;
    }
    if trace.contains(".java:") || trace.contains("Exception in thread") {
        return Language::Java;
    }
    if trace.contains("panicked at") || trace.contains(".rs:") {
        return Language::Rust;
    }
    if trace.contains("goroutine ") || trace.contains(".go:") {
        return Language::Go;
    }
    if trace.contains(".ts:") || trace.contains(".tsx:") {
        return Language::TypeScript;
    }
    if trace.contains(".js:") || trace.contains("(node:") || trace.contains("    at ") {
        return Language::JavaScript;
    }
    Language::Generic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_python_from_file_markers() {
        let trace = "Traceback (most recent call last):\n  File \"app.py\", line 3, in main";
        assert_eq!(infer_language(trace), Language::Python);
    }

    #[test]
    fn test_infer_java_from_suffix() {
        let trace = "at com.example.Main.run(Main.java:42)";
        assert_eq!(infer_language(trace), Language::Java);
    }

    #[test]
    fn test_infer_javascript_from_at_lines() {
        let trace = "    at handler (/srv/app/index.js:10:5)";
        assert_eq!(infer_language(trace), Language::JavaScript);
    }

    #[test]
    fn test_infer_rust_from_panic() {
        let trace = "thread 'main' panicked at src/main.rs:7:14";
        assert_eq!(infer_language(trace), Language::Rust);
    }
}
