use crate::patterns::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Stable identity for a fault class: normalized error text hashed together
/// with language and file extension. Two occurrences with equal signatures
/// are the same fault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorSignature {
    pub hash: String,
    pub normalized_text: String,
    pub language: Language,
    pub extension: Option<String>,
}

impl ErrorSignature {
    pub fn compute(error_text: &str, language: Language, file_path: Option<&str>) -> Self {
        let normalized_text = normalize(error_text);
        let extension = file_path
            .and_then(|p| std::path::Path::new(p).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_string());

        let mut hasher = DefaultHasher::new();
        normalized_text.hash(&mut hasher);
        language.hash(&mut hasher);
        extension.hash(&mut hasher);

        Self {
            hash: format!("{:016x}", hasher.finish()),
            normalized_text,
            language,
            extension,
        }
    }
}

fn placeholder_regexes() -> &'static (Regex, Regex, Regex, Regex) {
    static REGEXES: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    REGEXES.get_or_init(|| {
        (
            // windows and unix paths, before bare numbers eat the digits
            Regex::new(r"[A-Za-z]:\\[\w\\.\- ]+").unwrap(),
            Regex::new(r"(?:/[\w.\-]+){2,}").unwrap(),
            Regex::new(r#"'[^']*'|"[^"]*""#).unwrap(),
            Regex::new(r"\b\d+\b").unwrap(),
        )
    })
}

/// Replaces volatile literals (paths, quoted strings, numbers) with
/// placeholders so repeat occurrences normalize to the same text.
pub fn normalize(error_text: &str) -> String {
    let (win_paths, unix_paths, strings, numbers) = placeholder_regexes();
    let first_line = error_text.lines().next().unwrap_or(error_text).trim();

    let text = win_paths.replace_all(first_line, "<PATH>");
    let text = unix_paths.replace_all(&text, "<PATH>");
    let text = strings.replace_all(&text, "<STR>");
    let text = numbers.replace_all(&text, "<NUM>");
    text.to_string()
}
