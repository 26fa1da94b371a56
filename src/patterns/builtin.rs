use super::{ErrorCategory, ErrorPattern, Language, MatcherKind, PatternRule, Severity};

fn pattern(
    id: &str,
    name: &str,
    category: ErrorCategory,
    language: Language,
    severity: Severity,
    base_confidence: f64,
    rules: Vec<PatternRule>,
    common_causes: &[&str],
    suggestion_hints: &[&str],
) -> ErrorPattern {
    ErrorPattern {
        id: id.to_string(),
        name: name.to_string(),
        category,
        language,
        rules,
        common_causes: common_causes.iter().map(|s| s.to_string()).collect(),
        severity,
        base_confidence,
        suggestion_hints: suggestion_hints.iter().map(|s| s.to_string()).collect(),
        active: true,
        version: 1,
    }
}

/// Built-in fault-signature corpus. Spans JavaScript, TypeScript, Python,
/// Java, and Rust, plus generic cross-language faults.
pub fn builtin_patterns() -> Vec<ErrorPattern> {
    vec![
        // JavaScript
        pattern(
            "js-undefined-property",
            "Property access on undefined or null",
            ErrorCategory::Runtime,
            Language::JavaScript,
            Severity::High,
            0.9,
            vec![
                PatternRule::regex(r"Cannot read property '([^']+)' of (undefined|null)", 1.0),
                PatternRule::regex(
                    r"Cannot read properties of (undefined|null) \(reading '([^']+)'\)",
                    1.0,
                ),
                PatternRule::regex(r"(\w+) is not defined", 0.8),
            ],
            &[
                "An object is undefined or null at the point of property access",
                "A variable is used before it is assigned",
                "An API response did not contain the expected shape",
            ],
            &[
                "Use optional chaining (obj?.prop) to guard the access",
                "Add a null check before accessing the property",
            ],
        ),
        pattern(
            "js-module-not-found",
            "Node module resolution failure",
            ErrorCategory::Import,
            Language::JavaScript,
            Severity::High,
            0.9,
            vec![PatternRule::regex(r"Cannot find module '([^']+)'", 1.0)],
            &[
                "The package is not installed",
                "The import path is wrong or the file was moved",
            ],
            &["Install the missing package", "Check the relative import path"],
        ),
        pattern(
            "js-promise-rejection",
            "Unhandled promise rejection",
            ErrorCategory::Runtime,
            Language::JavaScript,
            Severity::High,
            0.85,
            vec![
                PatternRule::substring("UnhandledPromiseRejection", 0.9),
                PatternRule::substring("Unhandled promise rejection", 0.9),
            ],
            &["A rejected promise has no .catch handler or try/catch around await"],
            &["Wrap the await in try/catch or attach a .catch handler"],
        ),
        // TypeScript
        pattern(
            "ts-type-mismatch",
            "TypeScript type assignment mismatch",
            ErrorCategory::Type,
            Language::TypeScript,
            Severity::Medium,
            0.9,
            vec![PatternRule::regex(
                r"Type '([^']+)' is not assignable to type '([^']+)'",
                1.0,
            )],
            &[
                "Value shape drifted from the declared type",
                "A union member is missing from the annotation",
            ],
            &["Align the value with the declared type or widen the annotation"],
        ),
        pattern(
            "ts-missing-property",
            "Property missing on TypeScript type",
            ErrorCategory::Type,
            Language::TypeScript,
            Severity::Medium,
            0.9,
            vec![PatternRule::regex(
                r"Property '([^']+)' does not exist on type '([^']+)'",
                1.0,
            )],
            &["Typo in the property name", "The type definition is outdated"],
            &["Check the property spelling against the type definition"],
        ),
        // Python
        pattern(
            "py-module-not-found",
            "Python module import failure",
            ErrorCategory::Import,
            Language::Python,
            Severity::High,
            0.95,
            vec![
                PatternRule::regex(r"ModuleNotFoundError: No module named '([^']+)'", 1.0),
                PatternRule::regex(r"ImportError: cannot import name '([^']+)'", 0.9),
            ],
            &[
                "The package is not installed in the active environment",
                "A virtual environment is not activated",
            ],
            &["Install the package with pip", "Activate the right virtualenv"],
        ),
        pattern(
            "py-none-attribute",
            "Attribute access on None",
            ErrorCategory::Runtime,
            Language::Python,
            Severity::High,
            0.9,
            vec![PatternRule::regex(
                r"AttributeError: 'NoneType' object has no attribute '([^']+)'",
                1.0,
            )],
            &[
                "A function returned None where an object was expected",
                "An optional value was not checked before use",
            ],
            &["Guard the access with an `is not None` check"],
        ),
        pattern(
            "py-indentation",
            "Python indentation error",
            ErrorCategory::Syntax,
            Language::Python,
            Severity::Medium,
            0.95,
            vec![PatternRule::regex(
                r"IndentationError: (unexpected indent|expected an indented block|unindent does not match)",
                1.0,
            )],
            &["Mixed tabs and spaces", "A block body is missing"],
            &["Re-indent the block consistently with spaces"],
        ),
        pattern(
            "py-key-error",
            "Dictionary key missing",
            ErrorCategory::Runtime,
            Language::Python,
            Severity::Medium,
            0.85,
            vec![PatternRule::regex(r"KeyError: '?([^'\n]+)'?", 0.9)],
            &["The key was never inserted", "Input data is missing a field"],
            &["Use dict.get() with a default or check membership first"],
        ),
        // Java
        pattern(
            "java-npe",
            "Java null pointer dereference",
            ErrorCategory::Runtime,
            Language::Java,
            Severity::High,
            0.9,
            vec![PatternRule::substring("java.lang.NullPointerException", 1.0)],
            &[
                "A reference was not initialized before use",
                "A method returned null where a value was expected",
            ],
            &["Add a null guard or use Optional"],
        ),
        pattern(
            "java-class-not-found",
            "Java class resolution failure",
            ErrorCategory::Import,
            Language::Java,
            Severity::High,
            0.9,
            vec![PatternRule::regex(
                r"java\.lang\.ClassNotFoundException: ([\w.$]+)",
                1.0,
            )],
            &["The dependency jar is missing from the classpath"],
            &["Add the dependency to the build and rebuild"],
        ),
        pattern(
            "java-array-bounds",
            "Java array index out of bounds",
            ErrorCategory::Runtime,
            Language::Java,
            Severity::Medium,
            0.9,
            vec![PatternRule::regex(
                r"ArrayIndexOutOfBoundsException(?:: (?:Index )?(\d+))?",
                1.0,
            )],
            &["An index computation exceeds the array length"],
            &["Bound the index by the array length before access"],
        ),
        // Rust
        pattern(
            "rust-unwrap-none",
            "Unwrap on None or Err",
            ErrorCategory::Runtime,
            Language::Rust,
            Severity::High,
            0.9,
            vec![PatternRule::regex(
                r"called `(?:Option|Result)::unwrap\(\)` on (?:a `None`|an `Err`) value",
                1.0,
            )],
            &["A fallible value was unwrapped without handling the failure case"],
            &["Replace unwrap with pattern matching or the ? operator"],
        ),
        pattern(
            "rust-index-bounds",
            "Rust index out of bounds panic",
            ErrorCategory::Runtime,
            Language::Rust,
            Severity::Medium,
            0.9,
            vec![PatternRule::regex(
                r"index out of bounds: the len is (\d+) but the index is (\d+)",
                1.0,
            )],
            &["An index computed at runtime exceeds the collection length"],
            &["Use .get() and handle the None case"],
        ),
        pattern(
            "rust-borrow",
            "Rust borrow checker violation",
            ErrorCategory::Syntax,
            Language::Rust,
            Severity::Medium,
            0.9,
            vec![PatternRule::regex(
                r"cannot borrow `([^`]+)` as mutable",
                1.0,
            )],
            &["Simultaneous mutable and immutable borrows of the same value"],
            &["Restructure the code so borrows do not overlap"],
        ),
        // Generic cross-language faults
        pattern(
            "generic-stack-overflow",
            "Stack overflow",
            ErrorCategory::Memory,
            Language::Generic,
            Severity::Critical,
            0.9,
            vec![
                PatternRule::regex(
                    r"(?i)(maximum call stack size exceeded|stackoverflowerror|stack overflow|thread '.*' has overflowed its stack)",
                    1.0,
                ),
            ],
            &["Unbounded recursion", "A cyclic data structure walked without a visited set"],
            &["Find the recursive call chain and add a termination condition"],
        ),
        pattern(
            "generic-out-of-memory",
            "Out of memory",
            ErrorCategory::Memory,
            Language::Generic,
            Severity::Critical,
            0.9,
            vec![
                PatternRule::regex(
                    r"(?i)(out of memory|outofmemoryerror|heap out of memory|cannot allocate memory|memory allocation .* failed)",
                    1.0,
                ),
            ],
            &["A collection grows without bound", "Workload exceeds the configured heap"],
            &["Profile allocations and bound caches or batch sizes"],
        ),
        pattern(
            "generic-connection-refused",
            "Connection refused",
            ErrorCategory::Network,
            Language::Generic,
            Severity::High,
            0.85,
            vec![
                PatternRule::regex(r"(?i)(connection refused|ECONNREFUSED)", 1.0),
            ],
            &["The target service is down or listening on a different port"],
            &["Verify the service is running and the host/port are correct"],
        ),
        pattern(
            "generic-timeout",
            "Operation timed out",
            ErrorCategory::Network,
            Language::Generic,
            Severity::Medium,
            0.8,
            vec![
                PatternRule::regex(r"(?i)(timed? ?out|ETIMEDOUT|deadline exceeded)", 0.9),
            ],
            &["The upstream is slow or unreachable", "The timeout is too aggressive"],
            &["Check upstream health and tune the timeout"],
        ),
        pattern(
            "generic-permission-denied",
            "Permission denied",
            ErrorCategory::Security,
            Language::Generic,
            Severity::High,
            0.85,
            vec![
                PatternRule::regex(r"(?i)(permission denied|EACCES|access is denied)", 1.0),
            ],
            &["The process user lacks rights on the file or port"],
            &["Fix the file ownership or run with the required privileges"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_spans_languages() {
        let patterns = builtin_patterns();
        assert!(patterns.len() >= 12);

        let languages: std::collections::HashSet<Language> =
            patterns.iter().map(|p| p.language).collect();
        assert!(languages.len() >= 5);
        assert!(languages.contains(&Language::Generic));
    }

    #[test]
    fn test_all_builtin_expressions_compile() {
        for p in builtin_patterns() {
            for rule in &p.rules {
                if rule.kind == MatcherKind::Regex {
                    assert!(
                        regex::Regex::new(&rule.expression).is_ok(),
                        "pattern {} has a bad expression",
                        p.id
                    );
                }
            }
        }
    }
}
