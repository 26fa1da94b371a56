use super::{DependencyAction, FixCategory, FixComplexity, FixPayload, FixSuggestion};
use crate::analysis::ErrorAnalysis;
use crate::patterns::{ErrorCategory, Language};

fn suggestion(
    id: &str,
    title: &str,
    description: String,
    category: FixCategory,
    priority: u8,
    confidence: f64,
    complexity: FixComplexity,
    effort: u32,
    payload: FixPayload,
) -> FixSuggestion {
    FixSuggestion {
        id: id.to_string(),
        title: title.to_string(),
        description,
        category,
        priority,
        confidence,
        complexity,
        estimated_effort_minutes: effort,
        payload,
        validation: None,
    }
}

/// Substitutes `{1}`, `{2}`, ... with the match's capture groups.
fn expand(template: &str, captures: &[String]) -> String {
    let mut out = template.to_string();
    for (i, capture) in captures.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", i + 1), capture);
    }
    out
}

/// Template lookup keyed by matched pattern id, parameter-substituted from
/// the match's capture groups.
pub(super) fn pattern_fixes(analysis: &ErrorAnalysis) -> Vec<FixSuggestion> {
    let mut fixes = Vec::new();

    for m in &analysis.matches {
        let confidence = (m.confidence * 0.95).min(0.95);
        match m.pattern_id.as_str() {
            "js-undefined-property" => {
                let prop = m.captures.first().cloned().unwrap_or_else(|| "prop".to_string());
                fixes.push(suggestion(
                    "fix-js-optional-chaining",
                    "Guard the property access with optional chaining",
                    format!("Replace `obj.{prop}` with `obj?.{prop}` so an undefined object short-circuits instead of throwing."),
                    FixCategory::CodeChange,
                    9,
                    confidence,
                    FixComplexity::Trivial,
                    2,
                    FixPayload::Code {
                        template: format!("const value = obj?.{prop};"),
                        target_file: analysis.context.file_path.clone(),
                    },
                ));
                fixes.push(suggestion(
                    "fix-js-null-check",
                    "Add an explicit null check",
                    format!("Check the object before reading `{prop}`."),
                    FixCategory::CodeChange,
                    8,
                    confidence * 0.95,
                    FixComplexity::Trivial,
                    2,
                    FixPayload::Code {
                        template: format!("if (obj != null) {{\n  use(obj.{prop});\n}}"),
                        target_file: analysis.context.file_path.clone(),
                    },
                ));
            }
            "js-module-not-found" => {
                let module = expand("{1}", &m.captures);
                fixes.push(suggestion(
                    "fix-npm-install",
                    "Install the missing npm package",
                    format!("`{module}` is not installed or not resolvable from this directory."),
                    FixCategory::Command,
                    9,
                    confidence,
                    FixComplexity::Trivial,
                    1,
                    FixPayload::Command {
                        command: format!("npm install {}", module),
                    },
                ));
            }
            "py-module-not-found" => {
                let module = expand("{1}", &m.captures);
                fixes.push(suggestion(
                    "fix-pip-install",
                    "Install the missing Python package",
                    format!("`{module}` is missing from the active environment."),
                    FixCategory::Command,
                    9,
                    confidence,
                    FixComplexity::Trivial,
                    1,
                    FixPayload::Command {
                        command: format!("pip install {}", module),
                    },
                ));
                fixes.push(suggestion(
                    "fix-pip-requirements",
                    "Record the dependency",
                    format!("Add `{module}` to requirements so the environment is reproducible."),
                    FixCategory::Dependency,
                    6,
                    confidence * 0.8,
                    FixComplexity::Simple,
                    3,
                    FixPayload::Dependency {
                        name: module,
                        version: None,
                        action: DependencyAction::Add,
                    },
                ));
            }
            "py-none-attribute" => {
                let attr = m.captures.first().cloned().unwrap_or_else(|| "attr".to_string());
                fixes.push(suggestion(
                    "fix-py-none-guard",
                    "Guard against None before attribute access",
                    format!("The object is None when `.{attr}` is read."),
                    FixCategory::CodeChange,
                    8,
                    confidence,
                    FixComplexity::Trivial,
                    2,
                    FixPayload::Code {
                        template: format!("if obj is not None:\n    obj.{attr}"),
                        target_file: analysis.context.file_path.clone(),
                    },
                ));
            }
            "ts-type-mismatch" => {
                fixes.push(suggestion(
                    "fix-ts-align-types",
                    "Align the value with the declared type",
                    expand(
                        "The value has type '{1}' but the target expects '{2}'. Adjust the value or widen the annotation.",
                        &m.captures,
                    ),
                    FixCategory::CodeChange,
                    7,
                    confidence * 0.85,
                    FixComplexity::Simple,
                    10,
                    FixPayload::Code {
                        template: expand("let value: {2} = convert(input);", &m.captures),
                        target_file: analysis.context.file_path.clone(),
                    },
                ));
            }
            "java-npe" => {
                fixes.push(suggestion(
                    "fix-java-null-guard",
                    "Add a null guard or use Optional",
                    "Wrap the dereference in a null check or model the absence with Optional."
                        .to_string(),
                    FixCategory::CodeChange,
                    8,
                    confidence * 0.9,
                    FixComplexity::Simple,
                    5,
                    FixPayload::Code {
                        template: "if (value != null) {\n    value.method();\n}".to_string(),
                        target_file: analysis.context.file_path.clone(),
                    },
                ));
            }
            "rust-unwrap-none" => {
                fixes.push(suggestion(
                    "fix-rust-question-mark",
                    "Propagate instead of unwrapping",
                    "Replace unwrap() with the ? operator or an explicit match on the failure case."
                        .to_string(),
                    FixCategory::CodeChange,
                    8,
                    confidence * 0.9,
                    FixComplexity::Simple,
                    5,
                    FixPayload::Code {
                        template: "let value = fallible()?;".to_string(),
                        target_file: analysis.context.file_path.clone(),
                    },
                ));
            }
            "generic-out-of-memory" => {
                fixes.push(suggestion(
                    "fix-heap-limit",
                    "Raise the memory limit while investigating",
                    "Buys headroom, but profile allocations for the real cause.".to_string(),
                    FixCategory::Configuration,
                    6,
                    confidence * 0.7,
                    FixComplexity::Moderate,
                    15,
                    FixPayload::ConfigChange {
                        file: "deployment config".to_string(),
                        setting: "memory_limit".to_string(),
                        value: "increase by 50%".to_string(),
                    },
                ));
            }
            "generic-connection-refused" => {
                fixes.push(suggestion(
                    "fix-check-service",
                    "Verify the target service is listening",
                    "Confirm the service is up and the host/port match its bind address."
                        .to_string(),
                    FixCategory::Command,
                    7,
                    confidence * 0.8,
                    FixComplexity::Simple,
                    5,
                    FixPayload::Command {
                        command: "ss -tlnp".to_string(),
                    },
                ));
            }
            _ => {}
        }
    }

    fixes
}

/// Hard-coded heuristics for near-universal mistakes; no project-specific
/// reasoning.
pub(super) fn quick_fixes(analysis: &ErrorAnalysis) -> Vec<FixSuggestion> {
    let mut fixes = Vec::new();
    let text = analysis.error_text.as_str();

    if text.contains("Unexpected token") || text.contains("missing semicolon") {
        fixes.push(suggestion(
            "quickfix-semicolon",
            "Check for a missing semicolon or bracket",
            "Syntax errors of this shape usually point one line above the reported location."
                .to_string(),
            FixCategory::CodeChange,
            7,
            0.6,
            FixComplexity::Trivial,
            1,
            FixPayload::Code {
                template: "// terminate the previous statement".to_string(),
                target_file: analysis.context.file_path.clone(),
            },
        ));
    }

    if text.contains("is not defined") {
        fixes.push(suggestion(
            "quickfix-missing-import",
            "Import or declare the missing identifier",
            "The identifier is used before any declaration or import brings it into scope."
                .to_string(),
            FixCategory::CodeChange,
            7,
            0.65,
            FixComplexity::Trivial,
            2,
            FixPayload::Code {
                template: "import { name } from './module';".to_string(),
                target_file: analysis.context.file_path.clone(),
            },
        ));
    }

    fixes
}

/// Safe, mechanical categories only: lint and format fixers invoked through
/// an external command.
pub(super) fn automated_fixes(analysis: &ErrorAnalysis) -> Vec<FixSuggestion> {
    if !matches!(
        analysis.category,
        ErrorCategory::Syntax | ErrorCategory::Type
    ) {
        return Vec::new();
    }

    let command = match analysis.language() {
        Language::JavaScript | Language::TypeScript => "npx eslint --fix .",
        Language::Python => "ruff check --fix .",
        Language::Rust => "cargo clippy --fix --allow-dirty",
        Language::Go => "gofmt -w .",
        Language::Java | Language::Generic => return Vec::new(),
    };

    vec![suggestion(
        "autofix-linter",
        "Run the language's auto-fixer",
        "Mechanical lint and style fixes only; review the diff before committing.".to_string(),
        FixCategory::Command,
        5,
        0.55,
        FixComplexity::Trivial,
        2,
        FixPayload::Command {
            command: command.to_string(),
        },
    )]
}

/// Modernization heuristics driven by the raw error text.
pub(super) fn modernization_fixes(analysis: &ErrorAnalysis) -> Vec<FixSuggestion> {
    let mut fixes = Vec::new();
    let text = analysis.error_text.as_str();

    if matches!(
        analysis.language(),
        Language::JavaScript | Language::TypeScript
    ) && (text.contains(".then(") || text.contains("Promise"))
    {
        fixes.push(suggestion(
            "modernize-async-await",
            "Flatten the promise chain with async/await",
            "async/await makes the failure path visible to try/catch.".to_string(),
            FixCategory::CodeChange,
            4,
            0.5,
            FixComplexity::Moderate,
            20,
            FixPayload::Code {
                template: "try {\n  const data = await fetchData();\n} catch (err) {\n  handle(err);\n}".to_string(),
                target_file: analysis.context.file_path.clone(),
            },
        ));
    }

    fixes
}

/// Build/test/install commands filtered by language, plus structured
/// configuration edits for configuration-category errors.
pub(super) fn command_and_config_fixes(analysis: &ErrorAnalysis) -> Vec<FixSuggestion> {
    let mut fixes = Vec::new();

    if analysis.category == ErrorCategory::Import {
        let command = match analysis.language() {
            Language::JavaScript | Language::TypeScript => Some("npm install"),
            Language::Python => Some("pip install -r requirements.txt"),
            Language::Rust => Some("cargo fetch"),
            Language::Go => Some("go mod tidy"),
            Language::Java | Language::Generic => None,
        };
        if let Some(command) = command {
            fixes.push(suggestion(
                "cmd-sync-dependencies",
                "Synchronize project dependencies",
                "Re-resolve the project's declared dependencies.".to_string(),
                FixCategory::Command,
                6,
                0.6,
                FixComplexity::Trivial,
                3,
                FixPayload::Command {
                    command: command.to_string(),
                },
            ));
        }
    }

    if analysis.category == ErrorCategory::Configuration {
        fixes.push(suggestion(
            "config-review-env",
            "Review environment-specific configuration",
            "Compare the failing environment's config against a working one.".to_string(),
            FixCategory::Configuration,
            5,
            0.5,
            FixComplexity::Simple,
            10,
            FixPayload::ConfigChange {
                file: analysis
                    .context
                    .file_path
                    .clone()
                    .unwrap_or_else(|| "config".to_string()),
                setting: "environment".to_string(),
                value: "verify against a known-good environment".to_string(),
            },
        ));
    }

    if analysis.category == ErrorCategory::Syntax {
        let command = match analysis.language() {
            Language::JavaScript | Language::TypeScript => Some("npx tsc --noEmit"),
            Language::Python => Some("python -m py_compile"),
            Language::Rust => Some("cargo check"),
            Language::Go => Some("go vet ./..."),
            Language::Java | Language::Generic => None,
        };
        if let Some(command) = command {
            fixes.push(suggestion(
                "cmd-recheck-build",
                "Re-run the compiler check",
                "Confirms whether the syntax error is already fixed.".to_string(),
                FixCategory::Command,
                4,
                0.5,
                FixComplexity::Trivial,
                1,
                FixPayload::Command {
                    command: command.to_string(),
                },
            ));
        }
    }

    fixes
}
