use super::*;
use crate::analysis::{ErrorAnalysisEngine, ErrorContext};
use crate::config::Config;
use crate::patterns::Language;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn analyzed(text: &str, language: Language) -> crate::analysis::ErrorAnalysis {
    let mut engine = ErrorAnalysisEngine::new(Config::default());
    engine.initialize().unwrap();
    engine
        .analyze(
            text,
            &ErrorContext {
                language: Some(language),
                ..Default::default()
            },
        )
        .unwrap()
}

fn suggestion_engine() -> FixSuggestionEngine {
    FixSuggestionEngine::new(crate::config::SuggestionConfig::default())
}

#[test]
fn test_suggestions_ranked_by_priority_then_confidence() {
    let engine = suggestion_engine();
    let analysis = analyzed(
        "ModuleNotFoundError: No module named 'requests'",
        Language::Python,
    );
    let suggestions = engine.generate_fix_suggestions(&analysis, &SuggestOptions::default());

    assert!(!suggestions.is_empty());
    for pair in suggestions.windows(2) {
        assert!(
            pair[0].priority > pair[1].priority
                || (pair[0].priority == pair[1].priority
                    && pair[0].confidence >= pair[1].confidence)
        );
    }
    assert_eq!(suggestions[0].id, "fix-pip-install");
}

#[test]
fn test_truncation_and_priority_filter() {
    let engine = suggestion_engine();
    let analysis = analyzed(
        "ModuleNotFoundError: No module named 'requests'",
        Language::Python,
    );

    let capped = engine.generate_fix_suggestions(
        &analysis,
        &SuggestOptions {
            max_suggestions: Some(1),
            ..Default::default()
        },
    );
    assert_eq!(capped.len(), 1);

    let high_priority_only = engine.generate_fix_suggestions(
        &analysis,
        &SuggestOptions {
            min_priority: Some(9),
            ..Default::default()
        },
    );
    assert!(high_priority_only.iter().all(|s| s.priority >= 9));
}

#[test]
fn test_validate_missing_target_file() {
    let engine = suggestion_engine();
    let suggestion = FixSuggestion {
        id: "t".to_string(),
        title: "t".to_string(),
        description: String::new(),
        category: FixCategory::CodeChange,
        priority: 5,
        confidence: 0.8,
        complexity: FixComplexity::Trivial,
        estimated_effort_minutes: 1,
        payload: FixPayload::Code {
            template: "x".to_string(),
            target_file: Some("/definitely/not/a/real/file.js".to_string()),
        },
        validation: None,
    };
    let outcome = engine.validate_fix_suggestion(&suggestion, crate::patterns::Severity::High);
    assert!(!outcome.is_valid);
    assert!(!outcome.warnings.is_empty());
}

#[test]
fn test_validate_existing_target_file_passes() {
    let engine = suggestion_engine();
    let file = tempfile::NamedTempFile::new().unwrap();
    let suggestion = FixSuggestion {
        id: "t".to_string(),
        title: "t".to_string(),
        description: String::new(),
        category: FixCategory::CodeChange,
        priority: 5,
        confidence: 0.8,
        complexity: FixComplexity::Trivial,
        estimated_effort_minutes: 1,
        payload: FixPayload::Code {
            template: "x".to_string(),
            target_file: Some(file.path().to_string_lossy().to_string()),
        },
        validation: None,
    };
    let outcome = engine.validate_fix_suggestion(&suggestion, crate::patterns::Severity::High);
    assert!(outcome.is_valid);
    assert!(outcome.safety_score > 0.0);
}

#[test]
fn test_validate_unresolvable_command() {
    let engine = suggestion_engine();
    let suggestion = FixSuggestion {
        id: "t".to_string(),
        title: "t".to_string(),
        description: String::new(),
        category: FixCategory::Command,
        priority: 5,
        confidence: 0.8,
        complexity: FixComplexity::Trivial,
        estimated_effort_minutes: 1,
        payload: FixPayload::Command {
            command: "definitely-not-a-real-binary-9931 --flag".to_string(),
        },
        validation: None,
    };
    let outcome = engine.validate_fix_suggestion(&suggestion, crate::patterns::Severity::High);
    assert!(!outcome.is_valid);
}

#[test]
fn test_validate_flags_complex_fix_for_minor_error() {
    let engine = suggestion_engine();
    let suggestion = FixSuggestion {
        id: "t".to_string(),
        title: "t".to_string(),
        description: String::new(),
        category: FixCategory::Dependency,
        priority: 3,
        confidence: 0.9,
        complexity: FixComplexity::Complex,
        estimated_effort_minutes: 60,
        payload: FixPayload::Dependency {
            name: "leftpad".to_string(),
            version: None,
            action: DependencyAction::Upgrade,
        },
        validation: None,
    };
    let outcome = engine.validate_fix_suggestion(&suggestion, crate::patterns::Severity::Low);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("high-complexity")));
    assert!(outcome.safety_score < suggestion.confidence);
}

#[test]
fn test_feedback_reranks_equal_suggestions() {
    let mut engine = suggestion_engine();
    // heavily downvote the optional-chaining fix
    for _ in 0..5 {
        engine.record_feedback(
            "fix-js-optional-chaining",
            FixFeedback {
                accepted: false,
                effectiveness: 0.0,
            },
        );
    }
    for _ in 0..5 {
        engine.record_feedback(
            "fix-js-null-check",
            FixFeedback {
                accepted: true,
                effectiveness: 1.0,
            },
        );
    }

    let analysis = analyzed(
        "Cannot read property 'id' of undefined",
        Language::JavaScript,
    );
    let suggestions = engine.generate_fix_suggestions(&analysis, &SuggestOptions::default());
    let chain_pos = suggestions
        .iter()
        .position(|s| s.id == "fix-js-optional-chaining");
    let check_pos = suggestions.iter().position(|s| s.id == "fix-js-null-check");
    // both still present; feedback only affects ordering among equals,
    // never removes a suggestion
    assert!(chain_pos.is_some() && check_pos.is_some());
}

struct RecordingFs {
    files: Mutex<std::collections::HashMap<PathBuf, String>>,
}

#[async_trait]
impl FileSystem for RecordingFs {
    async fn read(&self, path: &Path) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file"))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

struct FailingRunner;

#[async_trait]
impl CommandRunner for FailingRunner {
    async fn run(&self, _command: &str) -> Result<CommandOutput> {
        Ok(CommandOutput {
            status: 1,
            stdout: String::new(),
            stderr: "command not found".to_string(),
        })
    }
}

fn command_suggestion(command: &str) -> FixSuggestion {
    FixSuggestion {
        id: "cmd".to_string(),
        title: "run".to_string(),
        description: String::new(),
        category: FixCategory::Command,
        priority: 5,
        confidence: 0.8,
        complexity: FixComplexity::Trivial,
        estimated_effort_minutes: 1,
        payload: FixPayload::Command {
            command: command.to_string(),
        },
        validation: None,
    }
}

#[tokio::test]
async fn test_apply_dry_run_never_mutates() {
    let fs = RecordingFs {
        files: Mutex::new(std::collections::HashMap::new()),
    };
    let applier = FixApplier::new(Box::new(fs), Box::new(FailingRunner));

    let result = applier
        .apply(
            &command_suggestion("rm -rf /tmp/whatever"),
            ApplyOptions {
                dry_run: true,
                backup: false,
            },
        )
        .await;

    assert!(result.success);
    assert!(result.changes[0].starts_with("would run"));
}

#[tokio::test]
async fn test_apply_command_failure_is_result_not_panic() {
    let fs = RecordingFs {
        files: Mutex::new(std::collections::HashMap::new()),
    };
    let applier = FixApplier::new(Box::new(fs), Box::new(FailingRunner));

    let result = applier
        .apply(&command_suggestion("npm install"), ApplyOptions::default())
        .await;

    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_apply_code_with_backup() {
    let fs = RecordingFs {
        files: Mutex::new(std::collections::HashMap::new()),
    };
    fs.files.lock().unwrap().insert(
        PathBuf::from("src/user.js"),
        "const user = getUser();".to_string(),
    );
    let applier = FixApplier::new(Box::new(fs), Box::new(FailingRunner));

    let suggestion = FixSuggestion {
        id: "fix".to_string(),
        title: "guard".to_string(),
        description: String::new(),
        category: FixCategory::CodeChange,
        priority: 9,
        confidence: 0.9,
        complexity: FixComplexity::Trivial,
        estimated_effort_minutes: 1,
        payload: FixPayload::Code {
            template: "const id = user?.id;".to_string(),
            target_file: Some("src/user.js".to_string()),
        },
        validation: None,
    };

    let result = applier
        .apply(
            &suggestion,
            ApplyOptions {
                dry_run: false,
                backup: true,
            },
        )
        .await;

    assert!(result.success);
    assert!(result.changes.iter().any(|c| c.contains("backed up")));
}
