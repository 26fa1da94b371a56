use crate::analysis::{ErrorAnalysis, ImpactLevel};
use crate::config::SuggestionConfig;
use crate::patterns::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

mod apply;
mod templates;
#[cfg(test)]
mod tests;

pub use apply::{
    ApplyOptions, ApplyResult, CommandOutput, CommandRunner, FileSystem, FixApplier,
    HostCommandRunner, HostFileSystem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixCategory {
    CodeChange,
    Command,
    Configuration,
    Dependency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixComplexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyAction {
    Add,
    Upgrade,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixPayload {
    Code {
        template: String,
        target_file: Option<String>,
    },
    Command {
        command: String,
    },
    ConfigChange {
        file: String,
        setting: String,
        value: String,
    },
    Dependency {
        name: String,
        version: Option<String>,
        action: DependencyAction,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub safety_score: f64,
    pub estimated_impact: ImpactLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixSuggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: FixCategory,
    pub priority: u8,
    pub confidence: f64,
    pub complexity: FixComplexity,
    pub estimated_effort_minutes: u32,
    pub payload: FixPayload,
    pub validation: Option<ValidationOutcome>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixFeedback {
    pub accepted: bool,
    pub effectiveness: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct FeedbackStats {
    accepted: u64,
    rejected: u64,
    effectiveness_sum: f64,
}

impl FeedbackStats {
    fn score(&self) -> f64 {
        let total = self.accepted + self.rejected;
        if total == 0 {
            return 0.5;
        }
        let acceptance = self.accepted as f64 / total as f64;
        let effectiveness = self.effectiveness_sum / total as f64;
        (acceptance + effectiveness) / 2.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuggestOptions {
    pub min_confidence: Option<f64>,
    pub min_priority: Option<u8>,
    pub max_suggestions: Option<usize>,
}

/// Produces, ranks, and validates remediation suggestions for one analysis.
/// User feedback only ever re-ranks future output; stored analyses are never
/// touched.
pub struct FixSuggestionEngine {
    config: SuggestionConfig,
    feedback: HashMap<String, FeedbackStats>,
}

impl FixSuggestionEngine {
    pub fn new(config: SuggestionConfig) -> Self {
        Self {
            config,
            feedback: HashMap::new(),
        }
    }

    /// Unions the five generators, filters by confidence and priority,
    /// ranks, and truncates.
    pub fn generate_fix_suggestions(
        &self,
        analysis: &ErrorAnalysis,
        options: &SuggestOptions,
    ) -> Vec<FixSuggestion> {
        let mut suggestions = Vec::new();
        suggestions.extend(templates::pattern_fixes(analysis));
        suggestions.extend(templates::quick_fixes(analysis));
        suggestions.extend(templates::automated_fixes(analysis));
        suggestions.extend(templates::modernization_fixes(analysis));
        suggestions.extend(templates::command_and_config_fixes(analysis));

        let min_confidence = options.min_confidence.unwrap_or(self.config.min_confidence);
        suggestions.retain(|s| s.confidence >= min_confidence);
        if let Some(min_priority) = options.min_priority {
            suggestions.retain(|s| s.priority >= min_priority);
        }

        // one entry per suggestion id; generators can overlap
        let mut seen = std::collections::HashSet::new();
        suggestions.retain(|s| seen.insert(s.id.clone()));

        suggestions.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    let fa = self.feedback_score(&a.id);
                    let fb = self.feedback_score(&b.id);
                    fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let max = options
            .max_suggestions
            .unwrap_or(self.config.max_suggestions);
        suggestions.truncate(max);
        suggestions
    }

    /// Structural checks plus a safety score. Never fails: problems surface
    /// as warnings and a lowered score.
    pub fn validate_fix_suggestion(
        &self,
        suggestion: &FixSuggestion,
        error_severity: Severity,
    ) -> ValidationOutcome {
        let mut warnings = Vec::new();
        let mut is_valid = true;

        match &suggestion.payload {
            FixPayload::Code { target_file, .. } => {
                if let Some(file) = target_file {
                    if !Path::new(file).exists() {
                        is_valid = false;
                        warnings.push(format!("target file '{}' does not exist", file));
                    }
                }
            }
            FixPayload::Command { command } => {
                let program = command.split_whitespace().next().unwrap_or("");
                if program.is_empty() || which::which(program).is_err() {
                    is_valid = false;
                    warnings.push(format!("command '{}' is not resolvable", program));
                }
            }
            FixPayload::ConfigChange { file, .. } => {
                if !Path::new(file).exists() {
                    warnings.push(format!("config file '{}' does not exist yet", file));
                }
            }
            FixPayload::Dependency { .. } => {}
        }

        if suggestion.complexity >= FixComplexity::Moderate && error_severity <= Severity::Low {
            warnings.push(
                "high-complexity fix proposed for a low-severity error".to_string(),
            );
        }

        let complexity_penalty = match suggestion.complexity {
            FixComplexity::Trivial => 0.0,
            FixComplexity::Simple => 0.1,
            FixComplexity::Moderate => 0.25,
            FixComplexity::Complex => 0.45,
        };
        let category_penalty = match suggestion.category {
            FixCategory::Command => 0.1,
            FixCategory::CodeChange => 0.05,
            FixCategory::Configuration => 0.05,
            FixCategory::Dependency => 0.0,
        };
        let safety_score =
            (suggestion.confidence - complexity_penalty - category_penalty).clamp(0.0, 1.0);

        let estimated_impact = match suggestion.complexity {
            FixComplexity::Trivial | FixComplexity::Simple => ImpactLevel::Low,
            FixComplexity::Moderate => ImpactLevel::Medium,
            FixComplexity::Complex => ImpactLevel::High,
        };

        ValidationOutcome {
            is_valid,
            warnings,
            safety_score,
            estimated_impact,
        }
    }

    /// Stores acceptance/effectiveness for a suggestion id. Used only to
    /// re-rank future suggestions.
    pub fn record_feedback(&mut self, fix_id: &str, feedback: FixFeedback) {
        let stats = self.feedback.entry(fix_id.to_string()).or_default();
        if feedback.accepted {
            stats.accepted += 1;
        } else {
            stats.rejected += 1;
        }
        stats.effectiveness_sum += feedback.effectiveness.clamp(0.0, 1.0);
    }

    fn feedback_score(&self, fix_id: &str) -> f64 {
        self.feedback
            .get(fix_id)
            .map(|s| s.score())
            .unwrap_or(0.5)
    }
}
