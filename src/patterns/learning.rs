use super::{
    ErrorCategory, ErrorPattern, Language, PatternMatchResult, PatternMatcher, PatternRule,
    Severity,
};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Caller feedback about one match run. Naming a correct or incorrect
/// pattern adjusts its running effectiveness; supplying an actual cause when
/// nothing matched seeds a new learned pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchFeedback {
    pub correct_pattern_id: Option<String>,
    pub incorrect_pattern_ids: Vec<String>,
    pub actual_cause: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingRecord {
    pub error_text: String,
    pub matched_pattern_ids: Vec<String>,
    pub feedback: MatchFeedback,
    pub recorded_at: DateTime<Utc>,
}

/// Running effectiveness counters for one pattern.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PatternStats {
    pub match_count: u64,
    pub success_count: u64,
    pub false_positives: u64,
}

impl PatternStats {
    /// successes / matches, penalized by false positives; 0.5 with no data.
    pub fn effectiveness(&self) -> f64 {
        if self.match_count == 0 {
            return 0.5;
        }
        let raw =
            (self.success_count as f64 - 0.5 * self.false_positives as f64) / self.match_count as f64;
        raw.clamp(0.0, 1.0)
    }
}

pub(super) fn apply_feedback(
    matcher: &mut PatternMatcher,
    error_text: &str,
    matches: &[PatternMatchResult],
    feedback: MatchFeedback,
) -> Result<(), EngineError> {
    if let Some(id) = &feedback.correct_pattern_id {
        if matcher.get_pattern(id).is_none() {
            return Err(EngineError::InvalidFeedback(format!(
                "feedback names unknown pattern '{}'",
                id
            )));
        }
    }

    for result in matches {
        let stats = matcher
            .stats_mut()
            .entry(result.pattern_id.clone())
            .or_default();
        stats.match_count += 1;

        if feedback.correct_pattern_id.as_deref() == Some(result.pattern_id.as_str()) {
            stats.success_count += 1;
        }
        if feedback
            .incorrect_pattern_ids
            .iter()
            .any(|id| id == &result.pattern_id)
        {
            stats.false_positives += 1;
        }
    }

    if matches.is_empty() {
        if let Some(cause) = &feedback.actual_cause {
            let pattern = synthesize_pattern(error_text, cause);
            tracing::debug!("learned pattern '{}' from feedback", pattern.id);
            matcher.add_custom_pattern(pattern)?;
        }
    }

    let matched_pattern_ids = matches.iter().map(|m| m.pattern_id.clone()).collect();
    matcher.training_mut().push(TrainingRecord {
        error_text: error_text.to_string(),
        matched_pattern_ids,
        feedback,
        recorded_at: Utc::now(),
    });

    Ok(())
}

/// Builds a generalized regex from a concrete error line: numeric literals
/// and quoted strings become wildcards so future variants still match.
fn synthesize_pattern(error_text: &str, actual_cause: &str) -> ErrorPattern {
    let first_line = error_text.lines().next().unwrap_or(error_text);
    let expression = generalize(first_line);

    let mut hasher = DefaultHasher::new();
    expression.hash(&mut hasher);
    let id = format!("learned-{:016x}", hasher.finish());

    ErrorPattern {
        id,
        name: format!("Learned: {}", truncate(actual_cause, 60)),
        category: ErrorCategory::Runtime,
        language: Language::Generic,
        rules: vec![PatternRule::regex(expression, 0.5)],
        common_causes: vec![actual_cause.to_string()],
        severity: Severity::Medium,
        base_confidence: 0.6,
        suggestion_hints: Vec::new(),
        active: true,
        version: 1,
    }
}

fn generalize(line: &str) -> String {
    let mut escaped = regex::escape(line);
    // order matters: quoted strings first, then bare numbers
    let quoted = regex::Regex::new(r"'[^']*'").unwrap();
    escaped = quoted.replace_all(&escaped, "'[^']*'").to_string();
    let numbers = regex::Regex::new(r"\d+").unwrap();
    numbers.replace_all(&escaped, r"\d+").to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
