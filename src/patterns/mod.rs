use crate::config::PatternConfig;
use crate::error::EngineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

mod builtin;
mod learning;
#[cfg(test)]
mod tests;

pub use learning::{MatchFeedback, PatternStats, TrainingRecord};

use crate::analysis::cache::TtlCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    Rust,
    Go,
    Generic,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Generic => "generic",
        }
    }

    pub fn parse(name: &str) -> Option<Language> {
        match name.to_lowercase().as_str() {
            "javascript" | "js" | "node" => Some(Language::JavaScript),
            "typescript" | "ts" => Some(Language::TypeScript),
            "python" | "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "rust" | "rs" => Some(Language::Rust),
            "go" | "golang" => Some(Language::Go),
            "generic" => Some(Language::Generic),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext.trim_start_matches('.') {
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// One level up, saturating at Critical.
    pub fn escalate(self) -> Severity {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High => Severity::Critical,
            Severity::Critical => Severity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Runtime,
    Type,
    Import,
    Memory,
    Security,
    Performance,
    Network,
    Configuration,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::Type => "type",
            ErrorCategory::Import => "import",
            ErrorCategory::Memory => "memory",
            ErrorCategory::Security => "security",
            ErrorCategory::Performance => "performance",
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Regex,
    Substring,
    Prefix,
    Similarity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    pub kind: MatcherKind,
    pub expression: String,
    pub weight: f64,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl PatternRule {
    pub fn new(kind: MatcherKind, expression: impl Into<String>, weight: f64) -> Self {
        Self {
            kind,
            expression: expression.into(),
            weight,
            compiled: None,
        }
    }

    pub fn regex(expression: impl Into<String>, weight: f64) -> Self {
        Self::new(MatcherKind::Regex, expression, weight)
    }

    pub fn substring(expression: impl Into<String>, weight: f64) -> Self {
        Self::new(MatcherKind::Substring, expression, weight)
    }

    fn compile(&mut self) -> Result<(), EngineError> {
        if self.weight <= 0.0 || self.weight > 1.0 {
            return Err(EngineError::InvalidPattern(format!(
                "matcher weight {} outside (0, 1]",
                self.weight
            )));
        }
        if self.expression.is_empty() {
            return Err(EngineError::InvalidPattern(
                "matcher expression is empty".to_string(),
            ));
        }
        if self.kind == MatcherKind::Regex {
            self.compiled = Some(Regex::new(&self.expression)?);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub id: String,
    pub name: String,
    pub category: ErrorCategory,
    pub language: Language,
    pub rules: Vec<PatternRule>,
    pub common_causes: Vec<String>,
    pub severity: Severity,
    pub base_confidence: f64,
    pub suggestion_hints: Vec<String>,
    pub active: bool,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternMatchResult {
    pub pattern_id: String,
    pub pattern_name: String,
    pub language: Language,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub confidence: f64,
    pub matched_span: Option<(usize, usize)>,
    pub captures: Vec<String>,
    pub suggestion_hints: Vec<String>,
}

/// Owns the fault-signature corpus (built-in plus learned) and scores
/// error text against it.
pub struct PatternMatcher {
    patterns: HashMap<String, ErrorPattern>,
    stats: HashMap<String, PatternStats>,
    training: Vec<TrainingRecord>,
    cache: Mutex<TtlCache<u64, Vec<PatternMatchResult>>>,
    confidence_threshold: f64,
}

impl PatternMatcher {
    pub fn new(config: &PatternConfig) -> Self {
        let mut matcher = Self {
            patterns: HashMap::new(),
            stats: HashMap::new(),
            training: Vec::new(),
            cache: Mutex::new(TtlCache::new(Duration::from_secs(config.cache_ttl_secs))),
            confidence_threshold: config.confidence_threshold,
        };

        for pattern in builtin::builtin_patterns() {
            // builtin expressions are known-good; a compile failure here is a bug
            if let Err(e) = matcher.register(pattern) {
                tracing::error!("builtin pattern rejected: {}", e);
            }
        }

        matcher
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn list_patterns(&self) -> Vec<&ErrorPattern> {
        let mut all: Vec<&ErrorPattern> = self.patterns.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn get_pattern(&self, id: &str) -> Option<&ErrorPattern> {
        self.patterns.get(id)
    }

    /// Registers a custom pattern. Invalid matchers are rejected here and
    /// never enter the active corpus.
    pub fn add_custom_pattern(&mut self, pattern: ErrorPattern) -> Result<(), EngineError> {
        self.register(pattern)
    }

    pub fn remove_pattern(&mut self, id: &str) -> bool {
        let removed = self.patterns.remove(id).is_some();
        if removed {
            self.cache.lock().unwrap().clear();
        }
        removed
    }

    pub fn set_confidence_threshold(&mut self, threshold: f64) {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        // cached results were filtered with the old threshold
        self.cache.lock().unwrap().clear();
    }

    fn register(&mut self, mut pattern: ErrorPattern) -> Result<(), EngineError> {
        if pattern.rules.is_empty() {
            return Err(EngineError::InvalidPattern(format!(
                "pattern '{}' has no matchers",
                pattern.id
            )));
        }
        for rule in &mut pattern.rules {
            rule.compile()?;
        }
        self.patterns.insert(pattern.id.clone(), pattern);
        // cached results predate the new pattern
        self.cache.lock().unwrap().clear();
        Ok(())
    }

    /// Scores the error text against every active pattern applicable to the
    /// context language, sorted by confidence, language specificity, and
    /// historical effectiveness. Results below the confidence threshold are
    /// dropped.
    pub fn match_error(&self, error_text: &str, language: Option<Language>) -> Vec<PatternMatchResult> {
        let key = match_cache_key(error_text, language);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return cached;
        }

        let mut results: Vec<PatternMatchResult> = Vec::new();
        for pattern in self.patterns.values() {
            if !pattern.active {
                continue;
            }
            if pattern.language != Language::Generic {
                if let Some(lang) = language {
                    if pattern.language != lang {
                        continue;
                    }
                }
            }
            if let Some(result) = self.evaluate_pattern(pattern, error_text) {
                if result.confidence >= self.confidence_threshold {
                    results.push(result);
                }
            }
        }

        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let spec_a = a.language != Language::Generic;
                    let spec_b = b.language != Language::Generic;
                    spec_b.cmp(&spec_a)
                })
                .then_with(|| {
                    let eff_a = self.effectiveness(&a.pattern_id);
                    let eff_b = self.effectiveness(&b.pattern_id);
                    eff_b.partial_cmp(&eff_a).unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        self.cache.lock().unwrap().insert(key, results.clone());
        results
    }

    fn evaluate_pattern(&self, pattern: &ErrorPattern, text: &str) -> Option<PatternMatchResult> {
        let mut best: Option<(f64, Option<(usize, usize)>, Vec<String>)> = None;

        for rule in &pattern.rules {
            let scored = match rule.kind {
                MatcherKind::Regex => score_regex(rule, pattern.base_confidence, text),
                MatcherKind::Substring => score_substring(rule, pattern.base_confidence, text),
                MatcherKind::Prefix => score_prefix(rule, pattern.base_confidence, text),
                MatcherKind::Similarity => score_similarity(rule, pattern.base_confidence, text),
            };
            if let Some((confidence, span, captures)) = scored {
                let better = best
                    .as_ref()
                    .map(|(c, _, _)| confidence > *c)
                    .unwrap_or(true);
                if better {
                    best = Some((confidence, span, captures));
                }
            }
        }

        best.map(|(confidence, matched_span, captures)| PatternMatchResult {
            pattern_id: pattern.id.clone(),
            pattern_name: pattern.name.clone(),
            language: pattern.language,
            category: pattern.category,
            severity: pattern.severity,
            confidence,
            matched_span,
            captures,
            suggestion_hints: pattern.suggestion_hints.clone(),
        })
    }

    fn effectiveness(&self, pattern_id: &str) -> f64 {
        self.stats
            .get(pattern_id)
            .map(|s| s.effectiveness())
            .unwrap_or(0.5)
    }

    /// Records a training example and adjusts pattern effectiveness. When
    /// feedback names an actual cause and nothing matched, a generalized
    /// pattern is synthesized and registered at reduced weight.
    pub fn learn(
        &mut self,
        error_text: &str,
        matches: &[PatternMatchResult],
        feedback: MatchFeedback,
    ) -> Result<(), EngineError> {
        learning::apply_feedback(self, error_text, matches, feedback)
    }

    pub fn training_len(&self) -> usize {
        self.training.len()
    }

    pub(crate) fn stats_mut(&mut self) -> &mut HashMap<String, PatternStats> {
        &mut self.stats
    }

    pub(crate) fn training_mut(&mut self) -> &mut Vec<TrainingRecord> {
        &mut self.training
    }
}

fn match_cache_key(text: &str, language: Option<Language>) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    language.hash(&mut hasher);
    hasher.finish()
}

fn score_regex(
    rule: &PatternRule,
    base: f64,
    text: &str,
) -> Option<(f64, Option<(usize, usize)>, Vec<String>)> {
    let re = rule.compiled.as_ref()?;
    let caps = re.captures(text)?;
    let whole = caps.get(0)?;

    let mut confidence = base * rule.weight;
    let first_line_len = text.lines().next().map(|l| l.len()).unwrap_or(0);
    if whole.start() == 0 && whole.end() >= first_line_len {
        confidence += 0.15;
    } else if whole.start() == 0 {
        confidence += 0.05;
    }
    if !text.is_empty() {
        confidence += 0.1 * (whole.len() as f64 / text.len() as f64).min(1.0);
    }

    let captures = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().to_string())
        .collect();

    Some((
        confidence.min(1.0),
        Some((whole.start(), whole.end())),
        captures,
    ))
}

fn score_substring(
    rule: &PatternRule,
    base: f64,
    text: &str,
) -> Option<(f64, Option<(usize, usize)>, Vec<String>)> {
    let start = text.find(&rule.expression)?;
    let mut confidence = base * rule.weight;
    if start == 0 {
        confidence += 0.05;
    }
    Some((
        confidence.min(1.0),
        Some((start, start + rule.expression.len())),
        Vec::new(),
    ))
}

fn score_prefix(
    rule: &PatternRule,
    base: f64,
    text: &str,
) -> Option<(f64, Option<(usize, usize)>, Vec<String>)> {
    if !text.starts_with(&rule.expression) {
        return None;
    }
    Some((
        (base * rule.weight + 0.05).min(1.0),
        Some((0, rule.expression.len())),
        Vec::new(),
    ))
}

fn score_similarity(
    rule: &PatternRule,
    base: f64,
    text: &str,
) -> Option<(f64, Option<(usize, usize)>, Vec<String>)> {
    let similarity = jaccard_words(&rule.expression, text);
    if similarity < 0.5 {
        return None;
    }
    Some(((base * rule.weight * similarity).min(1.0), None, Vec::new()))
}

pub(crate) fn jaccard_words(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
