use crate::config::Config;
use crate::error::EngineError;
use crate::patterns::{
    ErrorCategory, ErrorPattern, Language, MatchFeedback, PatternMatchResult, PatternMatcher,
    Severity,
};
use crate::suggest::{FixSuggestion, FixSuggestionEngine, SuggestOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub mod cache;
pub mod history;
pub mod signature;

pub use history::{
    ErrorFrequencyData, ErrorTrend, FrequencyStore, HistoryStore, InMemoryHistoryStore,
    RelatedError, SimilarError, TrendDirection,
};
pub use signature::ErrorSignature;

use cache::TtlCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// Caller-supplied execution context for one error occurrence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    pub language: Option<Language>,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub function_name: Option<String>,
    pub project_context: Option<String>,
    pub execution_context: Option<String>,
    pub framework: Option<String>,
}

impl ErrorContext {
    fn cache_key(&self, error_text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        error_text.hash(&mut hasher);
        self.language.hash(&mut hasher);
        self.file_path.hash(&mut hasher);
        self.line_number.hash(&mut hasher);
        self.column_number.hash(&mut hasher);
        self.function_name.hash(&mut hasher);
        self.project_context.hash(&mut hasher);
        self.execution_context.hash(&mut hasher);
        self.framework.hash(&mut hasher);
        hasher.finish()
    }

    fn resolved_language(&self) -> Option<Language> {
        self.language.or_else(|| {
            self.file_path
                .as_deref()
                .and_then(|p| std::path::Path::new(p).extension())
                .and_then(|e| e.to_str())
                .and_then(Language::from_extension)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Recurrence,
    BuildImport,
    MemoryPressure,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextualFactor {
    pub name: String,
    pub value: String,
    pub impact: ImpactLevel,
}

/// Structured result of one analyze call. Deterministic for a given
/// (error text, context, pattern corpus, frequency history); only the
/// frequency counters mutate as a side effect.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorAnalysis {
    pub id: String,
    pub error_text: String,
    pub context: ErrorContext,
    pub signature: ErrorSignature,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub confidence: f64,
    pub root_cause: String,
    pub affected_components: Vec<String>,
    pub matches: Vec<PatternMatchResult>,
    pub suggestions: Vec<FixSuggestion>,
    pub insights: Vec<Insight>,
    pub contextual_factors: Vec<ContextualFactor>,
    pub related_errors: Vec<RelatedError>,
    pub occurrence_count: u64,
    pub processing_time_ms: u64,
    pub analyzed_at: DateTime<Utc>,
}

impl ErrorAnalysis {
    pub fn language(&self) -> Language {
        self.signature.language
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatistics {
    pub pattern_count: usize,
    pub tracked_signatures: usize,
    pub analyses_performed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
}

const BLOCKING_KEYWORDS: &[&str] = &[
    "syntax error",
    "syntaxerror",
    "compile error",
    "compilation failed",
    "fatal",
    "build failed",
    "module not found",
    "modulenotfounderror",
];

const SECURITY_KEYWORDS: &[&str] = &[
    "security",
    "vulnerability",
    "injection",
    "unauthorized",
    "csrf",
    "xss",
];

/// Orchestrates the pattern matcher, frequency history, and fix suggestion
/// engine into one structured analysis per error.
pub struct ErrorAnalysisEngine {
    patterns: PatternMatcher,
    suggestions: FixSuggestionEngine,
    frequency: FrequencyStore,
    cache: Mutex<TtlCache<u64, ErrorAnalysis>>,
    config: Config,
    analyses_performed: u64,
    initialized: bool,
}

impl ErrorAnalysisEngine {
    pub fn new(config: Config) -> Self {
        Self::with_store(config, Box::new(InMemoryHistoryStore))
    }

    pub fn with_store(config: Config, store: Box<dyn HistoryStore>) -> Self {
        Self {
            patterns: PatternMatcher::new(&config.patterns),
            suggestions: FixSuggestionEngine::new(config.suggestions.clone()),
            frequency: FrequencyStore::new(store, config.analysis.recent_occurrence_cap),
            cache: Mutex::new(TtlCache::new(Duration::from_secs(
                config.analysis.cache_ttl_secs,
            ))),
            config,
            analyses_performed: 0,
            initialized: false,
        }
    }

    /// Loads persisted history (if the store has any) and arms the engine.
    /// Every other entry point fails until this has completed.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        self.frequency
            .load()
            .map_err(|e| EngineError::ConfigError(format!("history load failed: {}", e)))?;
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized(
                "call initialize() before analyzing".to_string(),
            ));
        }
        Ok(())
    }

    /// Full analysis pipeline, memoized by (text, context) with a TTL. A
    /// cache hit does not touch frequency history.
    pub fn analyze(
        &mut self,
        error_text: &str,
        context: &ErrorContext,
    ) -> Result<ErrorAnalysis, EngineError> {
        self.ensure_initialized()?;

        let key = context.cache_key(error_text);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(cached);
        }

        let started = Instant::now();
        let language = context.resolved_language();
        let matches = self.patterns.match_error(error_text, language);
        let signature = ErrorSignature::compute(
            error_text,
            language.unwrap_or(Language::Generic),
            context.file_path.as_deref(),
        );

        let best = matches.first();
        let lowered = error_text.to_lowercase();

        let category = best
            .map(|m| m.category)
            .unwrap_or_else(|| keyword_fallback_category(&lowered));
        let severity = derive_severity(best, &lowered, context);
        let confidence = weighted_confidence(&matches);
        let best_cause = best
            .and_then(|m| self.patterns.get_pattern(&m.pattern_id))
            .and_then(|p| p.common_causes.first().cloned());
        let root_cause = derive_root_cause(best_cause, error_text);
        let affected_components = affected_components(context);

        let occurrence_count = self.frequency.record(
            &signature,
            context.file_path.as_deref(),
            category,
            severity,
            Utc::now(),
        );

        let insights = self.build_insights(&lowered, category, occurrence_count, context);
        let contextual_factors = contextual_factors(context);
        let related_errors = self
            .frequency
            .related(&signature, context.file_path.as_deref(), 5);

        let mut analysis = ErrorAnalysis {
            id: format!("an-{:016x}", key),
            error_text: error_text.to_string(),
            context: context.clone(),
            signature,
            category,
            severity,
            confidence,
            root_cause,
            affected_components,
            matches,
            suggestions: Vec::new(),
            insights,
            contextual_factors,
            related_errors,
            occurrence_count,
            processing_time_ms: 0,
            analyzed_at: Utc::now(),
        };

        analysis.suggestions = self
            .suggestions
            .generate_fix_suggestions(&analysis, &SuggestOptions::default());
        analysis.processing_time_ms = started.elapsed().as_millis() as u64;

        self.analyses_performed += 1;
        self.cache.lock().unwrap().insert(key, analysis.clone());
        Ok(analysis)
    }

    /// Jaccard word-overlap similarity against every tracked signature,
    /// blended with language/extension terms; top-`limit` above the floor.
    pub fn find_similar_errors(
        &self,
        error_text: &str,
        context: &ErrorContext,
        limit: usize,
    ) -> Result<Vec<SimilarError>, EngineError> {
        self.ensure_initialized()?;
        let language = context.resolved_language().unwrap_or(Language::Generic);
        let signature =
            ErrorSignature::compute(error_text, language, context.file_path.as_deref());
        Ok(self
            .frequency
            .similar(&signature, self.config.analysis.similarity_floor, limit))
    }

    pub fn get_error_trends(&self) -> Result<Vec<ErrorTrend>, EngineError> {
        self.ensure_initialized()?;
        Ok(self.frequency.trends(Utc::now()))
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        let cache = self.cache.lock().unwrap();
        EngineStatistics {
            pattern_count: self.patterns.pattern_count(),
            tracked_signatures: self.frequency.len(),
            analyses_performed: self.analyses_performed,
            cache_hits: cache.hits(),
            cache_misses: cache.misses(),
            cache_hit_rate: cache.hit_rate(),
        }
    }

    pub fn frequency_count(&self, signature_hash: &str) -> u64 {
        self.frequency
            .get(signature_hash)
            .map(|e| e.total)
            .unwrap_or(0)
    }

    pub fn add_custom_pattern(&mut self, pattern: ErrorPattern) -> Result<(), EngineError> {
        self.patterns.add_custom_pattern(pattern)
    }

    pub fn remove_pattern(&mut self, id: &str) -> bool {
        self.patterns.remove_pattern(id)
    }

    pub fn list_patterns(&self) -> Vec<&ErrorPattern> {
        self.patterns.list_patterns()
    }

    pub fn set_confidence_threshold(&mut self, threshold: f64) {
        self.patterns.set_confidence_threshold(threshold);
        // analyses embed filtered matches, so they are stale too
        self.cache.lock().unwrap().clear();
    }

    pub fn record_pattern_feedback(
        &mut self,
        error_text: &str,
        matches: &[PatternMatchResult],
        feedback: MatchFeedback,
    ) -> Result<(), EngineError> {
        self.patterns.learn(error_text, matches, feedback)
    }

    pub fn suggestion_engine_mut(&mut self) -> &mut FixSuggestionEngine {
        &mut self.suggestions
    }

    pub fn suggestion_engine(&self) -> &FixSuggestionEngine {
        &self.suggestions
    }

    pub fn save_history(&self) -> anyhow::Result<()> {
        self.frequency.save()
    }

    fn build_insights(
        &self,
        lowered_text: &str,
        category: ErrorCategory,
        occurrence_count: u64,
        context: &ErrorContext,
    ) -> Vec<Insight> {
        let mut insights = Vec::new();

        if occurrence_count >= 3 {
            insights.push(Insight {
                kind: InsightKind::Recurrence,
                message: format!(
                    "This fault class has occurred {} times; a targeted fix would pay for itself.",
                    occurrence_count
                ),
                confidence: 0.9,
            });
        }

        if category == ErrorCategory::Import {
            let in_build = context
                .execution_context
                .as_deref()
                .map(|c| c == "build" || c == "ci")
                .unwrap_or(false);
            insights.push(Insight {
                kind: InsightKind::BuildImport,
                message: if in_build {
                    "Import failure during a build stage usually means the dependency \
                     install step is missing or ran against the wrong environment."
                        .to_string()
                } else {
                    "Import failures are usually environment drift: compare installed \
                     packages against the project manifest."
                        .to_string()
                },
                confidence: if in_build { 0.8 } else { 0.55 },
            });
        }

        if lowered_text.contains("memory")
            || lowered_text.contains("heap")
            || lowered_text.contains("allocation")
        {
            insights.push(Insight {
                kind: InsightKind::MemoryPressure,
                message: "Memory-related wording in the error suggests checking for \
                          unbounded collections or missing resource cleanup."
                    .to_string(),
                confidence: 0.6,
            });
        }

        let floor = self.config.analysis.insight_confidence_floor;
        insights.retain(|i| i.confidence >= floor);
        insights
    }
}

fn keyword_fallback_category(lowered: &str) -> ErrorCategory {
    if lowered.contains("syntax") || lowered.contains("unexpected token") || lowered.contains("parse error") {
        ErrorCategory::Syntax
    } else if lowered.contains("import") || lowered.contains("module") {
        ErrorCategory::Import
    } else if lowered.contains("type") {
        ErrorCategory::Type
    } else if lowered.contains("memory") || lowered.contains("heap") {
        ErrorCategory::Memory
    } else if lowered.contains("permission") || lowered.contains("denied") {
        ErrorCategory::Security
    } else if lowered.contains("timeout") || lowered.contains("connection") || lowered.contains("network") {
        ErrorCategory::Network
    } else if lowered.contains("config") {
        ErrorCategory::Configuration
    } else {
        ErrorCategory::Runtime
    }
}

fn derive_severity(
    best: Option<&PatternMatchResult>,
    lowered: &str,
    context: &ErrorContext,
) -> Severity {
    let mut severity = best.map(|m| m.severity).unwrap_or(Severity::Medium);

    if context.execution_context.as_deref() == Some("production") {
        severity = severity.escalate();
    }
    if SECURITY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        severity = Severity::Critical;
    }
    if BLOCKING_KEYWORDS.iter().any(|k| lowered.contains(k)) && severity < Severity::High {
        severity = Severity::High;
    }
    severity
}

/// Weighted mean of matched confidences (weights are the confidences
/// themselves), or a fixed low default when nothing matched.
fn weighted_confidence(matches: &[PatternMatchResult]) -> f64 {
    if matches.is_empty() {
        return 0.25;
    }
    let weight_sum: f64 = matches.iter().map(|m| m.confidence).sum();
    if weight_sum == 0.0 {
        return 0.25;
    }
    let weighted: f64 = matches.iter().map(|m| m.confidence * m.confidence).sum();
    (weighted / weight_sum).min(1.0)
}

fn derive_root_cause(best_cause: Option<String>, error_text: &str) -> String {
    // the best pattern's first documented cause wins outright
    if let Some(cause) = best_cause {
        return cause;
    }

    // ordered text heuristics, then a generic fallback
    let lowered = error_text.to_lowercase();
    if lowered.contains("of undefined") || lowered.contains("of null") {
        return "A property is read from an object that is undefined or null at that point."
            .to_string();
    }
    if lowered.contains("no module named") || lowered.contains("cannot find module") {
        return "A required module is missing from the environment or the import path is wrong."
            .to_string();
    }
    if lowered.contains("syntax") {
        return "The source fails to parse; the mistake is usually at or just before the reported location.".to_string();
    }
    if lowered.contains("is not assignable") || lowered.contains("type mismatch") {
        return "A value's type does not match what the receiving code declares.".to_string();
    }
    "Root cause requires manual investigation; no known pattern explains this error.".to_string()
}

fn affected_components(context: &ErrorContext) -> Vec<String> {
    let mut components = Vec::new();
    if let Some(file) = &context.file_path {
        components.push(file.clone());
    }
    if let Some(function) = &context.function_name {
        components.push(function.clone());
    }
    if let Some(project) = &context.project_context {
        components.push(project.clone());
    }
    components
}

fn contextual_factors(context: &ErrorContext) -> Vec<ContextualFactor> {
    let mut factors = Vec::new();
    if let Some(language) = context.resolved_language() {
        factors.push(ContextualFactor {
            name: "language".to_string(),
            value: language.as_str().to_string(),
            impact: ImpactLevel::Low,
        });
    }
    if let Some(env) = &context.execution_context {
        factors.push(ContextualFactor {
            name: "environment".to_string(),
            value: env.clone(),
            impact: if env == "production" {
                ImpactLevel::High
            } else {
                ImpactLevel::Medium
            },
        });
    }
    if let Some(framework) = &context.framework {
        factors.push(ContextualFactor {
            name: "framework".to_string(),
            value: framework.clone(),
            impact: ImpactLevel::Medium,
        });
    }
    if let Some(ext) = context
        .file_path
        .as_deref()
        .and_then(|p| std::path::Path::new(p).extension())
        .and_then(|e| e.to_str())
    {
        factors.push(ContextualFactor {
            name: "file_extension".to_string(),
            value: ext.to_string(),
            impact: ImpactLevel::Low,
        });
    }
    factors
}
