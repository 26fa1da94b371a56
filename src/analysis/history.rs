use super::signature::ErrorSignature;
use crate::patterns::{jaccard_words, ErrorCategory, Language, Severity};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Per-signature occurrence bookkeeping. The recent ring is capped; totals
/// grow monotonically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrequencyData {
    pub signature: String,
    pub normalized_text: String,
    pub language: Language,
    pub extension: Option<String>,
    pub file_path: Option<String>,
    pub total: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub recent: VecDeque<DateTime<Utc>>,
    pub last_category: ErrorCategory,
    pub last_severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorTrend {
    pub signature: String,
    pub normalized_text: String,
    pub total: u64,
    pub last_24h: u64,
    pub last_7d: u64,
    pub last_30d: u64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedError {
    pub signature: String,
    pub normalized_text: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarError {
    pub signature: String,
    pub normalized_text: String,
    pub similarity: f64,
    pub total: u64,
}

/// Persistence capability for frequency history. The core ships an
/// in-memory no-op; durable backends are a host concern.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<ErrorFrequencyData>>;
    fn save(&self, entries: &[ErrorFrequencyData]) -> Result<()>;
}

pub struct InMemoryHistoryStore;

impl HistoryStore for InMemoryHistoryStore {
    fn load(&self) -> Result<Vec<ErrorFrequencyData>> {
        Ok(Vec::new())
    }

    fn save(&self, entries: &[ErrorFrequencyData]) -> Result<()> {
        tracing::debug!("in-memory history store: skipping save of {} entries", entries.len());
        Ok(())
    }
}

pub struct FrequencyStore {
    entries: HashMap<String, ErrorFrequencyData>,
    store: Box<dyn HistoryStore>,
    recent_cap: usize,
}

impl FrequencyStore {
    pub fn new(store: Box<dyn HistoryStore>, recent_cap: usize) -> Self {
        Self {
            entries: HashMap::new(),
            store,
            recent_cap,
        }
    }

    pub fn load(&mut self) -> Result<()> {
        for entry in self.store.load()? {
            self.entries.insert(entry.signature.clone(), entry);
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let entries: Vec<ErrorFrequencyData> = self.entries.values().cloned().collect();
        self.store.save(&entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, signature: &str) -> Option<&ErrorFrequencyData> {
        self.entries.get(signature)
    }

    /// Increments (or creates) the entry for a signature. The recent ring is
    /// trimmed on insert.
    pub fn record(
        &mut self,
        signature: &ErrorSignature,
        file_path: Option<&str>,
        category: ErrorCategory,
        severity: Severity,
        at: DateTime<Utc>,
    ) -> u64 {
        let entry = self
            .entries
            .entry(signature.hash.clone())
            .or_insert_with(|| ErrorFrequencyData {
                signature: signature.hash.clone(),
                normalized_text: signature.normalized_text.clone(),
                language: signature.language,
                extension: signature.extension.clone(),
                file_path: file_path.map(|p| p.to_string()),
                total: 0,
                first_seen: at,
                last_seen: at,
                recent: VecDeque::new(),
                last_category: category,
                last_severity: severity,
            });

        entry.total += 1;
        entry.last_seen = at;
        entry.last_category = category;
        entry.last_severity = severity;
        entry.recent.push_back(at);
        while entry.recent.len() > self.recent_cap {
            entry.recent.pop_front();
        }
        entry.total
    }

    /// Light-weight relatedness: same file, or same language with word
    /// overlap in the normalized text. No full similarity pass here.
    pub fn related(&self, signature: &ErrorSignature, file_path: Option<&str>, limit: usize) -> Vec<RelatedError> {
        let mut related = Vec::new();
        for entry in self.entries.values() {
            if entry.signature == signature.hash {
                continue;
            }
            let reason = if file_path.is_some() && entry.file_path.as_deref() == file_path {
                Some("same file".to_string())
            } else if entry.language == signature.language
                && jaccard_words(&entry.normalized_text, &signature.normalized_text) > 0.4
            {
                Some("same language, overlapping message".to_string())
            } else {
                None
            };
            if let Some(reason) = reason {
                related.push(RelatedError {
                    signature: entry.signature.clone(),
                    normalized_text: entry.normalized_text.clone(),
                    reason,
                });
                if related.len() >= limit {
                    break;
                }
            }
        }
        related
    }

    /// Composite similarity: word overlap dominates, with smaller terms for
    /// shared language and extension.
    pub fn similar(
        &self,
        signature: &ErrorSignature,
        floor: f64,
        limit: usize,
    ) -> Vec<SimilarError> {
        let mut scored: Vec<SimilarError> = self
            .entries
            .values()
            .filter(|e| e.signature != signature.hash)
            .map(|e| {
                let words = jaccard_words(&e.normalized_text, &signature.normalized_text);
                let language = if e.language == signature.language { 1.0 } else { 0.0 };
                let extension = if e.extension == signature.extension { 1.0 } else { 0.0 };
                let similarity = words * 0.7 + language * 0.2 + extension * 0.1;
                SimilarError {
                    signature: e.signature.clone(),
                    normalized_text: e.normalized_text.clone(),
                    similarity,
                    total: e.total,
                }
            })
            .filter(|s| s.similarity >= floor)
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }

    /// Classifies every signature seen at least twice over trailing
    /// 24h/7d/30d windows.
    pub fn trends(&self, now: DateTime<Utc>) -> Vec<ErrorTrend> {
        let mut trends = Vec::new();
        for entry in self.entries.values() {
            if entry.total < 2 {
                continue;
            }
            let last_24h = count_since(&entry.recent, now - Duration::hours(24));
            let last_7d = count_since(&entry.recent, now - Duration::days(7));
            let last_30d = count_since(&entry.recent, now - Duration::days(30));

            let daily_avg_over_week = last_7d as f64 / 7.0;
            let direction = if last_24h >= 2 && last_24h as f64 > daily_avg_over_week * 2.0 {
                TrendDirection::Increasing
            } else if last_24h == 0 && last_7d <= 1 {
                TrendDirection::Decreasing
            } else {
                TrendDirection::Stable
            };

            trends.push(ErrorTrend {
                signature: entry.signature.clone(),
                normalized_text: entry.normalized_text.clone(),
                total: entry.total,
                last_24h,
                last_7d,
                last_30d,
                direction,
            });
        }
        trends.sort_by(|a, b| b.last_24h.cmp(&a.last_24h));
        trends
    }
}

fn count_since(recent: &VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) -> u64 {
    recent.iter().filter(|t| **t >= cutoff).count() as u64
}
