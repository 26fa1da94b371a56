use super::ErrorEvent;
use crate::config::MonitorConfig;
use chrono::Duration;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleKind {
    RapidFire,
    ErrorSpike,
    CascadingFailure,
    MemoryLeak,
    InfiniteLoop,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::RapidFire => "rapidFireErrors",
            RuleKind::ErrorSpike => "errorSpike",
            RuleKind::CascadingFailure => "cascadingFailure",
            RuleKind::MemoryLeak => "memoryLeak",
            RuleKind::InfiniteLoop => "infiniteLoop",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleHit {
    pub kind: RuleKind,
    pub evidence: String,
    pub count: usize,
    pub application_id: Option<String>,
}

const MEMORY_KEYWORDS: &[&str] = &["memory", "heap", "allocation", "oom"];

/// Evaluates the fixed windowed rule table against the incoming event and
/// the current history. History is time-ordered, oldest first, and already
/// includes the incoming event.
pub fn evaluate(
    events: &VecDeque<ErrorEvent>,
    incoming: &ErrorEvent,
    config: &MonitorConfig,
) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    let now = incoming.timestamp;

    // rapid-fire: N errors from one application in a short window
    let rapid_cutoff = now - Duration::seconds(config.rapid_fire_window_secs);
    let rapid_count = events
        .iter()
        .filter(|e| e.application_id == incoming.application_id && e.timestamp >= rapid_cutoff)
        .count();
    if rapid_count >= config.rapid_fire_threshold {
        hits.push(RuleHit {
            kind: RuleKind::RapidFire,
            evidence: format!(
                "{} errors from '{}' within {}s",
                rapid_count, incoming.application_id, config.rapid_fire_window_secs
            ),
            count: rapid_count,
            application_id: Some(incoming.application_id.clone()),
        });
    }

    // spike: recent 1-minute rate well above the trailing baseline
    let minute_ago = now - Duration::seconds(60);
    let baseline_start = now - Duration::seconds(600);
    let recent = events.iter().filter(|e| e.timestamp >= minute_ago).count();
    let baseline = events
        .iter()
        .filter(|e| e.timestamp >= baseline_start && e.timestamp < minute_ago)
        .count();
    if baseline > 0 {
        let baseline_per_minute = baseline as f64 / 9.0;
        if recent >= 5 && recent as f64 >= baseline_per_minute * config.spike_multiplier {
            hits.push(RuleHit {
                kind: RuleKind::ErrorSpike,
                evidence: format!(
                    "{} errors in the last minute vs a baseline of {:.1}/min",
                    recent, baseline_per_minute
                ),
                count: recent,
                application_id: None,
            });
        }
    }

    // cascading failure: errors touching several applications in a window
    let cascade_cutoff = now - Duration::seconds(config.cascade_window_secs);
    let apps: HashSet<&str> = events
        .iter()
        .filter(|e| e.timestamp >= cascade_cutoff)
        .map(|e| e.application_id.as_str())
        .collect();
    if apps.len() >= config.cascade_app_threshold {
        hits.push(RuleHit {
            kind: RuleKind::CascadingFailure,
            evidence: format!(
                "errors across {} applications within {}s",
                apps.len(),
                config.cascade_window_secs
            ),
            count: apps.len(),
            application_id: None,
        });
    }

    // memory-leak indicator: repeated memory wording in a window
    let memory_cutoff = now - Duration::seconds(config.memory_window_secs);
    let memory_count = events
        .iter()
        .filter(|e| e.timestamp >= memory_cutoff)
        .filter(|e| {
            let lowered = e.message.to_lowercase();
            MEMORY_KEYWORDS.iter().any(|k| lowered.contains(k))
        })
        .count();
    if memory_count >= config.memory_keyword_threshold {
        hits.push(RuleHit {
            kind: RuleKind::MemoryLeak,
            evidence: format!(
                "{} memory-related errors within {}s",
                memory_count, config.memory_window_secs
            ),
            count: memory_count,
            application_id: None,
        });
    }

    // infinite-loop indicator: textually identical errors from one app
    let identical_cutoff = now - Duration::seconds(config.identical_window_secs);
    let identical_count = events
        .iter()
        .filter(|e| {
            e.application_id == incoming.application_id
                && e.timestamp >= identical_cutoff
                && e.message == incoming.message
        })
        .count();
    if identical_count >= config.identical_error_threshold {
        hits.push(RuleHit {
            kind: RuleKind::InfiniteLoop,
            evidence: format!(
                "identical error repeated {} times within {}s: {}",
                identical_count,
                config.identical_window_secs,
                truncate(&incoming.message, 80)
            ),
            count: identical_count,
            application_id: Some(incoming.application_id.clone()),
        });
    }

    hits
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
