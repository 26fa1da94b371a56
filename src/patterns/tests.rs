use super::*;
use crate::config::PatternConfig;

fn matcher() -> PatternMatcher {
    PatternMatcher::new(&PatternConfig::default())
}

#[test]
fn test_js_undefined_property_matches() {
    let m = matcher();
    let results = m.match_error(
        "Cannot read property 'id' of undefined",
        Some(Language::JavaScript),
    );

    assert!(!results.is_empty());
    let best = &results[0];
    assert_eq!(best.pattern_id, "js-undefined-property");
    assert_eq!(best.category, ErrorCategory::Runtime);
    assert!(best.severity >= Severity::High);
    assert!(best.captures.contains(&"id".to_string()));
}

#[test]
fn test_python_module_not_found_confidence() {
    let m = matcher();
    let results = m.match_error(
        "ModuleNotFoundError: No module named 'requests'",
        Some(Language::Python),
    );

    let best = &results[0];
    assert_eq!(best.pattern_id, "py-module-not-found");
    assert_eq!(best.category, ErrorCategory::Import);
    assert!(best.confidence >= 0.85, "confidence was {}", best.confidence);
    assert_eq!(best.captures[0], "requests");
}

#[test]
fn test_language_filter_skips_foreign_patterns() {
    let m = matcher();
    let results = m.match_error(
        "java.lang.NullPointerException",
        Some(Language::Python),
    );
    assert!(results.iter().all(|r| r.pattern_id != "java-npe"));
}

#[test]
fn test_generic_patterns_apply_to_any_language() {
    let m = matcher();
    let results = m.match_error(
        "RangeError: Maximum call stack size exceeded",
        Some(Language::JavaScript),
    );
    assert!(results.iter().any(|r| r.pattern_id == "generic-stack-overflow"));
    assert!(results
        .iter()
        .find(|r| r.pattern_id == "generic-stack-overflow")
        .map(|r| r.severity == Severity::Critical)
        .unwrap_or(false));
}

#[test]
fn test_results_sorted_by_confidence() {
    let m = matcher();
    let results = m.match_error(
        "Cannot read property 'name' of undefined",
        Some(Language::JavaScript),
    );
    for pair in results.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
}

#[test]
fn test_threshold_filters_low_confidence() {
    let mut m = matcher();
    m.set_confidence_threshold(0.99);
    let results = m.match_error("KeyError: 'foo'", Some(Language::Python));
    assert!(results.iter().all(|r| r.confidence >= 0.99));
}

#[test]
fn test_invalid_custom_pattern_rejected() {
    let mut m = matcher();

    let no_rules = ErrorPattern {
        id: "custom-empty".to_string(),
        name: "empty".to_string(),
        category: ErrorCategory::Runtime,
        language: Language::Generic,
        rules: vec![],
        common_causes: vec![],
        severity: Severity::Low,
        base_confidence: 0.5,
        suggestion_hints: vec![],
        active: true,
        version: 1,
    };
    assert!(m.add_custom_pattern(no_rules).is_err());

    let bad_regex = ErrorPattern {
        id: "custom-bad-regex".to_string(),
        name: "bad regex".to_string(),
        category: ErrorCategory::Runtime,
        language: Language::Generic,
        rules: vec![PatternRule::regex(r"([unclosed", 1.0)],
        common_causes: vec![],
        severity: Severity::Low,
        base_confidence: 0.5,
        suggestion_hints: vec![],
        active: true,
        version: 1,
    };
    assert!(m.add_custom_pattern(bad_regex).is_err());
    assert!(m.get_pattern("custom-bad-regex").is_none());
}

#[test]
fn test_add_and_remove_custom_pattern() {
    let mut m = matcher();
    let custom = ErrorPattern {
        id: "custom-db-deadlock".to_string(),
        name: "Database deadlock".to_string(),
        category: ErrorCategory::Runtime,
        language: Language::Generic,
        rules: vec![PatternRule::substring("deadlock detected", 1.0)],
        common_causes: vec!["Two transactions locking rows in opposite order".to_string()],
        severity: Severity::High,
        base_confidence: 0.8,
        suggestion_hints: vec![],
        active: true,
        version: 1,
    };

    m.add_custom_pattern(custom).unwrap();
    let results = m.match_error("ERROR: deadlock detected", None);
    assert!(results.iter().any(|r| r.pattern_id == "custom-db-deadlock"));

    assert!(m.remove_pattern("custom-db-deadlock"));
    let results = m.match_error("ERROR: deadlock detected", None);
    assert!(results.iter().all(|r| r.pattern_id != "custom-db-deadlock"));
}

#[test]
fn test_learn_adjusts_effectiveness() {
    let mut m = matcher();
    let results = m.match_error(
        "Cannot read property 'id' of undefined",
        Some(Language::JavaScript),
    );
    let feedback = MatchFeedback {
        correct_pattern_id: Some("js-undefined-property".to_string()),
        incorrect_pattern_ids: vec![],
        actual_cause: None,
    };
    m.learn("Cannot read property 'id' of undefined", &results, feedback)
        .unwrap();
    assert_eq!(m.training_len(), 1);
}

#[test]
fn test_learn_rejects_unknown_correct_pattern() {
    let mut m = matcher();
    let feedback = MatchFeedback {
        correct_pattern_id: Some("no-such-pattern".to_string()),
        incorrect_pattern_ids: vec![],
        actual_cause: None,
    };
    assert!(m.learn("some error", &[], feedback).is_err());
}

#[test]
fn test_learn_synthesizes_pattern_from_unmatched_error() {
    let mut m = matcher();
    let text = "FATAL: widget 42 failed to reticulate spline 'alpha'";
    let before = m.pattern_count();

    let feedback = MatchFeedback {
        correct_pattern_id: None,
        incorrect_pattern_ids: vec![],
        actual_cause: Some("spline reticulation requires calibrated widgets".to_string()),
    };
    m.learn(text, &[], feedback).unwrap();
    assert_eq!(m.pattern_count(), before + 1);

    // the generalized pattern matches a variant with different literals
    let results = m.match_error(
        "FATAL: widget 7 failed to reticulate spline 'beta'",
        None,
    );
    assert!(results.iter().any(|r| r.pattern_id.starts_with("learned-")));
}

#[test]
fn test_new_pattern_visible_for_previously_cached_text() {
    let mut m = matcher();
    let text = "ERROR: deadlock detected while committing";

    // prime the cache before the pattern exists
    let results = m.match_error(text, None);
    assert!(results.iter().all(|r| r.pattern_id != "custom-db-deadlock"));

    let custom = ErrorPattern {
        id: "custom-db-deadlock".to_string(),
        name: "Database deadlock".to_string(),
        category: ErrorCategory::Runtime,
        language: Language::Generic,
        rules: vec![PatternRule::substring("deadlock detected", 1.0)],
        common_causes: vec![],
        severity: Severity::High,
        base_confidence: 0.8,
        suggestion_hints: vec![],
        active: true,
        version: 1,
    };
    m.add_custom_pattern(custom).unwrap();

    let results = m.match_error(text, None);
    assert!(results.iter().any(|r| r.pattern_id == "custom-db-deadlock"));
}

#[test]
fn test_match_cache_returns_same_results() {
    let m = matcher();
    let a = m.match_error("KeyError: 'session'", Some(Language::Python));
    let b = m.match_error("KeyError: 'session'", Some(Language::Python));
    assert_eq!(a.len(), b.len());
    if !a.is_empty() {
        assert_eq!(a[0].pattern_id, b[0].pattern_id);
        assert_eq!(a[0].confidence, b[0].confidence);
    }
}
