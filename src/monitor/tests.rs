use super::*;
use crate::config::Config;
use chrono::Duration as ChronoDuration;
use std::sync::Mutex as StdMutex;

fn monitor_with(config: MonitorConfig) -> RealTimeMonitor {
    let mut engine = ErrorAnalysisEngine::new(Config::default());
    engine.initialize().unwrap();
    RealTimeMonitor::new(config, HealthConfig::default(), engine)
}

fn monitor() -> RealTimeMonitor {
    monitor_with(MonitorConfig::default())
}

fn request(app: &str, message: &str) -> RecordErrorRequest {
    RecordErrorRequest {
        application_id: app.to_string(),
        message: message.to_string(),
        ..Default::default()
    }
}

async fn collect_alerts(
    monitor: &RealTimeMonitor,
    event_type: &str,
) -> Arc<StdMutex<Vec<MonitoringAlert>>> {
    let collected = Arc::new(StdMutex::new(Vec::new()));
    let sink = Arc::clone(&collected);
    monitor
        .subscribe(event_type, move |event| {
            if let MonitorEvent::Alert(alert) = event {
                sink.lock().unwrap().push((**alert).clone());
            }
        })
        .await;
    collected
}

#[tokio::test]
async fn test_rapid_fire_raises_one_alert_at_threshold() {
    let monitor = monitor();
    monitor
        .add_application("api", "api service", Language::JavaScript, vec![])
        .await;
    let alerts = collect_alerts(&monitor, "pattern").await;

    for i in 0..5 {
        monitor
            .record_error(request("api", &format!("handler {} failed", i)))
            .await;
    }

    let alerts = alerts.lock().unwrap();
    let rapid: Vec<_> = alerts
        .iter()
        .filter(|a| a.metadata.get("type").map(String::as_str) == Some("rapidFireErrors"))
        .collect();
    assert_eq!(rapid.len(), 1, "only the fifth event qualifies");
    assert_eq!(rapid[0].alert_type, AlertType::Pattern);
    assert_eq!(rapid[0].metadata.get("count").unwrap(), "5");
    assert_eq!(rapid[0].application_id.as_deref(), Some("api"));
}

#[tokio::test]
async fn test_identical_errors_raise_infinite_loop_alert() {
    let monitor = monitor();
    monitor
        .add_application("worker", "worker", Language::Python, vec![])
        .await;
    let alerts = collect_alerts(&monitor, "pattern").await;

    for _ in 0..10 {
        monitor
            .record_error(request("worker", "retry budget exhausted for job 7"))
            .await;
    }

    let alerts = alerts.lock().unwrap();
    let loops: Vec<_> = alerts
        .iter()
        .filter(|a| a.metadata.get("type").map(String::as_str) == Some("infiniteLoop"))
        .collect();
    assert_eq!(loops.len(), 1);
    assert!(loops[0].description.contains("10"));
}

#[tokio::test]
async fn test_errors_across_applications_raise_cascade_alert() {
    let monitor = monitor();
    for app in ["auth", "billing", "gateway"] {
        monitor
            .add_application(app, app, Language::Go, vec![])
            .await;
    }
    let alerts = collect_alerts(&monitor, "pattern").await;

    monitor.record_error(request("auth", "token refresh failed")).await;
    monitor.record_error(request("billing", "invoice write failed")).await;
    monitor.record_error(request("gateway", "upstream returned 502")).await;

    let alerts = alerts.lock().unwrap();
    let cascades: Vec<_> = alerts
        .iter()
        .filter(|a| a.metadata.get("type").map(String::as_str) == Some("cascadingFailure"))
        .collect();
    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].metadata.get("count").unwrap(), "3");
}

#[tokio::test]
async fn test_burst_above_baseline_raises_spike_alert() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::Generic, vec![])
        .await;
    monitor
        .add_application("db", "db", Language::Generic, vec![])
        .await;
    let alerts = collect_alerts(&monitor, "pattern").await;

    let t0 = Utc::now();
    // steady trickle, one error every 50s, all older than a minute
    for (i, offset) in [500i64, 450, 400, 350, 300, 250, 200, 150, 100]
        .into_iter()
        .enumerate()
    {
        monitor
            .record_error(RecordErrorRequest {
                application_id: "api".to_string(),
                message: format!("background sync {} failed", i),
                timestamp: Some(t0 - ChronoDuration::seconds(offset)),
                ..Default::default()
            })
            .await;
    }

    // burst spread across both applications so no single app trips rapid-fire
    for (i, app) in ["api", "db", "api", "db", "api"].iter().enumerate() {
        monitor
            .record_error(RecordErrorRequest {
                application_id: app.to_string(),
                message: format!("request {} timed out", i),
                timestamp: Some(t0),
                ..Default::default()
            })
            .await;
    }

    let alerts = alerts.lock().unwrap();
    let spikes: Vec<_> = alerts
        .iter()
        .filter(|a| a.metadata.get("type").map(String::as_str) == Some("errorSpike"))
        .collect();
    assert_eq!(spikes.len(), 1, "only the fifth burst event qualifies");
    assert_eq!(spikes[0].metadata.get("count").unwrap(), "5");
}

#[tokio::test]
async fn test_repeated_memory_wording_raises_leak_alert() {
    let monitor = monitor();
    monitor
        .add_application("cache", "cache", Language::Generic, vec![])
        .await;
    let alerts = collect_alerts(&monitor, "pattern").await;

    for message in [
        "memory usage climbing in shard 3",
        "heap segment grew past soft limit",
        "arena allocation failed for slab 9",
    ] {
        monitor.record_error(request("cache", message)).await;
    }

    let alerts = alerts.lock().unwrap();
    let leaks: Vec<_> = alerts
        .iter()
        .filter(|a| a.metadata.get("type").map(String::as_str) == Some("memoryLeak"))
        .collect();
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].metadata.get("count").unwrap(), "3");
}

#[tokio::test]
async fn test_status_goes_critical_then_reverts_when_quiet() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::Rust, vec![])
        .await;

    let t0 = Utc::now();
    for i in 0..10 {
        monitor
            .record_error(RecordErrorRequest {
                application_id: "api".to_string(),
                message: format!("request {} aborted", i),
                timestamp: Some(t0),
                ..Default::default()
            })
            .await;
    }

    monitor.run_cycle_at(t0).await;
    assert_eq!(
        monitor.get_application_status("api").await,
        Some(HealthStatus::Critical)
    );

    // a later quiet cycle finds nothing in the trailing window
    monitor.run_cycle_at(t0 + ChronoDuration::minutes(10)).await;
    assert_eq!(
        monitor.get_application_status("api").await,
        Some(HealthStatus::Healthy)
    );
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_disrupt_recording() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::JavaScript, vec![])
        .await;

    monitor
        .subscribe("error", |_event| panic!("subscriber bug"))
        .await;

    let seen = Arc::new(StdMutex::new(0usize));
    let sink = Arc::clone(&seen);
    monitor
        .subscribe("error", move |_event| {
            *sink.lock().unwrap() += 1;
        })
        .await;

    let event = monitor.record_error(request("api", "boom")).await;
    assert_eq!(event.application_id, "api");
    assert_eq!(*seen.lock().unwrap(), 1, "later subscribers still notified");

    let stats = monitor.get_monitoring_stats().await;
    assert_eq!(stats.total_events, 1);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::JavaScript, vec![])
        .await;

    let seen = Arc::new(StdMutex::new(0usize));
    let sink = Arc::clone(&seen);
    let id = monitor
        .subscribe("error", move |_event| {
            *sink.lock().unwrap() += 1;
        })
        .await;

    monitor.record_error(request("api", "first")).await;
    assert!(monitor.unsubscribe(id).await);
    monitor.record_error(request("api", "second")).await;

    assert_eq!(*seen.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_event_carries_analysis_and_derived_severity() {
    let monitor = monitor();
    monitor
        .add_application("py-svc", "py service", Language::Python, vec![])
        .await;

    let event = monitor
        .record_error(request(
            "py-svc",
            "ModuleNotFoundError: No module named 'requests'",
        ))
        .await;

    let analysis = event.analysis.expect("analysis attached");
    assert_eq!(analysis.category, crate::patterns::ErrorCategory::Import);
    assert!(event.severity >= Severity::High);
}

#[tokio::test]
async fn test_history_is_capped_at_max_events() {
    let monitor = monitor_with(MonitorConfig {
        max_events: 5,
        ..Default::default()
    });
    monitor
        .add_application("api", "api", Language::Generic, vec![])
        .await;

    for i in 0..8 {
        monitor
            .record_error(request("api", &format!("failure {}", i)))
            .await;
    }

    let stats = monitor.get_monitoring_stats().await;
    assert_eq!(stats.total_events, 5);

    let recent = monitor.get_recent_events(10).await;
    assert_eq!(recent.len(), 5);
    // newest first
    assert_eq!(recent[0].message, "failure 7");
}

#[tokio::test]
async fn test_stop_monitoring_leaves_history_intact() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::Generic, vec![])
        .await;
    for i in 0..3 {
        monitor
            .record_error(request("api", &format!("failure {}", i)))
            .await;
    }

    monitor.start_monitoring();
    assert!(monitor.is_running());
    monitor.stop_monitoring();
    assert!(!monitor.is_running());

    let stats = monitor.get_monitoring_stats().await;
    assert_eq!(stats.total_events, 3);
    assert_eq!(stats.events_by_application.get("api"), Some(&3));
}

#[tokio::test]
async fn test_custom_alert_rule_fires_once_per_window() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::Generic, vec![])
        .await;
    monitor
        .add_alert_rule(AlertRule {
            id: "high-error-volume".to_string(),
            name: "High error volume".to_string(),
            description: "Sustained error volume above the agreed budget".to_string(),
            min_severity: Severity::Low,
            threshold: 3,
            window_secs: 60,
        })
        .await;
    let alerts = collect_alerts(&monitor, "alert").await;

    let t0 = Utc::now();
    for i in 0..3 {
        monitor
            .record_error(RecordErrorRequest {
                application_id: "api".to_string(),
                message: format!("failure {}", i),
                timestamp: Some(t0),
                ..Default::default()
            })
            .await;
    }

    monitor.run_cycle_at(t0).await;
    // still inside the window: the rule must not refire
    monitor.run_cycle_at(t0 + ChronoDuration::seconds(5)).await;

    let alerts = alerts.lock().unwrap();
    let fired: Vec<_> = alerts
        .iter()
        .filter(|a| a.metadata.get("rule").map(String::as_str) == Some("high-error-volume"))
        .collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].alert_type, AlertType::Error);
}

#[tokio::test]
async fn test_remove_application_keeps_its_events() {
    let monitor = monitor();
    monitor
        .add_application("api", "api", Language::Generic, vec![])
        .await;
    monitor.record_error(request("api", "boom")).await;

    assert!(monitor.remove_application("api").await);
    assert!(!monitor.remove_application("api").await);

    let stats = monitor.get_monitoring_stats().await;
    assert_eq!(stats.application_count, 0);
    assert_eq!(stats.total_events, 1);
}
