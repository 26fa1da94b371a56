use crate::analysis::{ErrorAnalysis, ErrorAnalysisEngine, ErrorContext};
use crate::config::{HealthConfig, MonitorConfig};
use crate::patterns::{Language, Severity};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub mod health;
pub mod rules;
#[cfg(test)]
mod tests;

pub use health::{HealthBreach, HealthChecker};
pub use rules::{RuleHit, RuleKind};

const STATUS_WINDOW_SECS: i64 = 300;
const RECENT_ALERT_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// Status from the error count over the trailing five minutes.
    fn from_recent_errors(count: usize) -> HealthStatus {
        match count {
            0 => HealthStatus::Healthy,
            1..=4 => HealthStatus::Warning,
            5..=9 => HealthStatus::Degraded,
            _ => HealthStatus::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoredApplication {
    pub id: String,
    pub name: String,
    pub language: Language,
    pub log_sources: Vec<String>,
    pub status: HealthStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

/// One observed error, as reported by an application under watch.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub application_id: String,
    pub message: String,
    pub stack: Option<String>,
    pub severity: Severity,
    pub context: HashMap<String, String>,
    pub analysis: Option<ErrorAnalysis>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordErrorRequest {
    pub application_id: String,
    pub message: String,
    pub stack: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub severity: Option<Severity>,
    pub context: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Error,
    Pattern,
    SystemHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringAlert {
    pub id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub application_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Payload delivered to subscribers.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Error(Box<ErrorEvent>),
    Alert(Box<MonitoringAlert>),
}

/// Caller-defined threshold rule, evaluated every monitoring cycle: fires
/// when at least `threshold` events at `min_severity` or above arrive within
/// the trailing window. Refires only after a full window has passed.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub min_severity: Severity,
    pub threshold: usize,
    pub window_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStats {
    pub application_count: usize,
    pub total_events: usize,
    pub events_by_severity: HashMap<String, u64>,
    pub events_by_application: HashMap<String, u64>,
    pub errors_last_minute: usize,
    pub alerts_raised: u64,
    pub running: bool,
}

type Callback = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

struct MonitorState {
    applications: HashMap<String, MonitoredApplication>,
    events: VecDeque<ErrorEvent>,
    recent_alerts: VecDeque<MonitoringAlert>,
    severity_counts: HashMap<Severity, u64>,
    application_counts: HashMap<String, u64>,
    subscribers: HashMap<String, Vec<(u64, Callback)>>,
    alert_rules: Vec<AlertRule>,
    rule_last_fired: HashMap<String, DateTime<Utc>>,
    next_subscription_id: u64,
    next_event_id: u64,
    next_alert_id: u64,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            applications: HashMap::new(),
            events: VecDeque::new(),
            recent_alerts: VecDeque::new(),
            severity_counts: HashMap::new(),
            application_counts: HashMap::new(),
            subscribers: HashMap::new(),
            alert_rules: Vec::new(),
            rule_last_fired: HashMap::new(),
            next_subscription_id: 1,
            next_event_id: 1,
            next_alert_id: 1,
        }
    }

    fn callbacks_for(&self, event_type: &str) -> Vec<Callback> {
        self.subscribers
            .get(event_type)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }

    fn prune_events(&mut self, now: DateTime<Utc>, max_age_hours: i64, max_events: usize) {
        let cutoff = now - ChronoDuration::hours(max_age_hours);
        while let Some(front) = self.events.front() {
            if front.timestamp < cutoff {
                self.events.pop_front();
            } else {
                break;
            }
        }
        while self.events.len() > max_events {
            self.events.pop_front();
        }
    }

    fn record_alert(&mut self, alert: MonitoringAlert) {
        self.recent_alerts.push_back(alert);
        while self.recent_alerts.len() > RECENT_ALERT_CAP {
            self.recent_alerts.pop_front();
        }
    }
}

struct Inner {
    state: Mutex<MonitorState>,
    engine: Mutex<ErrorAnalysisEngine>,
    health: Mutex<HealthChecker>,
    config: MonitorConfig,
    alerts_raised: AtomicU64,
}

/// Watches a set of applications, keeps a bounded error history, raises
/// pattern and health alerts, and fans events out to subscribers.
pub struct RealTimeMonitor {
    inner: Arc<Inner>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl RealTimeMonitor {
    pub fn new(
        config: MonitorConfig,
        health_config: HealthConfig,
        engine: ErrorAnalysisEngine,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MonitorState::new()),
                engine: Mutex::new(engine),
                health: Mutex::new(HealthChecker::new(health_config)),
                config,
                alerts_raised: AtomicU64::new(0),
            }),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    pub async fn add_application(
        &self,
        id: &str,
        name: &str,
        language: Language,
        log_sources: Vec<String>,
    ) {
        let mut state = self.inner.state.lock().await;
        state.applications.insert(
            id.to_string(),
            MonitoredApplication {
                id: id.to_string(),
                name: name.to_string(),
                language,
                log_sources,
                status: HealthStatus::Healthy,
                last_seen: None,
            },
        );
        tracing::info!("watching application '{}' ({})", name, id);
    }

    /// Removes the application registration. Its recorded events stay in
    /// history until they age out.
    pub async fn remove_application(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        state.applications.remove(id).is_some()
    }

    pub async fn get_applications(&self) -> Vec<MonitoredApplication> {
        let state = self.inner.state.lock().await;
        let mut apps: Vec<_> = state.applications.values().cloned().collect();
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        apps
    }

    /// Records one error occurrence: analyzes it best-effort, appends it to
    /// the bounded history, evaluates the pattern rules, and notifies
    /// subscribers. Analysis failure degrades to an unanalyzed event.
    pub async fn record_error(&self, request: RecordErrorRequest) -> ErrorEvent {
        let timestamp = request.timestamp.unwrap_or_else(Utc::now);

        // engine lock is never held together with the state lock
        let analysis = {
            let language = {
                let state = self.inner.state.lock().await;
                state
                    .applications
                    .get(&request.application_id)
                    .map(|a| a.language)
            };
            let mut engine = self.inner.engine.lock().await;
            let context = ErrorContext {
                language,
                ..Default::default()
            };
            match engine.analyze(&request.message, &context) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    tracing::warn!(
                        "analysis failed for event from '{}': {}",
                        request.application_id,
                        e
                    );
                    None
                }
            }
        };

        let severity = request
            .severity
            .or_else(|| analysis.as_ref().map(|a| a.severity))
            .unwrap_or(Severity::Medium);

        let mut notifications: Vec<(Callback, MonitorEvent)> = Vec::new();
        let event = {
            let mut state = self.inner.state.lock().await;
            if !state.applications.contains_key(&request.application_id) {
                tracing::warn!(
                    "error reported for unregistered application '{}'",
                    request.application_id
                );
            }

            let event = ErrorEvent {
                id: format!("ev-{}", state.next_event_id),
                timestamp,
                application_id: request.application_id.clone(),
                message: request.message.clone(),
                stack: request.stack.clone(),
                severity,
                context: request.context.clone(),
                analysis,
            };
            state.next_event_id += 1;

            if let Some(app) = state.applications.get_mut(&request.application_id) {
                app.last_seen = Some(timestamp);
            }
            *state.severity_counts.entry(severity).or_insert(0) += 1;
            *state
                .application_counts
                .entry(request.application_id.clone())
                .or_insert(0) += 1;

            state.events.push_back(event.clone());
            state.prune_events(
                timestamp,
                self.inner.config.event_max_age_hours,
                self.inner.config.max_events,
            );

            let hits = rules::evaluate(&state.events, &event, &self.inner.config);

            let error_payload = MonitorEvent::Error(Box::new(event.clone()));
            for cb in state.callbacks_for("error") {
                notifications.push((cb, error_payload.clone()));
            }

            for hit in hits {
                let alert = self.build_rule_alert(&mut state, &hit, severity, timestamp);
                tracing::warn!("pattern alert {}: {}", hit.kind.as_str(), alert.description);
                let payload = MonitorEvent::Alert(Box::new(alert.clone()));
                for cb in state.callbacks_for("pattern") {
                    notifications.push((cb, payload.clone()));
                }
                state.record_alert(alert);
            }

            event
        };

        dispatch(notifications);
        event
    }

    fn build_rule_alert(
        &self,
        state: &mut MonitorState,
        hit: &RuleHit,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> MonitoringAlert {
        let id = format!("alert-{}", state.next_alert_id);
        state.next_alert_id += 1;
        self.inner.alerts_raised.fetch_add(1, Ordering::Relaxed);

        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), hit.kind.as_str().to_string());
        metadata.insert("count".to_string(), hit.count.to_string());

        MonitoringAlert {
            id,
            alert_type: AlertType::Pattern,
            severity: severity.max(Severity::High),
            title: format!("Error pattern detected: {}", hit.kind.as_str()),
            description: hit.evidence.clone(),
            timestamp,
            application_id: hit.application_id.clone(),
            metadata,
        }
    }

    /// Registers a callback for one event type ("error", "pattern", or
    /// "alert"). A panicking callback is absorbed and logged; it never
    /// disrupts recording.
    pub async fn subscribe<F>(&self, event_type: &str, callback: F) -> u64
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock().await;
        let id = state.next_subscription_id;
        state.next_subscription_id += 1;
        state
            .subscribers
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    pub async fn add_alert_rule(&self, rule: AlertRule) {
        let mut state = self.inner.state.lock().await;
        state.alert_rules.retain(|r| r.id != rule.id);
        state.alert_rules.push(rule);
    }

    pub async fn remove_alert_rule(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let before = state.alert_rules.len();
        state.alert_rules.retain(|r| r.id != id);
        state.rule_last_fired.remove(id);
        state.alert_rules.len() != before
    }

    pub async fn unsubscribe(&self, subscription_id: u64) -> bool {
        let mut state = self.inner.state.lock().await;
        let mut removed = false;
        for subs in state.subscribers.values_mut() {
            let before = subs.len();
            subs.retain(|(id, _)| *id != subscription_id);
            removed |= subs.len() != before;
        }
        removed
    }

    /// Spawns the periodic monitoring and health cycles. Idempotent while
    /// running.
    pub fn start_monitoring(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if !tasks.is_empty() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let cycle_interval = Duration::from_secs(self.inner.config.cycle_interval_secs);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(cycle_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                run_monitoring_cycle(&inner, Utc::now()).await;
            }
        }));

        let inner = Arc::clone(&self.inner);
        let health_interval = Duration::from_secs(self.inner.config.health_interval_secs);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(health_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                run_health_cycle(&inner).await;
            }
        }));

        tracing::info!("real-time monitoring started");
    }

    /// Aborts the periodic tasks. Event history, applications, and
    /// subscriptions all stay intact.
    pub fn stop_monitoring(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
        tracing::info!("real-time monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().unwrap().is_empty()
    }

    /// Runs one status-recompute pass immediately, outside the periodic
    /// schedule.
    pub async fn run_cycle_now(&self) {
        run_monitoring_cycle(&self.inner, Utc::now()).await;
    }

    #[cfg(test)]
    pub(crate) async fn run_cycle_at(&self, now: DateTime<Utc>) {
        run_monitoring_cycle(&self.inner, now).await;
    }

    pub async fn run_health_check_now(&self) {
        run_health_cycle(&self.inner).await;
    }

    pub async fn get_application_status(&self, id: &str) -> Option<HealthStatus> {
        let state = self.inner.state.lock().await;
        state.applications.get(id).map(|a| a.status)
    }

    pub async fn get_recent_events(&self, limit: usize) -> Vec<ErrorEvent> {
        let state = self.inner.state.lock().await;
        state.events.iter().rev().take(limit).cloned().collect()
    }

    pub async fn get_recent_alerts(&self, limit: usize) -> Vec<MonitoringAlert> {
        let state = self.inner.state.lock().await;
        state
            .recent_alerts
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn get_monitoring_stats(&self) -> MonitoringStats {
        let state = self.inner.state.lock().await;
        let minute_ago = Utc::now() - ChronoDuration::seconds(60);
        MonitoringStats {
            application_count: state.applications.len(),
            total_events: state.events.len(),
            events_by_severity: state
                .severity_counts
                .iter()
                .map(|(s, n)| (s.as_str().to_string(), *n))
                .collect(),
            events_by_application: state.application_counts.clone(),
            errors_last_minute: state
                .events
                .iter()
                .rev()
                .take_while(|e| e.timestamp >= minute_ago)
                .count(),
            alerts_raised: self.inner.alerts_raised.load(Ordering::Relaxed),
            running: self.is_running(),
        }
    }
}

impl Drop for RealTimeMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

/// Recomputes application health from the trailing five minutes of events,
/// evaluates caller-defined alert rules, and prunes aged-out history. Status
/// transitions are logged, not alerted.
async fn run_monitoring_cycle(inner: &Inner, now: DateTime<Utc>) {
    let mut notifications: Vec<(Callback, MonitorEvent)> = Vec::new();
    {
        let mut state = inner.state.lock().await;
        state.prune_events(now, inner.config.event_max_age_hours, inner.config.max_events);

        let window_start = now - ChronoDuration::seconds(STATUS_WINDOW_SECS);
        let mut recent_by_app: HashMap<String, usize> = HashMap::new();
        for event in state.events.iter().rev() {
            if event.timestamp < window_start {
                break;
            }
            *recent_by_app.entry(event.application_id.clone()).or_insert(0) += 1;
        }

        for app in state.applications.values_mut() {
            let count = recent_by_app.get(&app.id).copied().unwrap_or(0);
            let status = HealthStatus::from_recent_errors(count);
            if status != app.status {
                tracing::info!(
                    "application '{}' status: {} -> {} ({} errors in {}s)",
                    app.id,
                    app.status.as_str(),
                    status.as_str(),
                    count,
                    STATUS_WINDOW_SECS
                );
                app.status = status;
            }
        }

        evaluate_alert_rules(inner, &mut state, now, &mut notifications);
    }
    dispatch(notifications);

    // trend pass: engine lock only, never nested inside the state lock
    let engine = inner.engine.lock().await;
    if let Ok(trends) = engine.get_error_trends() {
        let rising = trends
            .iter()
            .filter(|t| t.direction == crate::analysis::TrendDirection::Increasing)
            .count();
        if rising > 0 {
            tracing::info!("{} error signature(s) trending upward", rising);
        }
    }
}

fn evaluate_alert_rules(
    inner: &Inner,
    state: &mut MonitorState,
    now: DateTime<Utc>,
    notifications: &mut Vec<(Callback, MonitorEvent)>,
) {
    let rules = state.alert_rules.clone();
    for rule in rules {
        // refiring is suppressed until a full window has elapsed
        if let Some(fired) = state.rule_last_fired.get(&rule.id) {
            if now - *fired < ChronoDuration::seconds(rule.window_secs) {
                continue;
            }
        }

        let cutoff = now - ChronoDuration::seconds(rule.window_secs);
        let count = state
            .events
            .iter()
            .filter(|e| e.timestamp >= cutoff && e.severity >= rule.min_severity)
            .count();
        if count < rule.threshold {
            continue;
        }

        let id = format!("alert-{}", state.next_alert_id);
        state.next_alert_id += 1;
        inner.alerts_raised.fetch_add(1, Ordering::Relaxed);
        state.rule_last_fired.insert(rule.id.clone(), now);

        let mut metadata = HashMap::new();
        metadata.insert("rule".to_string(), rule.id.clone());
        metadata.insert("count".to_string(), count.to_string());

        let alert = MonitoringAlert {
            id,
            alert_type: AlertType::Error,
            severity: Severity::High,
            title: rule.name.clone(),
            description: format!(
                "{} ({} qualifying errors within {}s)",
                rule.description, count, rule.window_secs
            ),
            timestamp: now,
            application_id: None,
            metadata,
        };
        tracing::warn!("alert rule '{}' fired: {}", rule.id, alert.description);

        let payload = MonitorEvent::Alert(Box::new(alert.clone()));
        for cb in state.callbacks_for("alert") {
            notifications.push((cb, payload.clone()));
        }
        state.record_alert(alert);
    }
}

/// Samples host resources and raises system-health alerts for breaches.
async fn run_health_cycle(inner: &Inner) {
    let breaches = {
        let mut checker = inner.health.lock().await;
        checker.check()
    };
    if breaches.is_empty() {
        return;
    }

    let now = Utc::now();
    let mut notifications: Vec<(Callback, MonitorEvent)> = Vec::new();
    {
        let mut state = inner.state.lock().await;
        for breach in breaches {
            let id = format!("alert-{}", state.next_alert_id);
            state.next_alert_id += 1;
            inner.alerts_raised.fetch_add(1, Ordering::Relaxed);

            let mut metadata = HashMap::new();
            metadata.insert("resource".to_string(), breach.resource.clone());
            metadata.insert(
                "usage_percent".to_string(),
                format!("{:.1}", breach.usage_percent),
            );

            let alert = MonitoringAlert {
                id,
                alert_type: AlertType::SystemHealth,
                severity: Severity::High,
                title: format!("System {} pressure", breach.resource),
                description: breach.describe(),
                timestamp: now,
                application_id: None,
                metadata,
            };
            tracing::warn!("health alert: {}", alert.description);

            let payload = MonitorEvent::Alert(Box::new(alert.clone()));
            for cb in state.callbacks_for("alert") {
                notifications.push((cb, payload.clone()));
            }
            state.record_alert(alert);
        }
    }
    dispatch(notifications);
}

/// Invokes callbacks outside any lock. A panic inside a subscriber is
/// contained to that subscriber.
fn dispatch(notifications: Vec<(Callback, MonitorEvent)>) {
    for (callback, event) in notifications {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
        if result.is_err() {
            tracing::warn!("subscriber callback panicked; continuing");
        }
    }
}
