pub mod analysis;
pub mod config;
pub mod error;
pub mod monitor;
pub mod patterns;
pub mod stacktrace;
pub mod suggest;

// Re-export commonly used types
pub use analysis::{ErrorAnalysis, ErrorAnalysisEngine, ErrorContext};
pub use config::Config;
pub use error::EngineError;
pub use monitor::{MonitoringAlert, RealTimeMonitor, RecordErrorRequest};
pub use patterns::{ErrorCategory, ErrorPattern, Language, PatternMatcher, Severity};
pub use stacktrace::{StackTraceAnalysis, StackTraceParser};
pub use suggest::{FixSuggestion, FixSuggestionEngine};
