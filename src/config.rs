use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub stacktrace: StackTraceConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub suggestions: SuggestionConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PatternConfig {
    pub confidence_threshold: f64,
    pub cache_ttl_secs: u64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StackTraceConfig {
    pub project_root: Option<PathBuf>,
    pub library_markers: Vec<String>,
    pub recursion_threshold: usize,
    pub include_source_context: bool,
    pub source_context_lines: usize,
}

impl Default for StackTraceConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            library_markers: vec![
                "node_modules".to_string(),
                "site-packages".to_string(),
                "dist-packages".to_string(),
                "vendor".to_string(),
                ".cargo/registry".to_string(),
                "rustlib".to_string(),
                ".min.js".to_string(),
                "webpack".to_string(),
                "react-dom".to_string(),
                "java.base".to_string(),
            ],
            recursion_threshold: 4,
            include_source_context: false,
            source_context_lines: 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cache_ttl_secs: u64,
    pub insight_confidence_floor: f64,
    pub similarity_floor: f64,
    pub recent_occurrence_cap: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            insight_confidence_floor: 0.4,
            similarity_floor: 0.3,
            recent_occurrence_cap: 50,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SuggestionConfig {
    pub min_confidence: f64,
    pub max_suggestions: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_suggestions: 8,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub max_events: usize,
    pub event_max_age_hours: i64,
    pub cycle_interval_secs: u64,
    pub health_interval_secs: u64,
    pub rapid_fire_threshold: usize,
    pub rapid_fire_window_secs: i64,
    pub spike_multiplier: f64,
    pub cascade_app_threshold: usize,
    pub cascade_window_secs: i64,
    pub memory_keyword_threshold: usize,
    pub memory_window_secs: i64,
    pub identical_error_threshold: usize,
    pub identical_window_secs: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_events: 1000,
            event_max_age_hours: 24,
            cycle_interval_secs: 30,
            health_interval_secs: 120,
            rapid_fire_threshold: 5,
            rapid_fire_window_secs: 30,
            spike_multiplier: 3.0,
            cascade_app_threshold: 3,
            cascade_window_secs: 60,
            memory_keyword_threshold: 3,
            memory_window_secs: 300,
            identical_error_threshold: 10,
            identical_window_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HealthConfig {
    pub memory_percent_threshold: f32,
    pub cpu_percent_threshold: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            memory_percent_threshold: 90.0,
            cpu_percent_threshold: 85.0,
        }
    }
}

impl Config {
    pub fn create_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn ensure_config_exists() -> Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path)?;
            tracing::info!("created default config at {:?}", config_path);
        }

        Self::load(&config_path)
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "faultline", "faultline")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let config = Config::default();
        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(
            parsed.patterns.confidence_threshold,
            config.patterns.confidence_threshold
        );
        assert_eq!(parsed.monitor.max_events, config.monitor.max_events);
    }

    #[test]
    fn test_partial_config_keeps_section_defaults() {
        let parsed: Config = toml::from_str("[monitor]\nmax_events = 50\n").unwrap();
        assert_eq!(parsed.monitor.max_events, 50);
        assert_eq!(parsed.patterns.cache_ttl_secs, 300);
        assert_eq!(parsed.stacktrace.recursion_threshold, 4);
    }
}
