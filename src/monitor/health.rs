use crate::config::HealthConfig;
use sysinfo::{CpuExt, System, SystemExt};

#[derive(Debug, Clone)]
pub struct HealthBreach {
    pub resource: String,
    pub usage_percent: f32,
    pub threshold_percent: f32,
}

impl HealthBreach {
    pub fn describe(&self) -> String {
        format!(
            "{} usage at {:.1}% (threshold {:.1}%)",
            self.resource, self.usage_percent, self.threshold_percent
        )
    }
}

/// Samples host memory and CPU pressure against configured thresholds.
pub struct HealthChecker {
    system: System,
    config: HealthConfig,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            system: System::new(),
            config,
        }
    }

    pub fn check(&mut self) -> Vec<HealthBreach> {
        self.system.refresh_memory();
        self.system.refresh_cpu();

        let mut breaches = Vec::new();

        let total = self.system.total_memory();
        if total > 0 {
            let memory_percent = (self.system.used_memory() as f32 / total as f32) * 100.0;
            if memory_percent >= self.config.memory_percent_threshold {
                breaches.push(HealthBreach {
                    resource: "memory".to_string(),
                    usage_percent: memory_percent,
                    threshold_percent: self.config.memory_percent_threshold,
                });
            }
        }

        let cpu_percent = self.system.global_cpu_info().cpu_usage();
        if cpu_percent >= self.config.cpu_percent_threshold {
            breaches.push(HealthBreach {
                resource: "cpu".to_string(),
                usage_percent: cpu_percent,
                threshold_percent: self.config.cpu_percent_threshold,
            });
        }

        breaches
    }
}
