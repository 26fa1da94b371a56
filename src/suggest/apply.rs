use super::{FixPayload, FixSuggestion};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::{Duration, Instant};

/// Host-provided write capability. The engine never touches the filesystem
/// directly in dry-run mode.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read(&self, path: &Path) -> Result<String>;
    async fn write(&self, path: &Path, content: &str) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Host-provided process-execution capability.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

pub struct HostFileSystem;

#[async_trait]
impl FileSystem for HostFileSystem {
    async fn read(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        Ok(tokio::fs::write(path, content).await?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct HostCommandRunner;

#[async_trait]
impl CommandRunner for HostCommandRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub backup: bool,
}

#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub success: bool,
    pub changes: Vec<String>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Dispatches a suggestion to one of four appliers. Applier failures surface
/// as a failure result, never a crash.
pub struct FixApplier {
    fs: Box<dyn FileSystem>,
    runner: Box<dyn CommandRunner>,
}

impl FixApplier {
    pub fn new(fs: Box<dyn FileSystem>, runner: Box<dyn CommandRunner>) -> Self {
        Self { fs, runner }
    }

    pub fn host() -> Self {
        Self::new(Box::new(HostFileSystem), Box::new(HostCommandRunner))
    }

    pub async fn apply(&self, suggestion: &FixSuggestion, options: ApplyOptions) -> ApplyResult {
        let started = Instant::now();
        let outcome = match &suggestion.payload {
            FixPayload::Code { template, target_file } => {
                self.apply_code(template, target_file.as_deref(), options).await
            }
            FixPayload::Command { command } => self.apply_command(command, options).await,
            FixPayload::ConfigChange { file, setting, value } => {
                self.apply_config(file, setting, value, options).await
            }
            FixPayload::Dependency { name, version, .. } => {
                self.apply_dependency(name, version.as_deref(), options)
            }
        };

        match outcome {
            Ok(changes) => ApplyResult {
                success: true,
                changes,
                error: None,
                elapsed: started.elapsed(),
            },
            Err(e) => {
                tracing::warn!("fix '{}' failed to apply: {}", suggestion.id, e);
                ApplyResult {
                    success: false,
                    changes: Vec::new(),
                    error: Some(e.to_string()),
                    elapsed: started.elapsed(),
                }
            }
        }
    }

    async fn apply_code(
        &self,
        template: &str,
        target_file: Option<&str>,
        options: ApplyOptions,
    ) -> Result<Vec<String>> {
        let Some(file) = target_file else {
            // no target: the fix is advisory code text only
            return Ok(vec![format!("suggested code:\n{}", template)]);
        };
        let path = Path::new(file);

        if options.dry_run {
            tracing::info!("dry run: would append suggested code to {}", file);
            return Ok(vec![format!("would modify {}", file)]);
        }

        if !self.fs.exists(path) {
            return Err(anyhow!("target file '{}' does not exist", file));
        }

        let original = self.fs.read(path).await?;
        let mut changes = Vec::new();

        if options.backup {
            let backup_path = path.with_extension("bak");
            self.fs.write(&backup_path, &original).await?;
            changes.push(format!("backed up {} to {}", file, backup_path.display()));
        }

        let updated = format!("{}\n// suggested fix:\n// {}\n", original, template.replace('\n', "\n// "));
        self.fs.write(path, &updated).await?;
        changes.push(format!("annotated {} with the suggested fix", file));
        Ok(changes)
    }

    async fn apply_command(&self, command: &str, options: ApplyOptions) -> Result<Vec<String>> {
        if options.dry_run {
            tracing::info!("dry run: would execute `{}`", command);
            return Ok(vec![format!("would run: {}", command)]);
        }

        let output = self.runner.run(command).await?;
        if output.status != 0 {
            return Err(anyhow!(
                "`{}` exited with status {}: {}",
                command,
                output.status,
                output.stderr.trim()
            ));
        }
        Ok(vec![format!("ran: {}", command)])
    }

    async fn apply_config(
        &self,
        file: &str,
        setting: &str,
        value: &str,
        options: ApplyOptions,
    ) -> Result<Vec<String>> {
        if options.dry_run {
            tracing::info!("dry run: would set {}={} in {}", setting, value, file);
            return Ok(vec![format!("would set {} = {} in {}", setting, value, file)]);
        }

        let path = Path::new(file);
        if !self.fs.exists(path) {
            return Err(anyhow!("config file '{}' does not exist", file));
        }

        let original = self.fs.read(path).await?;
        let mut changes = Vec::new();
        if options.backup {
            let backup_path = path.with_extension("bak");
            self.fs.write(&backup_path, &original).await?;
            changes.push(format!("backed up {}", file));
        }

        let updated = format!("{}\n# suggested: {} = {}\n", original.trim_end(), setting, value);
        self.fs.write(path, &updated).await?;
        changes.push(format!("appended {} = {} to {}", setting, value, file));
        Ok(changes)
    }

    fn apply_dependency(
        &self,
        name: &str,
        version: Option<&str>,
        options: ApplyOptions,
    ) -> Result<Vec<String>> {
        // dependency edits are always advisory; the host owns manifests
        let rendered = match version {
            Some(v) => format!("{} {}", name, v),
            None => name.to_string(),
        };
        if options.dry_run {
            tracing::info!("dry run: would record dependency change for {}", rendered);
        }
        Ok(vec![format!(
            "add `{}` to the project manifest and reinstall",
            rendered
        )])
    }
}
