use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use faultline::analysis::{ErrorAnalysisEngine, ErrorContext};
use faultline::config::Config;
use faultline::monitor::{MonitorEvent, RealTimeMonitor, RecordErrorRequest};
use faultline::patterns::Language;
use faultline::stacktrace::StackTraceParser;
use std::io::Read;
use tokio::io::AsyncBufReadExt;

#[derive(Parser)]
#[command(name = "faultline", version, about = "Analyze errors, parse stack traces, and watch live error streams")]
struct Cli {
    /// Verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one error message (reads stdin when no text is given)
    Analyze {
        text: Option<String>,
        /// Source language hint (javascript, python, java, rust, go, ...)
        #[arg(long)]
        language: Option<String>,
        /// File the error came from
        #[arg(long)]
        file: Option<String>,
        /// Execution context (development, production, build, ci)
        #[arg(long)]
        environment: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Parse and classify a stack trace (reads stdin when no text is given)
    Trace {
        text: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Treat stdin lines as a live error stream and raise alerts
    Monitor {
        /// Application id to attribute events to
        #[arg(long, default_value = "stdin")]
        application: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// List loaded error patterns
    Patterns {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = Config::ensure_config_exists()?;

    match cli.command {
        Command::Analyze {
            text,
            language,
            file,
            environment,
            json,
        } => analyze(config, text, language, file, environment, json),
        Command::Trace { text, language, json } => trace(config, text, language, json),
        Command::Monitor {
            application,
            language,
        } => monitor(config, application, language).await,
        Command::Patterns { json } => patterns(config, json),
    }
}

fn parse_language(name: Option<&str>) -> Result<Option<Language>> {
    match name {
        None => Ok(None),
        Some(name) => Language::parse(name)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("unknown language '{}'", name)),
    }
}

fn read_input(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn analyze(
    config: Config,
    text: Option<String>,
    language: Option<String>,
    file: Option<String>,
    environment: Option<String>,
    json: bool,
) -> Result<()> {
    let text = read_input(text)?;
    let context = ErrorContext {
        language: parse_language(language.as_deref())?,
        file_path: file,
        execution_context: environment,
        ..Default::default()
    };

    let mut engine = ErrorAnalysisEngine::new(config);
    engine.initialize()?;
    let analysis = engine.analyze(text.trim(), &context)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!(
        "{} {} ({}, confidence {:.0}%)",
        "Category:".bold(),
        analysis.category.as_str().cyan(),
        analysis.severity.as_str(),
        analysis.confidence * 100.0
    );
    println!("{} {}", "Root cause:".bold(), analysis.root_cause);

    if !analysis.matches.is_empty() {
        println!("\n{}", "Matched patterns".bold());
        for m in &analysis.matches {
            println!(
                "  {} {} ({:.0}%)",
                "-".dimmed(),
                m.pattern_name,
                m.confidence * 100.0
            );
        }
    }

    if !analysis.suggestions.is_empty() {
        println!("\n{}", "Suggested fixes".bold());
        for s in &analysis.suggestions {
            println!(
                "  {} {} {}",
                format!("[{}]", s.priority).yellow(),
                s.title.green(),
                format!("({:.0}%)", s.confidence * 100.0).dimmed()
            );
            println!("    {}", s.description);
        }
    }

    for insight in &analysis.insights {
        println!("\n{} {}", "Insight:".blue().bold(), insight.message);
    }

    Ok(())
}

fn trace(config: Config, text: Option<String>, language: Option<String>, json: bool) -> Result<()> {
    let text = read_input(text)?;
    let parser = StackTraceParser::new(config.stacktrace);
    let analysis = parser.analyze(&text, parse_language(language.as_deref())?);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!(
        "{} {} ({} frames: {} user, {} third-party, {} system)",
        "Language:".bold(),
        analysis.language.as_str().cyan(),
        analysis.call_chain.total_depth,
        analysis.call_chain.user_frames,
        analysis.call_chain.third_party_frames,
        analysis.call_chain.system_frames
    );

    if analysis.recursion.is_recursive {
        println!(
            "{} {} called {} times",
            "Recursion:".red().bold(),
            analysis.recursion.function.as_deref().unwrap_or("?"),
            analysis.recursion.call_count
        );
    }

    for (i, frame) in analysis.frames.iter().enumerate() {
        let marker = if Some(i) == analysis.root_cause_frame {
            "*".red().bold().to_string()
        } else {
            " ".to_string()
        };
        let location = match (&frame.file, frame.line) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.clone(),
            _ => String::new(),
        };
        let function = if frame.is_user_code {
            frame.function.green()
        } else if frame.is_third_party {
            frame.function.dimmed()
        } else {
            frame.function.normal()
        };
        println!("{} {:>3}  {}  {}", marker, i, function, location.dimmed());
    }

    Ok(())
}

async fn monitor(config: Config, application: String, language: Option<String>) -> Result<()> {
    let language = parse_language(language.as_deref())?.unwrap_or(Language::Generic);

    let mut engine = ErrorAnalysisEngine::new(config.clone());
    engine.initialize()?;
    let monitor = RealTimeMonitor::new(config.monitor, config.health, engine);
    monitor
        .add_application(&application, &application, language, vec!["stdin".to_string()])
        .await;

    monitor
        .subscribe("pattern", |event| {
            if let MonitorEvent::Alert(alert) = event {
                eprintln!("{} {}", "ALERT".red().bold(), alert.description);
            }
        })
        .await;
    monitor
        .subscribe("alert", |event| {
            if let MonitorEvent::Alert(alert) = event {
                eprintln!("{} {}", "HEALTH".yellow().bold(), alert.description);
            }
        })
        .await;

    monitor.start_monitoring();
    println!(
        "{} reading error lines from stdin (ctrl-d to finish)",
        "faultline".green().bold()
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let event = monitor
            .record_error(RecordErrorRequest {
                application_id: application.clone(),
                message: line,
                ..Default::default()
            })
            .await;
        println!(
            "{} [{}] {}",
            event.timestamp.format("%H:%M:%S"),
            event.severity.as_str(),
            event.message
        );
    }

    monitor.stop_monitoring();
    let stats = monitor.get_monitoring_stats().await;
    println!(
        "\n{} {} events, {} alerts",
        "Done:".bold(),
        stats.total_events,
        stats.alerts_raised
    );
    Ok(())
}

fn patterns(config: Config, json: bool) -> Result<()> {
    let mut engine = ErrorAnalysisEngine::new(config);
    engine.initialize()?;
    let patterns = engine.list_patterns();

    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }

    for pattern in patterns {
        println!(
            "{:<28} {:<12} {:<10} {}",
            pattern.id.cyan(),
            pattern.language.as_str(),
            pattern.severity.as_str(),
            pattern.name
        );
    }
    Ok(())
}
