use crate::config::StackTraceConfig;
use crate::patterns::Language;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

mod grammars;
#[cfg(test)]
mod tests;

pub use grammars::infer_language;
use grammars::{grammars_for, GrammarKind};

#[derive(Debug, Clone, Serialize)]
pub struct StackFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub language: Language,
    pub is_user_code: bool,
    pub is_third_party: bool,
    pub is_async: bool,
    pub source_context: Option<SourceContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceContext {
    pub line: u32,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallChainSummary {
    pub total_depth: usize,
    pub user_frames: usize,
    pub third_party_frames: usize,
    pub system_frames: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecursionDetection {
    pub is_recursive: bool,
    pub function: Option<String>,
    pub call_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AsyncChainSummary {
    pub has_async_frames: bool,
    pub async_frame_count: usize,
    pub has_unresolved_rejection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDirection {
    UserToLibrary,
    LibraryToUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryTransition {
    pub from_index: usize,
    pub to_index: usize,
    pub direction: TransitionDirection,
}

/// Full parse result. Frames are ordered innermost-first: index 0 is the
/// error origin.
#[derive(Debug, Clone, Serialize)]
pub struct StackTraceAnalysis {
    pub language: Language,
    pub frames: Vec<StackFrame>,
    pub call_chain: CallChainSummary,
    pub root_cause_frame: Option<usize>,
    pub recursion: RecursionDetection,
    pub async_chain: AsyncChainSummary,
    pub library_transitions: Vec<LibraryTransition>,
}

pub struct StackTraceParser {
    config: StackTraceConfig,
    // best-effort source cache; failures degrade to None, never fail the parse
    source_cache: Mutex<HashMap<String, Option<Vec<String>>>>,
}

impl StackTraceParser {
    pub fn new(config: StackTraceConfig) -> Self {
        Self {
            config,
            source_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Parses a raw trace into classified frames and derived summaries. The
    /// language is inferred from formatting cues when not supplied.
    pub fn analyze(&self, trace: &str, language: Option<Language>) -> StackTraceAnalysis {
        let language = language.unwrap_or_else(|| infer_language(trace));
        let mut frames = self.parse_frames(trace, language);

        // python traces list the outermost call first; flip to innermost-first
        if language == Language::Python {
            frames.reverse();
        }

        if self.config.include_source_context {
            for frame in &mut frames {
                if frame.is_user_code {
                    frame.source_context = self.resolve_source_context(frame);
                }
            }
        }

        let call_chain = summarize_call_chain(&frames);
        let root_cause_frame = frames
            .iter()
            .position(|f| f.is_user_code)
            .or(if frames.is_empty() { None } else { Some(0) });
        let recursion = detect_recursion(&frames, self.config.recursion_threshold);
        let async_chain = summarize_async_chain(&frames, trace);
        let library_transitions = find_library_transitions(&frames);

        StackTraceAnalysis {
            language,
            frames,
            call_chain,
            root_cause_frame,
            recursion,
            async_chain,
            library_transitions,
        }
    }

    fn parse_frames(&self, trace: &str, language: Language) -> Vec<StackFrame> {
        let grammars = grammars_for(language);
        let mut frames: Vec<StackFrame> = Vec::new();

        for line in trace.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let matched = grammars.iter().find_map(|g| {
                g.regex.captures(line).map(|caps| (g.kind, caps))
            });

            let Some((kind, caps)) = matched else {
                continue; // unmatched lines are dropped, not fatal
            };

            let function = caps
                .name("function")
                .map(|m| m.as_str().trim().to_string());
            let file = caps.name("file").map(|m| m.as_str().to_string());
            let line_no = caps.name("line").and_then(|m| m.as_str().parse().ok());
            let column = caps.name("column").and_then(|m| m.as_str().parse().ok());

            match kind {
                GrammarKind::Location => {
                    // attaches to the frame parsed on the previous line
                    if let Some(last) = frames.last_mut() {
                        if last.file.is_none() {
                            last.file = file;
                            last.line = line_no;
                            last.column = column;
                            self.classify(last);
                        }
                    }
                }
                GrammarKind::Frame => {
                    let mut frame = StackFrame {
                        function: function.unwrap_or_else(|| "<anonymous>".to_string()),
                        file,
                        line: line_no,
                        column,
                        language,
                        is_user_code: false,
                        is_third_party: false,
                        is_async: false,
                        source_context: None,
                    };
                    self.classify(&mut frame);
                    frame.is_async = is_async_frame(&frame.function, line, language);
                    frames.push(frame);
                }
            }
        }

        frames
    }

    /// Path heuristics: library marker wins, then project-root containment,
    /// everything else is system code.
    fn classify(&self, frame: &mut StackFrame) {
        frame.is_third_party = false;
        frame.is_user_code = false;

        let Some(file) = &frame.file else {
            return; // no path means native/system
        };

        // markers can appear in the path or, for JVM-style traces, in the
        // fully qualified function name
        if self.config.library_markers.iter().any(|marker| {
            file.contains(marker.as_str()) || frame.function.contains(marker.as_str())
        }) {
            frame.is_third_party = true;
            return;
        }

        let path = Path::new(file);
        match &self.config.project_root {
            Some(root) => {
                if path.starts_with(root) {
                    frame.is_user_code = true;
                }
            }
            None => {
                // without a configured root, relative non-system paths are
                // assumed to be the user's own code
                let looks_system = file.starts_with("/usr/")
                    || file.starts_with("node:")
                    || file.starts_with("internal/")
                    || file.starts_with("<frozen")
                    || file.starts_with("native");
                if !looks_system {
                    frame.is_user_code = true;
                }
            }
        }
    }

    fn resolve_source_context(&self, frame: &StackFrame) -> Option<SourceContext> {
        let file = frame.file.as_ref()?;
        let line = frame.line?;

        let mut cache = self.source_cache.lock().unwrap();
        let lines = cache
            .entry(file.clone())
            .or_insert_with(|| match std::fs::read_to_string(file) {
                Ok(content) => Some(content.lines().map(|l| l.to_string()).collect()),
                Err(e) => {
                    tracing::debug!("source context unavailable for {}: {}", file, e);
                    None
                }
            })
            .as_ref()?;

        let idx = (line as usize).checked_sub(1)?;
        if idx >= lines.len() {
            return None;
        }
        let radius = self.config.source_context_lines;
        let start = idx.saturating_sub(radius);
        let end = (idx + radius + 1).min(lines.len());

        Some(SourceContext {
            line,
            lines: lines[start..end].to_vec(),
        })
    }
}

fn summarize_call_chain(frames: &[StackFrame]) -> CallChainSummary {
    CallChainSummary {
        total_depth: frames.len(),
        user_frames: frames.iter().filter(|f| f.is_user_code).count(),
        third_party_frames: frames.iter().filter(|f| f.is_third_party).count(),
        system_frames: frames
            .iter()
            .filter(|f| !f.is_user_code && !f.is_third_party)
            .count(),
    }
}

fn detect_recursion(frames: &[StackFrame], threshold: usize) -> RecursionDetection {
    let mut counts: HashMap<(String, Option<String>), usize> = HashMap::new();
    for frame in frames {
        *counts
            .entry((frame.function.clone(), frame.file.clone()))
            .or_insert(0) += 1;
    }

    let repeating = counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count >= threshold);

    match repeating {
        Some(((function, _), count)) => RecursionDetection {
            is_recursive: true,
            function: Some(function),
            call_count: count,
        },
        None => RecursionDetection {
            is_recursive: false,
            function: None,
            call_count: 0,
        },
    }
}

fn is_async_frame(function: &str, raw_line: &str, language: Language) -> bool {
    let markers: &[&str] = match language {
        Language::JavaScript | Language::TypeScript => {
            &["async", "await", "Promise", "__awaiter", "processTicksAndRejections"]
        }
        Language::Python => &["async", "await", "asyncio", "coroutine"],
        Language::Rust => &["async", "poll", "tokio", "future"],
        Language::Java => &["CompletableFuture", "async"],
        Language::Go => &["goroutine"],
        Language::Generic => &["async", "await"],
    };
    markers
        .iter()
        .any(|m| function.contains(m) || raw_line.contains(m))
}

fn summarize_async_chain(frames: &[StackFrame], trace: &str) -> AsyncChainSummary {
    let async_frame_count = frames.iter().filter(|f| f.is_async).count();
    let lowered = trace.to_lowercase();
    let has_unresolved_rejection = lowered.contains("unhandledpromiserejection")
        || lowered.contains("unhandled rejection")
        || lowered.contains("unhandled promise rejection");

    AsyncChainSummary {
        has_async_frames: async_frame_count > 0,
        async_frame_count,
        has_unresolved_rejection,
    }
}

/// Adjacent frames that cross the user/library boundary, innermost-first.
fn find_library_transitions(frames: &[StackFrame]) -> Vec<LibraryTransition> {
    let mut transitions = Vec::new();
    for (i, pair) in frames.windows(2).enumerate() {
        let inner_user = pair[0].is_user_code;
        let outer_user = pair[1].is_user_code;
        if inner_user != outer_user {
            transitions.push(LibraryTransition {
                from_index: i,
                to_index: i + 1,
                direction: if outer_user {
                    TransitionDirection::LibraryToUser
                } else {
                    TransitionDirection::UserToLibrary
                },
            });
        }
    }
    transitions
}
