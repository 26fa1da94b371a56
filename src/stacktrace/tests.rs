use super::*;
use crate::config::StackTraceConfig;
use pretty_assertions::assert_eq;

fn parser() -> StackTraceParser {
    StackTraceParser::new(StackTraceConfig::default())
}

const NODE_TRACE: &str = "\
TypeError: Cannot read property 'id' of undefined
    at getUser (src/services/user.js:42:15)
    at processRequest (src/handlers/request.js:17:9)
    at Layer.handle [as handle_request] (node_modules/express/lib/router/layer.js:95:5)
    at next (node_modules/express/lib/router/route.js:144:13)
    at processTicksAndRejections (node:internal/process/task_queues:95:5)";

const PY_TRACE: &str = "\
Traceback (most recent call last):
  File \"app/main.py\", line 12, in <module>
    run()
  File \"app/runner.py\", line 30, in run
    handler.process(payload)
  File \"/usr/lib/python3.11/site-packages/requests/api.py\", line 59, in get
    return request('get', url)
  File \"app/handler.py\", line 8, in process
    return payload['user']['id']
KeyError: 'user'";

const RECURSIVE_TRACE: &str = "\
RangeError: Maximum call stack size exceeded
    at descend (src/tree.js:5:3)
    at descend (src/tree.js:7:10)
    at descend (src/tree.js:7:10)
    at descend (src/tree.js:7:10)
    at descend (src/tree.js:7:10)
    at walk (src/tree.js:12:5)";

#[test]
fn test_node_trace_frames_in_order() {
    let analysis = parser().analyze(NODE_TRACE, None);
    assert_eq!(analysis.language, Language::JavaScript);
    assert_eq!(analysis.frames.len(), 5);
    // index 0 is the innermost frame
    assert_eq!(analysis.frames[0].function, "getUser");
    assert_eq!(analysis.frames[0].file.as_deref(), Some("src/services/user.js"));
    assert_eq!(analysis.frames[0].line, Some(42));
    assert_eq!(analysis.frames[0].column, Some(15));
}

#[test]
fn test_frame_classification() {
    let analysis = parser().analyze(NODE_TRACE, None);
    assert!(analysis.frames[0].is_user_code);
    assert!(analysis.frames[1].is_user_code);
    assert!(analysis.frames[2].is_third_party, "express frame is library code");
    assert!(!analysis.frames[4].is_user_code);
    assert!(!analysis.frames[4].is_third_party, "node internals are system code");

    assert_eq!(analysis.call_chain.total_depth, 5);
    assert_eq!(analysis.call_chain.user_frames, 2);
    assert_eq!(analysis.call_chain.third_party_frames, 2);
    assert_eq!(analysis.call_chain.system_frames, 1);
}

#[test]
fn test_root_cause_is_first_user_frame() {
    let analysis = parser().analyze(NODE_TRACE, None);
    assert_eq!(analysis.root_cause_frame, Some(0));
}

#[test]
fn test_python_trace_reversed_to_innermost_first() {
    let analysis = parser().analyze(PY_TRACE, Some(Language::Python));
    assert_eq!(analysis.frames.len(), 4);
    // the last File line of the traceback is the error origin
    assert_eq!(analysis.frames[0].function, "process");
    assert_eq!(analysis.frames[0].file.as_deref(), Some("app/handler.py"));
    assert!(analysis.frames[0].is_user_code);
    assert!(analysis
        .frames
        .iter()
        .any(|f| f.is_third_party && f.file.as_deref().unwrap_or("").contains("site-packages")));
}

#[test]
fn test_recursion_detected_beyond_threshold() {
    let analysis = parser().analyze(RECURSIVE_TRACE, Some(Language::JavaScript));
    assert!(analysis.recursion.is_recursive);
    assert_eq!(analysis.recursion.function.as_deref(), Some("descend"));
    assert_eq!(analysis.recursion.call_count, 5);
}

#[test]
fn test_no_recursion_below_threshold() {
    let analysis = parser().analyze(NODE_TRACE, None);
    assert!(!analysis.recursion.is_recursive);
    assert_eq!(analysis.recursion.call_count, 0);
}

#[test]
fn test_unmatched_lines_dropped_not_fatal() {
    let trace = "some preamble that is not a frame\n    at run (src/a.js:1:1)\ngarbage line";
    let analysis = parser().analyze(trace, Some(Language::JavaScript));
    assert_eq!(analysis.frames.len(), 1);
}

#[test]
fn test_empty_trace_yields_no_frames() {
    let analysis = parser().analyze("", None);
    assert!(analysis.frames.is_empty());
    assert_eq!(analysis.root_cause_frame, None);
    assert!(!analysis.recursion.is_recursive);
}

#[test]
fn test_async_markers_detected() {
    let trace = "\
Error: boom
    at async fetchData (src/api.js:10:3)
    at processTicksAndRejections (node:internal/process/task_queues:95:5)";
    let analysis = parser().analyze(trace, Some(Language::JavaScript));
    assert!(analysis.async_chain.has_async_frames);
}

#[test]
fn test_unresolved_rejection_flagged() {
    let trace = "UnhandledPromiseRejection: Error: boom\n    at run (src/a.js:1:1)";
    let analysis = parser().analyze(trace, Some(Language::JavaScript));
    assert!(analysis.async_chain.has_unresolved_rejection);
}

#[test]
fn test_library_transitions() {
    let analysis = parser().analyze(NODE_TRACE, None);
    // user -> express library boundary between frames 1 and 2
    assert!(analysis
        .library_transitions
        .iter()
        .any(|t| t.from_index == 1 && t.direction == TransitionDirection::UserToLibrary));
}

#[test]
fn test_java_trace_parsing() {
    let trace = "\
Exception in thread \"main\" java.lang.NullPointerException
	at com.example.UserService.find(UserService.java:31)
	at com.example.Main.run(Main.java:12)
	at java.base/java.lang.Thread.run(Thread.java:833)";
    let analysis = parser().analyze(trace, None);
    assert_eq!(analysis.language, Language::Java);
    assert_eq!(analysis.frames.len(), 3);
    assert_eq!(analysis.frames[0].function, "com.example.UserService.find");
    assert_eq!(analysis.frames[0].line, Some(31));
    assert!(analysis.frames[2].is_third_party, "java.base is a library marker");
}

#[test]
fn test_rust_trace_location_continuation() {
    let trace = "\
thread 'main' panicked at 'index out of bounds', src/main.rs:7:14
stack backtrace:
   0: rust_begin_unwind
   1: core::panicking::panic_fmt
   2: faultline::run
             at ./src/main.rs:7:14
   3: faultline::main
             at ./src/main.rs:3:5";
    let analysis = parser().analyze(trace, Some(Language::Rust));
    let run_frame = analysis
        .frames
        .iter()
        .find(|f| f.function == "faultline::run")
        .expect("frame for faultline::run");
    assert_eq!(run_frame.file.as_deref(), Some("./src/main.rs"));
    assert_eq!(run_frame.line, Some(7));
}

#[test]
fn test_source_context_best_effort() {
    let mut config = StackTraceConfig::default();
    config.include_source_context = true;
    let parser = StackTraceParser::new(config);

    // file does not exist: parse succeeds, context degrades to None
    let analysis = parser.analyze("    at run (missing/file.js:3:1)", Some(Language::JavaScript));
    assert_eq!(analysis.frames.len(), 1);
    assert!(analysis.frames[0].source_context.is_none());
}
