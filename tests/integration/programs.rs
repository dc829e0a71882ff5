//! Demo programs run end to end through the library entry points

use std::path::PathBuf;

use cbloop::util::config::RuntimeConfig;
use cbloop::{check_file, run_file, run_source};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

fn quiet() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.interpreter.echo_output = false;
    config
}

#[test]
fn test_interleave_demo() {
    let report = run_file(&demo("interleave.ron"), &quiet()).unwrap();
    assert_eq!(report.output, ["a0", "a1", "b0", "a2", "b1", "b2", "6"]);
    assert_eq!(report.tasks.len(), 2);
    assert!(report.tasks.iter().all(|t| t.is_ready && t.auto_yield));
    assert_eq!(report.stats.tasks_completed, 2);
}

#[test]
fn test_counter_demo() {
    let report = run_file(&demo("counter.ron"), &quiet()).unwrap();
    assert_eq!(report.output, ["2", "5", "count=5"]);
    assert!(report.tasks.iter().all(|t| t.name == "Counter.tick"));
}

#[test]
fn test_timeout_demo() {
    let report = run_file(&demo("timeout.ron"), &quiet()).unwrap();
    assert_eq!(report.output, ["slept", "Timeout"]);
    assert_eq!(report.stats.timeouts, 1);
    assert_eq!(report.tasks[0].name, "sleep");
}

#[test]
fn test_check_demo() {
    let summary = check_file(&demo("counter.ron")).unwrap();
    assert_eq!(summary.structs, 1);
    assert_eq!(summary.functions, 2);
    assert_eq!(summary.async_functions, 1);
    assert_eq!(summary.main_statements, 4);
}

#[test]
fn test_errors_carry_context() {
    let err = run_source("(main: [").unwrap_err();
    assert!(format!("{:#}", err).starts_with("Failed to parse program"));

    let err = run_source(r#"(main: [Print(Var("nope"))])"#).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Program aborted"));
    assert!(message.contains("Undefined variable: nope"));

    let err = run_file(&demo("missing.ron"), &quiet()).unwrap_err();
    assert!(format!("{}", err).contains("missing.ron"));
}

#[test]
fn test_report_serializes_to_json() {
    let report = run_source(
        r#"(
            functions: [(name: "one", is_async: true, body: [Return(Some(Lit(Int(1))))])],
            main: [Print(Await(Call(name: "one", args: [])))],
        )"#,
    )
    .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["output"][0], "1");
    assert_eq!(json["tasks"][0]["name"], "one");
    assert_eq!(json["tasks"][0]["state"], "Finished");
    assert_eq!(json["tasks"][0]["result"]["Int"], 1);
    assert_eq!(json["tasks"][0]["result_kind"], "Int");
    assert_eq!(json["stats"]["tasks_registered"], 1);
}
