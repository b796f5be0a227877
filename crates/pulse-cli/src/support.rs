use crate::cli::LogLevel;
use chrono::{SecondsFormat, Utc};
use flexi_logger::{Logger, LoggerHandle};
use pulse_contract::{ContractSummary, ContractViolation};
use pulse_paradox::jsonl::{self, JsonlError};
use pulse_paradox::{Edge, ParadoxError};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Display;
use std::fs;
use std::path::Path;

pub const CLASS_IO: &str = "paradox.io";
const CLASS_INPUT: &str = "paradox.input_invalid";

/// Start the stderr logger. The handle must outlive every log call.
pub fn init_logging(level: LogLevel) -> Option<LoggerHandle> {
    match Logger::try_with_str(level.as_spec()).and_then(|logger| logger.log_to_stderr().start()) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("warning: logging disabled: {err}");
            None
        }
    }
}

/// Input or parameter defect: report and exit 2.
pub fn emit_error(class: &str, message: impl Display) -> ! {
    eprintln!("error[{class}]: {message}");
    std::process::exit(2);
}

pub fn emit_paradox_error(err: &ParadoxError) -> ! {
    emit_error(err.class(), err)
}

/// Contract violation: report and exit 1.
pub fn emit_violation(check_kind: &str, violation: &ContractViolation, json_output: bool) -> ! {
    if json_output {
        print_json(&json!({
            "checkKind": check_kind,
            "result": "rejected",
            "failureClasses": [violation.class()],
            "errors": [{"class": violation.class(), "message": violation.to_string()}],
        }));
    }
    eprintln!("error[{}]: {violation}", violation.class());
    std::process::exit(1);
}

pub fn accepted_report(check_kind: &str, summary: &ContractSummary) -> Value {
    json!({
        "checkKind": check_kind,
        "result": "accepted",
        "failureClasses": [],
        "summary": summary,
    })
}

pub fn print_json(value: &impl Serialize) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|err| emit_error(CLASS_IO, format!("failed to render json: {err}")));
    println!("{rendered}");
}

pub fn read_text_or_exit(path: &Path, what: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| {
        emit_error(
            CLASS_IO,
            format!("failed to read {what} {}: {err}", path.display()),
        )
    })
}

pub fn read_json_or_exit(path: &Path, what: &str) -> Value {
    let text = read_text_or_exit(path, what);
    serde_json::from_str(&text).unwrap_or_else(|err| {
        emit_error(
            CLASS_INPUT,
            format!("failed to parse {what} json {}: {err}", path.display()),
        )
    })
}

/// Raw edge objects; a missing path means an empty edge set.
pub fn read_edge_values_or_exit(path: Option<&Path>) -> Vec<Value> {
    let Some(path) = path else {
        return Vec::new();
    };
    jsonl::read_lines_from_path(path)
        .map(|lines| lines.into_iter().map(|(_, value)| value).collect())
        .unwrap_or_else(|err| exit_jsonl(path, err))
}

pub fn typed_edges_or_exit(values: &[Value]) -> Vec<Edge> {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            serde_json::from_value(value.clone()).unwrap_or_else(|err| {
                emit_error("paradox.edges_invalid", format!("edges[{idx}]: {err}"))
            })
        })
        .collect()
}

/// Split rendered JSONL back into values for self-validation.
pub fn jsonl_values_or_exit(rendered: &str) -> Vec<Value> {
    rendered
        .lines()
        .map(|line| {
            serde_json::from_str(line).unwrap_or_else(|err| {
                emit_error(CLASS_IO, format!("rendered edge line does not parse: {err}"))
            })
        })
        .collect()
}

pub fn write_or_exit(path: &Path, contents: &str) {
    jsonl::write_atomic(path, contents.as_bytes()).unwrap_or_else(|err| {
        emit_error(CLASS_IO, format!("failed to write {}: {err}", path.display()))
    });
}

/// Publish related outputs together; on failure none of them is left behind.
pub fn write_all_or_exit(files: &[(&Path, &str)]) {
    let payloads: Vec<(&Path, &[u8])> = files
        .iter()
        .map(|(path, contents)| (*path, contents.as_bytes()))
        .collect();
    jsonl::write_atomic_all(&payloads)
        .unwrap_or_else(|err| emit_error(CLASS_IO, format!("failed to write outputs: {err}")));
}

pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn exit_jsonl(path: &Path, err: JsonlError) -> ! {
    emit_error(
        "paradox.edges_invalid",
        format!("{}: {err}", path.display()),
    )
}
