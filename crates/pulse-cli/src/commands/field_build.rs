use crate::support::{
    accepted_report, emit_paradox_error, emit_violation, jsonl_values_or_exit, now_utc,
    print_json, read_text_or_exit, write_all_or_exit,
};
use pulse_paradox::{LinkerConfig, RunComparison, build_field, render_canonical, render_jsonl};
use std::path::PathBuf;

const CHECK_KIND: &str = "pulse.field_build.v0";

pub struct Args {
    pub comparison: String,
    pub out: String,
    pub edges_out: String,
    pub config: Option<String>,
    pub emit_created_at_now: bool,
    pub json: bool,
}

pub fn run(args: Args) {
    let config = match &args.config {
        Some(path) => LinkerConfig::load(path).unwrap_or_else(|err| emit_paradox_error(&err)),
        None => LinkerConfig::default(),
    };

    let comparison_path = PathBuf::from(&args.comparison);
    let comparison_text = read_text_or_exit(&comparison_path, "comparison");
    let comparison = RunComparison::from_json_str(&comparison_text)
        .unwrap_or_else(|err| emit_paradox_error(&err));
    let run_context = comparison
        .run_context()
        .unwrap_or_else(|err| emit_paradox_error(&err));

    let mut build = build_field(&comparison, &config, run_context)
        .unwrap_or_else(|err| emit_paradox_error(&err));
    if args.emit_created_at_now {
        build.field.stamp_created_at(now_utc());
    }

    let field_value = build
        .field
        .to_value()
        .unwrap_or_else(|err| emit_paradox_error(&err));
    let field_text =
        render_canonical("field", &field_value).unwrap_or_else(|err| emit_paradox_error(&err));
    let edges_text =
        render_jsonl("edges", &build.edges).unwrap_or_else(|err| emit_paradox_error(&err));

    let edge_values = jsonl_values_or_exit(&edges_text);
    let summary = pulse_contract::validate_field(&field_value, Some(edge_values.as_slice()))
        .unwrap_or_else(|violation| emit_violation(CHECK_KIND, &violation, args.json));

    let out = PathBuf::from(&args.out);
    let edges_out = PathBuf::from(&args.edges_out);
    write_all_or_exit(&[
        (out.as_path(), field_text.as_str()),
        (edges_out.as_path(), edges_text.as_str()),
    ]);
    log::info!("wrote {} and {}", out.display(), edges_out.display());

    let field_digest = build
        .field
        .meta
        .as_ref()
        .and_then(|meta| meta.field_digest.clone())
        .unwrap_or_default();

    if args.json {
        let mut report = accepted_report(CHECK_KIND, &summary);
        report["out"] = out.display().to_string().into();
        report["edgesOut"] = edges_out.display().to_string().into();
        report["fieldDigest"] = field_digest.into();
        print_json(&report);
        return;
    }

    println!("pulse field-build");
    println!("  Field: {}", out.display());
    println!("  Edges: {}", edges_out.display());
    println!("  Field Digest: {field_digest}");
    println!(
        "  Atoms: {} (tensions: {})",
        summary.atom_count, summary.tension_count
    );
    println!("  Edge Count: {}", summary.edge_count);
}
