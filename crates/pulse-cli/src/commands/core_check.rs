use crate::support::{accepted_report, emit_violation, print_json, read_json_or_exit};
use std::path::PathBuf;

const CHECK_KIND: &str = "pulse.core_check.v0";

pub fn run(core: String, json_output: bool) {
    let core_path = PathBuf::from(core);
    let document = read_json_or_exit(&core_path, "core");

    let summary = pulse_contract::validate_core(&document)
        .unwrap_or_else(|violation| emit_violation(CHECK_KIND, &violation, json_output));

    if json_output {
        print_json(&accepted_report(CHECK_KIND, &summary));
        return;
    }
    println!(
        "[core-check] OK (atoms={}, tensions={}, edges={})",
        summary.atom_count, summary.tension_count, summary.edge_count
    );
}
