use crate::support::{
    accepted_report, emit_violation, print_json, read_edge_values_or_exit, read_json_or_exit,
};
use std::path::PathBuf;

const CHECK_KIND: &str = "pulse.field_check.v0";

pub fn run(field: String, edges: Option<String>, json_output: bool) {
    let field_path = PathBuf::from(field);
    let document = read_json_or_exit(&field_path, "field");
    let edges_path = edges.map(PathBuf::from);
    let edge_values = read_edge_values_or_exit(edges_path.as_deref());

    let summary = pulse_contract::validate_field(&document, Some(edge_values.as_slice()))
        .unwrap_or_else(|violation| emit_violation(CHECK_KIND, &violation, json_output));

    if json_output {
        print_json(&accepted_report(CHECK_KIND, &summary));
        return;
    }
    println!(
        "[field-check] OK (atoms={}, tensions={}, edges={})",
        summary.atom_count, summary.tension_count, summary.edge_count
    );
}
