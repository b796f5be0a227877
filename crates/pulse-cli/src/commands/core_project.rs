use crate::support::{
    CLASS_IO, accepted_report, emit_error, emit_paradox_error, emit_violation, now_utc, print_json,
    read_edge_values_or_exit, read_json_or_exit, typed_edges_or_exit, write_or_exit,
};
use pulse_paradox::{Field, ParadoxError, ProjectOptions, Selection, project_core};
use std::path::PathBuf;

const CHECK_KIND: &str = "pulse.core_project.v0";

pub struct Args {
    pub field: String,
    pub edges: Option<String>,
    pub out: String,
    pub k: usize,
    pub metric: String,
    pub tie_break: String,
    pub edge_policy: String,
    pub emit_created_at_now: bool,
    pub json: bool,
}

pub fn run(args: Args) {
    let selection = Selection::parse(args.k, &args.metric, &args.tie_break, &args.edge_policy)
        .unwrap_or_else(|err| emit_paradox_error(&err));

    let field_path = PathBuf::from(&args.field);
    let field_value = read_json_or_exit(&field_path, "field");
    let edges_path = args.edges.as_ref().map(PathBuf::from);
    let edge_values = read_edge_values_or_exit(edges_path.as_deref());

    // The input must already satisfy the contract; nothing is re-sorted.
    pulse_contract::validate_field(&field_value, Some(edge_values.as_slice()))
        .unwrap_or_else(|violation| emit_violation(CHECK_KIND, &violation, args.json));

    let field = Field::from_value(field_value).unwrap_or_else(|err| emit_paradox_error(&err));
    let edges = typed_edges_or_exit(&edge_values);
    let options = ProjectOptions {
        created_at_utc: args.emit_created_at_now.then(now_utc),
    };

    let core = match project_core(&field, &edges, &selection, &options) {
        Ok(core) => core,
        Err(err @ ParadoxError::ExternalEdge { .. }) => {
            eprintln!("error[{}]: {err}", err.class());
            std::process::exit(1);
        }
        Err(err) => emit_paradox_error(&err),
    };
    let rendered = core.render().unwrap_or_else(|err| emit_paradox_error(&err));

    let core_value: serde_json::Value = serde_json::from_str(&rendered)
        .unwrap_or_else(|err| emit_error(CLASS_IO, err));
    let summary = pulse_contract::validate_core(&core_value)
        .unwrap_or_else(|violation| emit_violation(CHECK_KIND, &violation, args.json));

    let out = PathBuf::from(&args.out);
    write_or_exit(&out, &rendered);
    log::info!("wrote {}", out.display());

    if args.json {
        let mut report = accepted_report(CHECK_KIND, &summary);
        report["out"] = out.display().to_string().into();
        report["selection"] = serde_json::to_value(selection).unwrap_or_default();
        report["atomIds"] = serde_json::to_value(&core.core.atom_ids).unwrap_or_default();
        report["edgeIds"] = serde_json::to_value(&core.core.edge_ids).unwrap_or_default();
        print_json(&report);
        return;
    }

    println!("pulse core-project");
    println!("  Core: {}", out.display());
    println!(
        "  Selection: k={} metric={} tie_break={} edge_policy={}",
        selection.k, selection.metric, selection.tie_break, selection.edge_policy
    );
    println!(
        "  Atoms: {} of {}",
        core.atoms.len(),
        field.atoms.len()
    );
    println!("  Edges: {} of {}", core.edges.len(), edges.len());
    for atom in &core.atoms {
        println!(
            "  - #{} {} [{}] {}",
            atom.core_rank.unwrap_or_default(),
            atom.atom_id,
            atom.severity,
            atom.title
        );
    }
}
