//! PULSE CLI: the `pulse` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let _logger = support::init_logging(cli.log_level);

    match cli.command {
        Commands::FieldBuild {
            comparison,
            out,
            edges_out,
            config,
            emit_created_at_now,
            json,
        } => commands::field_build::run(commands::field_build::Args {
            comparison,
            out,
            edges_out,
            config,
            emit_created_at_now,
            json,
        }),

        Commands::CoreProject {
            field,
            edges,
            out,
            k,
            metric,
            tie_break,
            edge_policy,
            emit_created_at_now,
            json,
        } => commands::core_project::run(commands::core_project::Args {
            field,
            edges,
            out,
            k,
            metric,
            tie_break,
            edge_policy,
            emit_created_at_now,
            json,
        }),

        Commands::FieldCheck { field, edges, json } => {
            commands::field_check::run(field, edges, json)
        }

        Commands::CoreCheck { core, json } => commands::core_check::run(core, json),
    }
}
