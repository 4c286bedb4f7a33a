//! `hydromodel` - edit model parameters and export control files.
//!
//! Usage: `hydromodel [--root DIR] [-v] --model NAME <command>`

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use hydromodel_core::config::load_config;
use hydromodel_core::events::{EntityKind, ImportOutcome};
use hydromodel_core::paths::default_root_dir;
use hydromodel_core::{
    run_export, DbfAttributeSource, ExportMode, ExportOptions, Model, ProjectLayout, Registry,
};

#[derive(Parser, Debug)]
#[command(name = "hydromodel")]
#[command(about = "Parameter store and control-file export for 2D hydraulic models")]
struct Cli {
    /// Workspace root (defaults to $HYDROMODEL_ROOT, then ~/hydromodel)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Model name
    #[arg(short, long)]
    model: String,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value of a parameter (stored, else default)
    Get { group: String, name: String },

    /// Store a parameter; several values are joined with spaces
    Set {
        group: String,
        name: String,
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Mark a group as applied
    Sign { group: String },

    /// Show which groups have been applied
    Status,

    /// Write every parameter and sign every group
    Save,

    /// Rename the model and its files
    Rename { new_name: String },

    /// Inspect or edit the events
    Events {
        #[command(subcommand)]
        action: Option<EventsAction>,
    },

    /// Write the control files
    Export {
        /// Copy referenced input files into the model tree
        #[arg(long)]
        bundle: bool,

        /// Template folder copied into a new output tree
        #[arg(long)]
        template: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum EventsAction {
    /// List events and their values
    List,
    /// Add an event covering every boundary entity
    Add { id: String },
    /// Remove an event
    Remove { id: String },
    /// Set the value of one entity in one event
    Set {
        event: String,
        entity: String,
        value: f64,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(message) = run(cli) {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let root = match cli.root {
        Some(root) => root,
        None => default_root_dir()?,
    };
    let config = load_config(&root).map_err(|e| e.to_string())?;
    let layout = ProjectLayout::new(&root);
    let mut model = Model::open(&cli.model, layout, Arc::new(Registry::standard()))
        .map_err(|e| e.to_string())?;

    match cli.command {
        Command::Get { group, name } => {
            let value = model
                .store()
                .get(&group, &name)
                .ok_or_else(|| format!("no value for {group}::{name}"))?;
            println!("{value}");
        }
        Command::Set {
            group,
            name,
            values,
        } => {
            model
                .set_user_values(&group, &name, &values)
                .map_err(|e| e.to_string())?;
        }
        Command::Sign { group } => {
            if model.registry().group(&group).is_none() {
                return Err(format!("unknown parameter group {group}"));
            }
            model.store().sign(&group).map_err(|e| e.to_string())?;
        }
        Command::Status => {
            println!("{} ({})", model.name(), model.store().path().display());
            for group in model.registry().groups() {
                let state = if model.is_signed(group.name) {
                    "applied"
                } else {
                    "not applied"
                };
                println!("  {:<6} {:<20} {state}", group.name, group.label);
            }
        }
        Command::Save => model.save().map_err(|e| e.to_string())?,
        Command::Rename { new_name } => model.rename(&new_name).map_err(|e| e.to_string())?,
        Command::Events { action } => events(&mut model, action.unwrap_or(EventsAction::List))?,
        Command::Export { bundle, template } => {
            let mut options = ExportOptions::from(&config);
            if bundle {
                options.mode = ExportMode::Bundle;
            }
            if template.is_some() {
                options.template_dir = template;
            }

            let report = run_export(&mut model, &DbfAttributeSource, &options);
            println!("{report}");
        }
    }

    Ok(())
}

fn events(model: &mut Model, action: EventsAction) -> Result<(), String> {
    for kind in [EntityKind::SourceArea, EntityKind::BoundaryCondition] {
        if let Err(err) = model.discover_boundaries(kind, &DbfAttributeSource) {
            log::warn!("{err}");
        }
    }
    if model.import_events().map_err(|e| e.to_string())? == ImportOutcome::Missing {
        log::info!("No event file yet; showing seeded events");
    }

    match action {
        EventsAction::List => {
            for (id, values) in model.events().iter() {
                println!("{id}");
                for (entity, value) in values {
                    println!("  {entity} = {value:?}");
                }
            }
            return Ok(());
        }
        EventsAction::Add { id } => {
            let known = model.boundaries().clone();
            model.events_mut().add_event(&id, &known);
        }
        EventsAction::Remove { id } => {
            if model.events_mut().remove_event(&id).is_none() {
                return Err(format!("unknown event {id}"));
            }
        }
        EventsAction::Set {
            event,
            entity,
            value,
        } => {
            model
                .events_mut()
                .set_value(&event, &entity, value)
                .map_err(|e| e.to_string())?;
        }
    }

    model.save_events().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_several_values() {
        let cli = Cli::try_parse_from([
            "hydromodel",
            "--model",
            "creek",
            "set",
            "stab",
            "Hardware",
            "GPU",
            "FAST",
        ])
        .unwrap();

        match cli.command {
            Command::Set { group, name, values } => {
                assert_eq!(group, "stab");
                assert_eq!(name, "Hardware");
                assert_eq!(values, vec!["GPU", "FAST"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn set_requires_a_value() {
        assert!(Cli::try_parse_from(["hydromodel", "-m", "creek", "set", "stab", "Hardware"]).is_err());
    }

    #[test]
    fn model_is_required() {
        assert!(Cli::try_parse_from(["hydromodel", "status"]).is_err());
    }

    #[test]
    fn parses_export_flags_and_verbosity() {
        let cli = Cli::try_parse_from([
            "hydromodel",
            "-m",
            "creek",
            "export",
            "--bundle",
            "-vv",
            "--root",
            "/srv/models",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/models")));
        assert!(matches!(
            cli.command,
            Command::Export {
                bundle: true,
                template: None
            }
        ));
    }

    #[test]
    fn events_default_to_list() {
        let cli = Cli::try_parse_from(["hydromodel", "-m", "creek", "events"]).unwrap();
        assert!(matches!(cli.command, Command::Events { action: None }));

        let cli = Cli::try_parse_from(["hydromodel", "-m", "creek", "events", "set", "E1", "BC1", "4.5"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Events {
                action: Some(EventsAction::Set { value, .. })
            } if value == 4.5
        ));
    }

    #[test]
    fn commands_run_against_a_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let parse = |args: &[&str]| {
            let mut full = vec!["hydromodel", "--root", root, "-m", "creek"];
            full.extend_from_slice(args);
            Cli::try_parse_from(full).unwrap()
        };

        run(parse(&["set", "stab", "Cell Size", "5.0"])).unwrap();
        run(parse(&["save"])).unwrap();
        run(parse(&["rename", "river"])).unwrap();

        let layout = ProjectLayout::new(dir.path());
        let stored = std::fs::read_to_string(layout.store_file("river")).unwrap();
        assert!(stored.contains("stab::Cell Size::5.0\n"));
        assert!(stored.contains("stab::signature::True\n"));
        assert!(run(parse(&["set", "stab", "Warp", "9"])).is_err());
    }
}
