use clap::Parser;
use std::path::PathBuf;
use troupe::{SlotType, StageConfig};

use crate::error::CliError;

#[derive(Debug, Parser)]
pub struct TypesArgs {
    /// Stage file whose script search paths to use
    #[arg(short, long)]
    pub stage: Option<PathBuf>,
}

fn slots(slots: &[SlotType]) -> String {
    if slots.is_empty() {
        return "-".to_string();
    }
    slots
        .iter()
        .map(SlotType::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// One line per type: name, inputs, outputs, configurable entries.
pub fn render(registry: &troupe::ActorTypeRegistry) -> String {
    let width = registry.types().map(|t| t.name().len()).max().unwrap_or(0);
    let mut out = String::new();
    for actor_type in registry.types() {
        let caps = actor_type.capabilities();
        let entries = caps
            .data()
            .iter()
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "{:width$}  in: {:8} out: {:8} {}\n",
            actor_type.name(),
            slots(caps.inputs()),
            slots(caps.outputs()),
            entries,
            width = width
        ));
    }
    out
}

pub fn execute(args: &TypesArgs) -> Result<(), CliError> {
    let config = match &args.stage {
        Some(path) => {
            StageConfig::from_file(path).map_err(|e| CliError::invalid_stage(path, e))?
        }
        None => StageConfig::default(),
    };
    let registry = crate::build_registry(&config.script)?;
    print!("{}", render(&registry));
    Ok(())
}
