//! Validate command - checks definitions without running them

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use crate::config::AppConfig;
use crate::domain::workflow::{DefinitionLimits, WorkflowDefinition};
use crate::infrastructure::logging;
use crate::infrastructure::workflow::{load_paths, LoadedWorkflows};

/// Arguments for the validate command
#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Workflow files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

pub async fn run(args: ValidateArgs) -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let limits = DefinitionLimits {
        max_for_each_depth: config.engine.max_for_each_depth,
    };
    let loaded = load_paths(&args.paths);
    let (lines, valid) = check(&loaded, &limits);

    for line in lines {
        println!("{}", line);
    }

    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check(loaded: &LoadedWorkflows, limits: &DefinitionLimits) -> (Vec<String>, bool) {
    let mut lines = Vec::new();
    let mut valid = loaded.errors.is_empty();

    for error in &loaded.errors {
        lines.push(format!("invalid {}", error));
    }

    for definition in &loaded.definitions {
        match definition.validate(limits) {
            Ok(()) => lines.push(format!("ok      {}", describe(definition))),
            Err(e) => {
                valid = false;
                lines.push(format!("invalid {}: {}", definition.name, e));
            }
        }
    }

    (lines, valid)
}

fn describe(definition: &WorkflowDefinition) -> String {
    format!(
        "{} ({} steps, entry '{}')",
        definition.name,
        definition.steps.len(),
        definition.entry_step().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::StepDefinition;

    #[test]
    fn test_check_reports_each_definition() {
        let loaded = LoadedWorkflows {
            definitions: vec![
                WorkflowDefinition::new("news", "https://example.com/")
                    .with_step(StepDefinition::new("list")),
                WorkflowDefinition::new("broken", "https://example.com/")
                    .with_step(StepDefinition::new("list").with_next("gone")),
            ],
            errors: Vec::new(),
        };

        let (lines, valid) = check(&loaded, &DefinitionLimits::default());

        assert!(!valid);
        assert_eq!(lines[0], "ok      news (1 steps, entry 'list')");
        assert!(lines[1].starts_with("invalid broken:"));
        assert!(lines[1].contains("gone"));
    }
}
