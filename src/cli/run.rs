use std::{fs, path::Path, process::ExitCode};

use anyhow::Result;

use super::{
    args::{Arguments, Command, ExtractCommand, MigrateCommand},
    exit_status::ExitStatus,
    report,
};
use crate::config::{CONFIG_FILE_NAME, default_config_json};
use crate::core::{ExtractionContext, MigrationAdvisor};

pub fn run(Arguments { command }: Arguments) -> Result<ExitCode> {
    match command {
        Some(Command::Extract(cmd)) => extract(cmd),
        Some(Command::Migrate(cmd)) => migrate(cmd),
        Some(Command::Init) => {
            init()?;
            eprintln!("Created {}", CONFIG_FILE_NAME);
            Ok(ExitStatus::Success.into())
        }
        None => {
            anyhow::bail!("No command provided. Use --help to see available commands.")
        }
    }
}

fn extract(cmd: ExtractCommand) -> Result<ExitCode> {
    let context = ExtractionContext::new(&cmd.common)?;
    let result = context.run();

    report::write_extraction(&result, cmd.output.as_deref())?;
    report::print_extraction_summary(&result);

    let status = if result.errors.is_empty() {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    };
    Ok(status.into())
}

fn migrate(cmd: MigrateCommand) -> Result<ExitCode> {
    let context = ExtractionContext::new(&cmd.common)?;
    let result = context.run();

    let advisor = MigrationAdvisor::new(&context.registry);
    let migration = advisor.advise(&result.queries);

    report::write_migration(&migration, cmd.output.as_deref())?;
    report::print_migration_summary(&migration);

    let status = if migration.summary.needs_migration == 0 {
        ExitStatus::Success
    } else {
        ExitStatus::Failure
    };
    Ok(status.into())
}

fn init() -> Result<()> {
    let config_path = Path::new(CONFIG_FILE_NAME);
    if config_path.exists() {
        anyhow::bail!("{} already exists", CONFIG_FILE_NAME);
    }

    fs::write(config_path, default_config_json()?)?;
    Ok(())
}
