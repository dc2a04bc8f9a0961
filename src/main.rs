use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::check::CheckCommand;
use cli::commands::config::{ConfigInitCommand, ConfigShowCommand};
use cli::commands::evaluate::EvaluateCommand;
use cli::{Cli, Commands, ConfigAction};
use merchant_eval::{config, init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config()?;
    if let Err(e) = init_telemetry(&config.observability) {
        eprintln!("Warning: failed to initialize telemetry: {e}");
    }

    let result = match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
        Some(Commands::Check {
            fields,
            profile,
            json,
        }) => CheckCommand::new(fields)
            .with_profile(profile)
            .with_json(json)
            .execute(config),
        Some(Commands::Evaluate {
            fields,
            profile,
            detach_after_ms,
            json,
        }) => tokio::runtime::Runtime::new()?.block_on(async {
            EvaluateCommand::new(fields)
                .with_profile(profile)
                .with_detach_after_ms(detach_after_ms)
                .with_json(json)
                .execute(config)
                .await
        }),
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => ConfigShowCommand.execute(config),
            ConfigAction::Init { force } => ConfigInitCommand::new(force).execute(),
        },
    };

    shutdown_telemetry();
    result
}
