use anyhow::Result;
use clap::Parser;
use console::style;
use errand::{Agent, ExecutionContext, ToolCollection, cli, client, config, logging, task_source};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style(format!("Error: {e:#}")).red());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::load(&cli.overrides)?;
    let task = task_source::from_cli(cli.prompt, cli.input)?.task()?;

    let backend = client::initialize_client(&config)?;

    println!("Backend: {:?}", config.backend);
    println!("Model: {}", config.model);

    let agent = Agent::new(
        config,
        Arc::new(backend),
        Arc::new(ToolCollection::standard()),
    );
    let mut ctx = ExecutionContext::terminal(cli.yes);
    agent.execute(&task, &mut ctx).await?;

    Ok(())
}
