use std::io;

use anyhow::Result;
use is_terminal::IsTerminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secure_env_vars::{
    cli::{Cli, Format},
    config::Config,
    execution::local::LocalExecutor,
    printer::{HumanPrinter, JsonPrinter},
    Dispatcher, EnvSecretProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secure_env_vars=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut cfg = Config::load();
    // CLI overrides config
    if let Some(shell) = &args.shell {
        cfg.set("SHELL_NAME", shell.clone());
    }
    if let Some(secs) = args.timeout {
        cfg.set("COMMAND_TIMEOUT", secs.to_string());
    }
    if !args.modulepath.is_empty() {
        let joined = std::env::join_paths(&args.modulepath)?;
        cfg.set("MODULEPATH", joined.to_string_lossy().into_owned());
    }
    tracing::debug!(config = %cfg.config_path.display(), "configuration loaded");

    let format = args
        .format
        .or_else(|| cfg.get("DEFAULT_FORMAT").and_then(|v| Format::from_config_value(&v)))
        .unwrap_or(Format::Human);
    let color = if args.no_color {
        false
    } else if args.color {
        true
    } else {
        cfg.get("NO_COLOR").is_none() && io::stdout().is_terminal()
    };

    let dispatcher = Dispatcher::new(LocalExecutor::from_config(&cfg), EnvSecretProvider::default());

    let outcome = dispatcher.run(&args.request()).await;
    let ok = outcome.is_ok();
    match format {
        Format::Json => {
            let value = match &outcome {
                Ok(result) => JsonPrinter::render_result(result),
                Err(err) => JsonPrinter::render_error(err),
            };
            JsonPrinter::print(&value)?;
        }
        Format::Human => {
            let printer = HumanPrinter { color };
            match &outcome {
                Ok(result) => printer.print_result(result),
                Err(err) => printer.print_error(err),
            }
        }
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
