//! ddlsort - order schema-diff DDL into versioned migrations.

use clap::Parser;

use ddlsort_cli::cli::{Cli, Command};
use ddlsort_cli::commands::{self, Context};
use ddlsort_cli::error::CliResult;
use ddlsort_cli::{logging, output};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Init(args) => commands::init::run(args).await,
        Command::Version => commands::version::run().await,
        command => {
            let ctx = Context::load(cli.config.as_deref())?;
            match command {
                Command::Plan(args) => commands::plan::run(args, &ctx).await,
                Command::Generate(args) => commands::generate::run(args, &ctx).await,
                Command::Validate(args) => commands::validate::run(args, &ctx).await,
                Command::Migrate(args) => commands::migrate::run(args, &ctx).await,
                Command::Init(_) | Command::Version => Ok(()),
            }
        }
    }
}
