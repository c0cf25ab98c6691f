//! `ddlsort init` command - Create a ddlsort.toml.

use crate::cli::InitArgs;
use crate::config::{CONFIG_FILE_NAME, Config};
use crate::error::{CliError, CliResult};
use crate::output::{self, success};

/// Run the init command
pub async fn run(args: InitArgs) -> CliResult<()> {
    output::header("Initialize ddlsort");

    tokio::fs::create_dir_all(&args.path).await?;
    let path = args.path.join(CONFIG_FILE_NAME);

    if path.exists() && !args.force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let mut config = Config::default();
    config.database.source_url = args.source_url;
    config.database.target_url = args.target_url;
    config.save(&path)?;

    success(&format!("Created {}", path.display()));
    output::newline();
    output::section("Next steps");
    output::list_item("Set database.source_url and database.target_url (${VAR} is expanded)");
    output::list_item("Run `ddlsort plan` to review the execution order");
    output::list_item("Run `ddlsort migrate` to generate and apply migrations");

    Ok(())
}
