//! CLI command implementations.

pub mod generate;
pub mod init;
pub mod migrate;
pub mod plan;
pub mod validate;
pub mod version;

use std::path::{Path, PathBuf};

use ddlsort_migrate::{DiffProvider, MigraProvider, TextDiffProvider};
use tokio::io::AsyncReadExt;

use crate::cli::InputArgs;
use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Working directory and loaded configuration shared by all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory relative paths are resolved against
    pub root: PathBuf,
    /// Loaded configuration
    pub config: Config,
}

impl Context {
    /// Load the configuration from `config_path`, or `ddlsort.toml` in the
    /// current directory when it exists.
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        let cwd = std::env::current_dir()?;
        let config = match config_path {
            Some(path) if !path.exists() => {
                return Err(CliError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Config::load(path)?,
            None => Config::load_or_default(&cwd)?,
        };

        let root = config_path
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or(cwd);

        Ok(Self { root, config })
    }

    /// Pick the diff source: a file, stdin, or the configured databases.
    pub async fn diff_provider(&self, input: &InputArgs) -> CliResult<Box<dyn DiffProvider>> {
        if let Some(path) = &input.input {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                CliError::Input(format!("cannot read {}: {}", path.display(), e))
            })?;
            return Ok(Box::new(TextDiffProvider::new(text)));
        }

        if input.stdin {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            return Ok(Box::new(TextDiffProvider::new(text)));
        }

        Ok(Box::new(MigraProvider::new(self.config.migra_config()?)))
    }

    /// Fetch the diff text for `input`.
    pub async fn read_diff(&self, input: &InputArgs) -> CliResult<String> {
        let provider = self.diff_provider(input).await?;
        Ok(provider.diff().await?)
    }
}
