use clap::{ArgGroup, Parser, ValueEnum};

use crate::dispatch::InvocationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

impl Format {
    pub fn from_config_value(v: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(v, true).ok()
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "secure-env-vars",
    about = "Run a command or script on targets with environment variables taken from BOLT_ENV_VARS",
    version
)]
#[command(group(ArgGroup::new("color_switch").args(["color", "no_color"]).multiple(false)))]
pub struct Cli {
    /// Targets to run on. Repeat the flag or separate with commas.
    #[arg(short = 't', long = "targets", required = true, value_delimiter = ',', action = clap::ArgAction::Append)]
    pub targets: Vec<String>,

    /// Command to run. Mutually exclusive with --script.
    ///
    /// Conflicts are reported by the action itself rather than by argument
    /// parsing, so both flags are accepted here.
    #[arg(short = 'c', long)]
    pub command: Option<String>,

    /// Script to run: a file path or a `module/file` reference resolved
    /// through MODULEPATH.
    #[arg(short = 's', long)]
    pub script: Option<String>,

    /// Output format (defaults to DEFAULT_FORMAT from config).
    #[arg(long, value_enum)]
    pub format: Option<Format>,

    /// Directory searched for `module/file` scripts. Can be repeated.
    #[arg(long = "modulepath", action = clap::ArgAction::Append)]
    pub modulepath: Vec<String>,

    /// Per-target timeout in seconds; 0 waits without a limit.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Override the local shell (auto|sh|bash|zsh|powershell|cmd).
    #[arg(long = "shell")]
    pub shell: Option<String>,

    /// Force colored output.
    #[arg(long)]
    pub color: bool,
    /// Disable colored output.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn request(&self) -> InvocationRequest {
        InvocationRequest {
            targets: self
                .targets
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            command: self.command.clone(),
            script: self.script.clone(),
        }
    }
}
