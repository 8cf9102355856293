use std::io::{self, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{
    generate,
    shells::{Bash, Fish, Zsh},
};

use crate::config::Overrides;

/// Binary name used in generated completion scripts.
pub const COMMAND_NAME: &str = "dashboard-relay";

#[derive(Parser)]
#[command(name = "dashboard-relay")]
#[command(version)]
#[command(about = "Serve a chat + dashboard split view and relay dashboard endpoints between frames")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the parent page, the observer bootstrap and the wasm bundle
    Serve(ServeArgs),

    /// Print the notifications the observer would post for a transcript
    Scan {
        /// Transcript file, one rendered line per text update (stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Default)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the parent page
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Address of the chat application shown in the left pane
    #[arg(long)]
    pub chat_url: Option<String>,

    /// wasm-pack output directory served under /pkg/
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Do not open a browser once listening
    #[arg(long)]
    pub no_open: bool,
}

impl ServeArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            chat_url: self.chat_url.clone(),
            assets_dir: self.assets_dir.clone(),
            no_open: self.no_open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

/// Render a shell completion script for `shell`.
pub fn render_completions(shell: Shell, mut writer: impl Write) -> io::Result<()> {
    let mut command = Args::command();
    match shell {
        Shell::Bash => generate(Bash, &mut command, COMMAND_NAME, &mut writer),
        Shell::Zsh => generate(Zsh, &mut command, COMMAND_NAME, &mut writer),
        Shell::Fish => generate(Fish, &mut command, COMMAND_NAME, &mut writer),
    }
    writer.flush()
}
