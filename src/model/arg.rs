use clap::Parser;

/// Reverse proxy for a chat-completion API, multiplexing a pool of upstream credentials.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON state file backing the credential/proxy registries.
    ///
    /// Overrides the `STATE_FILE` environment variable.
    #[arg(long)]
    pub state_file: Option<String>,

    /// Listen port. Overrides the `PORT` environment variable.
    #[arg(short, long)]
    pub port: Option<u16>,
}
