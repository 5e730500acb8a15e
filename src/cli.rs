use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slack-dump")]
#[command(about = "Export Slack channel histories to local JSON snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export every accessible channel's history, thread replies included
    Dump {
        /// Output directory, one subdirectory per channel
        /// (defaults to the settings.toml value, or "slack_export")
        #[arg(short, long)]
        output: Option<String>,

        /// Only dump the given channel id (repeatable)
        #[arg(short, long)]
        channel: Vec<String>,
    },

    /// List all channels visible to the token
    ListChannels,
}
