use clap::Parser;
use slack_dump::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Dump { output, channel } => slack_dump::commands::run_dump(output, channel),
        Commands::ListChannels => slack_dump::commands::run_list_channels(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
