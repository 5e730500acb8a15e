use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::export::Exporter;
use crate::settings::Settings;
use crate::slack::SlackClient;
use crate::{load_token, run_stamp_now};

pub fn run_dump(output: Option<String>, channels: Vec<String>) -> Result<()> {
    let token = load_token()?;
    let settings = Settings::load()?;

    let output = output.unwrap_or_else(|| settings.export.output_dir.clone());
    let selected: Option<HashSet<String>> = if channels.is_empty() {
        None
    } else {
        Some(channels.into_iter().collect())
    };

    let client = SlackClient::new(&token)?;
    let exporter = Exporter::new(client, settings.export.export_config());
    let run_stamp = run_stamp_now();

    println!("Exporting channels to {} (run {})...", output, run_stamp);

    let summary = exporter.dump_all(
        Path::new(&output),
        &run_stamp,
        selected.as_ref(),
        Some(&|current, total, name| {
            println!("  [{}/{}] #{}", current, total, name);
        }),
    )?;

    println!(
        "Export completed! {} channels written ({} messages), {} skipped, {} failed.",
        summary.written, summary.total_messages, summary.skipped, summary.failed
    );
    Ok(())
}

pub fn run_list_channels() -> Result<()> {
    let token = load_token()?;
    let settings = Settings::load()?;

    let client = SlackClient::new(&token)?;
    let exporter = Exporter::new(client, settings.export.export_config());

    let channels = exporter.list_all_channels()?;
    for channel in &channels {
        println!(
            "{}  #{}  (is_private={})",
            channel.id, channel.name, channel.is_private
        );
    }
    println!("Found {} channels.", channels.len());
    Ok(())
}
