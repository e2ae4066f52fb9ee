//! Listing of the snapshots held by the collector

use anyhow::Result;
use chrono::Utc;
use tabled::Tabled;

use crate::client::{ApiClient, InstanceStats};
use crate::output::{color_size, format_age, print_table, OutputFormat};

/// Row for the instances table
#[derive(Tabled, serde::Serialize)]
struct InstanceRow {
    #[tabled(rename = "Instance")]
    instance_id: String,
    #[tabled(rename = "Images (GB)")]
    images_size_gb: String,
    #[tabled(rename = "Last Update")]
    timestamp: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Pruned")]
    prune_action: String,
}

/// List every instance with a current snapshot
pub async fn list_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats: Vec<InstanceStats> = client.get("api/docker-stats").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Table => {
            let now = Utc::now();
            let rows: Vec<InstanceRow> = stats
                .into_iter()
                .map(|s| InstanceRow {
                    age: format_age(&s.timestamp, now),
                    images_size_gb: color_size(s.images_size_gb),
                    prune_action: if s.prune_action { "yes" } else { "no" }.to_string(),
                    instance_id: s.instance_id,
                    timestamp: s.timestamp,
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
