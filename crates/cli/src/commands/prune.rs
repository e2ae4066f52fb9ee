//! Manual prune through the collector

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{print_success, OutputFormat};

/// Ask the collector to prune `instance`
pub async fn prune_instance(
    client: &ApiClient,
    instance: &str,
    format: OutputFormat,
) -> Result<()> {
    let reply = client
        .post_query("api/prune", &[("instance", instance)])
        .await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "instance": instance,
                "status": "pruned",
                "message": reply.trim(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            print_success(&format!("{}: {}", instance, reply.trim()));
        }
    }

    Ok(())
}
