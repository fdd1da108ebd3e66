//! Imports a JSON file of leads into the leads index.
//!
//! Usage: `bulk_index <file.json> [--no-embeddings]` (or set `LEADS_FILE`).

use salesforge_leads::config::Config;
use salesforge_leads::embedding::{Embedder, EmbeddingClient};
use salesforge_leads::models::{parse_lead_file, Lead};
use salesforge_leads::search_client::{ElasticsearchClient, LeadStore};
use serde_json::Value;
use std::env;

/// Main entry point for the bulk import tool.
///
/// Loads the leads, embeds their descriptions in one batch call, and indexes
/// them under deterministic ids so a re-import overwrites instead of duplicating.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let skip_embeddings = args.iter().any(|a| a == "--no-embeddings");
    let file = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .or_else(|| env::var("LEADS_FILE").ok())
        .ok_or_else(|| anyhow::anyhow!("Usage: bulk_index <file.json> [--no-embeddings]"))?;

    let config = Config::from_env()?;
    let store = ElasticsearchClient::new(
        config.elasticsearch_url.clone(),
        config.elasticsearch_api_key.clone(),
    )?;

    let raw = tokio::fs::read_to_string(&file).await?;
    let mut leads = parse_lead_file(&raw)
        .map_err(|e| anyhow::anyhow!("{} must be a list of leads or {{\"leads\": [...]}}: {}", file, e))?;
    tracing::info!("Loaded {} leads from {}", leads.len(), file);

    if skip_embeddings {
        tracing::info!("Skipping embeddings (--no-embeddings)");
    } else if config.embedding_api_key.is_none() {
        tracing::warn!("No embedding API key configured, skipping embeddings");
    } else {
        let embedder = EmbeddingClient::new(&config)?;
        add_embeddings(&embedder, &mut leads).await?;
    }

    let docs = leads
        .iter()
        .map(|lead| Ok((lead.document_id(), serde_json::to_value(lead)?)))
        .collect::<Result<Vec<(String, Value)>, serde_json::Error>>()?;

    let outcome = store.bulk_index(&config.leads_index, &docs).await?;
    tracing::info!(
        "Indexed: {}, Errors: {}",
        outcome.succeeded,
        outcome.failed.len()
    );
    for (id, reason) in outcome.failed.iter().take(5) {
        tracing::warn!("  Error indexing {}: {}", id, reason);
    }

    store.refresh(&config.leads_index).await?;
    tracing::info!("Refreshed '{}'", config.leads_index);

    Ok(())
}

async fn add_embeddings(embedder: &EmbeddingClient, leads: &mut [Lead]) -> anyhow::Result<()> {
    let (positions, texts): (Vec<usize>, Vec<String>) = leads
        .iter()
        .enumerate()
        .filter(|(_, lead)| !lead.embedding_text().trim().is_empty())
        .map(|(i, lead)| (i, lead.embedding_text().to_string()))
        .unzip();

    if texts.is_empty() {
        return Ok(());
    }

    let vectors = embedder.embed_batch(&texts).await?;
    for (position, vector) in positions.into_iter().zip(vectors) {
        leads[position].company_description_vector = Some(vector);
    }

    tracing::info!("Added embeddings for {} leads", texts.len());
    Ok(())
}
