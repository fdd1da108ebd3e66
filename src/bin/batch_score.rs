//! Runs one batch scoring pass over the leads index and exits.

use salesforge_leads::batch::BatchScorer;
use salesforge_leads::config::Config;
use salesforge_leads::scoring::ScoreTier;
use salesforge_leads::search_client::ElasticsearchClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let store = ElasticsearchClient::new(
        config.elasticsearch_url.clone(),
        config.elasticsearch_api_key.clone(),
    )?;

    let report = BatchScorer::new(&store, &config).run().await?;

    tracing::info!("Scoring summary for session {}:", report.session_id);
    for (tier, count) in [
        (ScoreTier::Hot, report.hot),
        (ScoreTier::Warm, report.warm),
        (ScoreTier::Cold, report.cold),
    ] {
        tracing::info!(
            "  {}: {} leads ({:.0}%)",
            tier,
            count,
            report.percentage(tier)
        );
    }

    if report.has_failures() {
        anyhow::bail!(
            "batch {} finished with {} update failures and {} audit failures",
            report.session_id,
            report.update_failures,
            report.audit_failures
        );
    }

    Ok(())
}
