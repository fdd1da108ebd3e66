use serde::Deserialize;

pub const DEFAULT_LEADS_INDEX: &str = "leads-raw";
pub const DEFAULT_ACTIONS_INDEX: &str = "agent-actions-log";
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Elasticsearch rejects a page `size` beyond its default result window.
pub const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub elasticsearch_url: String,
    pub elasticsearch_api_key: Option<String>,
    pub leads_index: String,
    pub actions_index: String,
    pub embedding_base_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    /// Page size used when fetching leads for a batch run.
    pub batch_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            elasticsearch_url: std::env::var("ELASTICSEARCH_URL")
                .map_err(|_| anyhow::anyhow!("ELASTICSEARCH_URL environment variable required"))
                .and_then(|url| validate_http_url("ELASTICSEARCH_URL", url))?,
            elasticsearch_api_key: optional_secret("ELASTICSEARCH_API_KEY"),
            leads_index: index_name("LEADS_INDEX", DEFAULT_LEADS_INDEX)?,
            actions_index: index_name("ACTIONS_INDEX", DEFAULT_ACTIONS_INDEX)?,
            embedding_base_url: std::env::var("EMBEDDING_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| validate_http_url("EMBEDDING_BASE_URL", url))
                .transpose()?
                .unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.to_string()),
            embedding_api_key: optional_secret("EMBEDDING_API_KEY")
                .or_else(|| optional_secret("OPENAI_API_KEY")),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            batch_size: std::env::var("SCORING_BATCH_SIZE")
                .ok()
                .map(|raw| {
                    raw.parse::<usize>()
                        .ok()
                        .filter(|n| (1..=MAX_BATCH_SIZE).contains(n))
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "SCORING_BATCH_SIZE must be a number between 1-{}",
                                MAX_BATCH_SIZE
                            )
                        })
                })
                .transpose()?
                .unwrap_or(DEFAULT_BATCH_SIZE),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Elasticsearch URL: {}", config.elasticsearch_url);
        tracing::debug!(
            "Indices: leads='{}', actions='{}'",
            config.leads_index,
            config.actions_index
        );
        tracing::debug!(
            "Embedding service: {} (model {})",
            config.embedding_base_url,
            config.embedding_model
        );
        if config.embedding_api_key.is_none() {
            tracing::warn!("No embedding API key configured; similarity by text will fail");
        }
        tracing::debug!("Batch size: {}", config.batch_size);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn validate_http_url(name: &str, raw: String) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn optional_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn index_name(name: &str, default: &str) -> anyhow::Result<String> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => anyhow::bail!("{} cannot be empty", name),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}
