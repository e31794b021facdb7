//! Per-request composition root.
//!
//! One `DataContext` is built per radar request and passed by shared
//! reference to every panel engine. It owns the repository handles and
//! adapter clients for exactly one request; nothing in it survives across
//! requests.

use crate::adapters::{GleifResolver, OpenAireClient, SemanticScholarClient};
use crate::config::Config;
use crate::db;
use crate::repositories::{CordisRepository, PatentRepository};

pub struct DataContext {
    pub config: Config,
    /// None when the patent store file is absent or unreadable.
    pub patent_repo: Option<PatentRepository>,
    /// None when the project store file is absent or unreadable.
    pub cordis_repo: Option<CordisRepository>,
    pub openaire: OpenAireClient,
    pub semantic_scholar: SemanticScholarClient,
    /// None when the resolution cache cannot be opened.
    pub gleif: Option<GleifResolver>,
}

impl DataContext {
    /// Build the composition root. Missing stores are not fatal; the
    /// affected panels degrade with warnings.
    pub async fn build(config: &Config) -> Self {
        let patent_repo = if config.data.patents_db_available() {
            match db::open_read_only(&config.data.patents_db_path).await {
                Ok(pool) => Some(PatentRepository::new(pool)),
                Err(err) => {
                    tracing::warn!("Failed to open patent store: {}", err);
                    None
                },
            }
        } else {
            None
        };

        let cordis_repo = if config.data.cordis_db_available() {
            match db::open_read_only(&config.data.cordis_db_path).await {
                Ok(pool) => Some(CordisRepository::new(pool)),
                Err(err) => {
                    tracing::warn!("Failed to open CORDIS store: {}", err);
                    None
                },
            }
        } else {
            None
        };

        let gleif = match db::open_cache(&config.data.gleif_cache_db_path).await {
            Ok(pool) => match GleifResolver::new(pool).await {
                Ok(resolver) => Some(resolver),
                Err(err) => {
                    tracing::warn!("Failed to initialise GLEIF cache: {}", err);
                    None
                },
            },
            Err(err) => {
                tracing::warn!("Failed to open GLEIF cache: {}", err);
                None
            },
        };

        Self {
            config: config.clone(),
            patent_repo,
            cordis_repo,
            openaire: OpenAireClient::new(
                &config.apis.openaire_access_token,
                &config.apis.openaire_refresh_token,
            ),
            semantic_scholar: SemanticScholarClient::new(&config.apis.semantic_scholar_api_key),
            gleif,
        }
    }
}
