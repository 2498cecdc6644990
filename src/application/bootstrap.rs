use crate::application::gate::SignalGate;
use crate::application::governor::RateGovernor;
use crate::application::orchestrator::DailyOrchestrator;
use crate::application::scoring::{EnsembleScorer, ModelArtifacts};
use crate::application::simulator::TradeSimulator;
use crate::application::tracker::LifecycleTracker;
use crate::config::Config;
use crate::domain::ports::MarketDataProvider;
use crate::infrastructure::client_factory::HttpClientFactory;
use crate::infrastructure::provider::{RestFeatureProvider, RestMarketDataProvider};
use crate::infrastructure::store::JsonSignalStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Wired engine components, built once at startup.
pub struct Engine {
    pub orchestrator: DailyOrchestrator,
    pub simulator: TradeSimulator,
    pub store: Arc<JsonSignalStore>,
    pub symbols: Vec<String>,
}

/// Build the engine from configuration.
///
/// A missing or corrupt artifact directory is not fatal here: the daily run
/// still resolves and reports, only generation is disabled for the day.
pub fn build_engine(config: &Config) -> Result<Engine> {
    let store = Arc::new(
        JsonSignalStore::open(config.store_path.clone())
            .with_context(|| format!("opening signal store at {}", config.store_path.display()))?,
    );

    let governor = Arc::new(RateGovernor::new(config.governor_config()));
    let client = HttpClientFactory::create_client();

    let market_data: Arc<dyn MarketDataProvider> = Arc::new(RestMarketDataProvider::new(
        client.clone(),
        config.market_data_base_url.clone(),
        config.provider_api_key.clone(),
        governor.clone(),
    ));
    let features = Arc::new(RestFeatureProvider::new(
        client,
        config.feature_base_url.clone(),
        config.provider_api_key.clone(),
        governor,
    ));

    let scorer = match ModelArtifacts::load(&config.artifact_dir) {
        Ok(artifacts) => {
            let scorer = EnsembleScorer::new(artifacts);
            info!(
                version = scorer.artifact_version(),
                features = scorer.feature_names().len(),
                "model artifacts loaded"
            );
            Some(scorer)
        }
        Err(e) => {
            error!(error = %e, dir = %config.artifact_dir.display(), "model artifacts unusable, signal generation disabled");
            None
        }
    };

    let calendar = config.calendar();
    let costs = config.cost_model();
    let tracker = LifecycleTracker::new(
        market_data.clone(),
        calendar.clone(),
        costs,
        config.expiry_sessions,
    );
    let simulator = TradeSimulator::new(market_data, calendar.clone(), costs);

    let orchestrator = DailyOrchestrator::new(
        calendar,
        tracker,
        scorer,
        SignalGate::with_default_tiers(),
        features,
        store.clone(),
        config.annualize_sharpe,
    );

    Ok(Engine {
        orchestrator,
        simulator,
        store,
        symbols: config.symbols.clone(),
    })
}
