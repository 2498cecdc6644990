//! End-to-end daily runs over scripted providers and a real artifact
//! directory on disk.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use smartcore::ensemble::random_forest_regressor::RandomForestRegressorParameters;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use surgecast::application::gate::SignalGate;
use surgecast::application::orchestrator::{DailyOrchestrator, StepStatus};
use surgecast::application::scoring::{
    ArtifactManifest, EnsembleScorer, MemberDescriptor, ModelArtifacts, SurgeModel,
};
use surgecast::application::tracker::{DEFAULT_EXPIRY_SESSIONS, LifecycleTracker};
use surgecast::config::Config;
use surgecast::domain::calendar::TradingCalendar;
use surgecast::domain::costs::CostModel;
use surgecast::domain::repositories::SignalRepository;
use surgecast::domain::types::{FeatureVector, SignalStatus};
use surgecast::infrastructure::mock::{MockFeatureProvider, MockMarketData};
use surgecast::infrastructure::store::MemorySignalStore;
use uuid::Uuid;

const FEATURES: [&str; 4] = ["gap_pct", "rel_volume", "rsi", "range_pct"];

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn fit_constant_model(target: f64) -> SurgeModel {
    let x = DenseMatrix::from_2d_vec(&vec![
        vec![0.0, 0.0, 0.0, 0.0],
        vec![1.0, 1.0, 1.0, 1.0],
        vec![0.5, 0.2, 0.7, 0.1],
        vec![0.9, 0.4, 0.3, 0.8],
        vec![0.1, 0.8, 0.6, 0.2],
    ])
    .unwrap();
    let y = vec![target; 5];
    SurgeModel::fit(
        &x,
        &y,
        RandomForestRegressorParameters::default()
            .with_n_trees(5)
            .with_seed(7),
    )
    .unwrap()
}

/// Write a two-member artifact set to a fresh temp directory and return its
/// path. Both members predict `target`, so the ensemble output is `target`.
fn write_artifact_dir(target: f64) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("surgecast-artifacts-{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();

    let feature_names: Vec<String> = FEATURES.iter().map(|s| s.to_string()).collect();
    let members = vec![
        MemberDescriptor {
            model_id: "rf-0".to_string(),
            file: "rf-0.json".to_string(),
            weight: 0.6,
        },
        MemberDescriptor {
            model_id: "rf-1".to_string(),
            file: "rf-1.json".to_string(),
            weight: 0.4,
        },
    ];
    for member in &members {
        let model = fit_constant_model(target);
        fs::write(dir.join(&member.file), serde_json::to_string(&model).unwrap()).unwrap();
    }
    let manifest = ArtifactManifest {
        version: "2024.04.01".to_string(),
        feature_list_sha256: ArtifactManifest::feature_hash(&feature_names),
        feature_names,
        members,
    };
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    dir
}

fn full_row(ticker: &str, as_of: NaiveDate) -> FeatureVector {
    FeatureVector {
        ticker: ticker.to_string(),
        as_of_date: as_of,
        features: FEATURES
            .iter()
            .map(|name| (name.to_string(), 0.5))
            .collect::<HashMap<_, _>>(),
    }
}

fn orchestrator(
    market: Arc<MockMarketData>,
    features: Arc<MockFeatureProvider>,
    store: Arc<MemorySignalStore>,
    scorer: Option<EnsembleScorer>,
) -> DailyOrchestrator {
    let calendar = TradingCalendar::default();
    let costs = CostModel::new(dec!(0.005), dec!(0.001), dec!(0.50));
    let tracker = LifecycleTracker::new(
        market,
        calendar.clone(),
        costs,
        DEFAULT_EXPIRY_SESSIONS,
    );
    DailyOrchestrator::new(
        calendar,
        tracker,
        scorer,
        SignalGate::with_default_tiers(),
        features,
        store,
        false,
    )
}

#[tokio::test]
async fn test_full_daily_run_issues_and_later_resolves_signals() {
    let artifact_dir = write_artifact_dir(0.97);
    let scorer = EnsembleScorer::new(ModelArtifacts::load(&artifact_dir).unwrap());

    let market = Arc::new(MockMarketData::new());
    let features = Arc::new(MockFeatureProvider::new());
    let store = Arc::new(MemorySignalStore::new());
    let universe = vec!["SURG".to_string(), "MISS".to_string()];

    // Monday: features available for both tickers
    let monday = date("2024-04-01");
    features.add_row(full_row("SURG", monday));
    features.add_row(full_row("MISS", monday));

    let orch = orchestrator(market.clone(), features.clone(), store.clone(), Some(scorer));
    let report = orch.run(monday, &universe).await;

    assert!(report.all_steps_completed());
    assert_eq!(report.new_signals, 2);
    let signals = store.all_signals().unwrap();
    assert_eq!(signals.len(), 2);
    for signal in &signals {
        assert_eq!(signal.status, SignalStatus::Pending);
        assert!((signal.probability - 0.97).abs() < 1e-9);
        assert_eq!(signal.tier, 0.95);
    }
    assert!(store.run_completed(monday).unwrap());

    // Tuesday: bars arrive, one surges (0.10 -> 0.16), one does not
    let tuesday = date("2024-04-02");
    market.add_bar("SURG", monday, dec!(0.10), dec!(0.10));
    market.add_bar("SURG", tuesday, dec!(0.10), dec!(0.16));
    market.add_bar("MISS", monday, dec!(1.00), dec!(1.00));
    market.add_bar("MISS", tuesday, dec!(1.00), dec!(1.10));
    features.add_row(full_row("SURG", tuesday));
    features.add_row(full_row("MISS", tuesday));

    let report = orch.run(tuesday, &universe).await;
    assert!(report.all_steps_completed());

    let by_ticker: HashMap<String, SignalStatus> = store
        .all_signals()
        .unwrap()
        .into_iter()
        .filter(|s| s.issue_date == monday)
        .map(|s| (s.ticker.clone(), s.status))
        .collect();
    assert_eq!(by_ticker["SURG"], SignalStatus::ResolvedSuccess);
    assert_eq!(by_ticker["MISS"], SignalStatus::ResolvedFail);
    assert_eq!(store.trades().unwrap().len(), 2);

    // Tuesday also issued its own fresh pending signals
    let pending = store.pending_signals().unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|s| s.issue_date == tuesday));

    fs::remove_dir_all(artifact_dir).ok();
}

#[tokio::test]
async fn test_second_same_day_invocation_is_a_no_op() {
    let artifact_dir = write_artifact_dir(0.97);
    let scorer = EnsembleScorer::new(ModelArtifacts::load(&artifact_dir).unwrap());

    let features = Arc::new(MockFeatureProvider::new());
    let store = Arc::new(MemorySignalStore::new());
    let monday = date("2024-04-01");
    features.add_row(full_row("SURG", monday));

    let orch = orchestrator(
        Arc::new(MockMarketData::new()),
        features,
        store.clone(),
        Some(scorer),
    );
    let universe = vec!["SURG".to_string()];

    let first = orch.run(monday, &universe).await;
    assert!(first.all_steps_completed());
    let signals_after_first = store.all_signals().unwrap();

    let second = orch.run(monday, &universe).await;
    assert!(second.already_completed);
    assert!(second.steps.is_empty());
    assert_eq!(store.all_signals().unwrap(), signals_after_first);

    fs::remove_dir_all(artifact_dir).ok();
}

#[tokio::test]
async fn test_generation_never_reads_future_features() {
    let artifact_dir = write_artifact_dir(0.97);
    let scorer = EnsembleScorer::new(ModelArtifacts::load(&artifact_dir).unwrap());

    // Feature history ends Friday; running Monday must fail generation
    // rather than quietly scoring stale or fabricated rows.
    let features = Arc::new(MockFeatureProvider::with_latest_available(date("2024-03-29")));
    features.add_row(full_row("SURG", date("2024-03-29")));
    let store = Arc::new(MemorySignalStore::new());

    let orch = orchestrator(
        Arc::new(MockMarketData::new()),
        features,
        store.clone(),
        Some(scorer),
    );

    let report = orch.run(date("2024-04-01"), &["SURG".to_string()]).await;
    let generate = report
        .steps
        .iter()
        .find(|s| s.name == "generate")
        .unwrap();
    assert_eq!(generate.status, StepStatus::Failed);
    assert!(store.all_signals().unwrap().is_empty());
    assert!(!store.run_completed(date("2024-04-01")).unwrap());

    fs::remove_dir_all(artifact_dir).ok();
}

#[tokio::test]
async fn test_low_coverage_universe_member_gets_no_signal() {
    let artifact_dir = write_artifact_dir(0.97);
    let scorer = EnsembleScorer::new(ModelArtifacts::load(&artifact_dir).unwrap());

    let features = Arc::new(MockFeatureProvider::new());
    let store = Arc::new(MemorySignalStore::new());
    let monday = date("2024-04-01");
    features.add_row(full_row("GOOD", monday));
    features.add_row(FeatureVector {
        ticker: "THIN".to_string(),
        as_of_date: monday,
        features: HashMap::from([("gap_pct".to_string(), 0.1)]),
    });

    let orch = orchestrator(
        Arc::new(MockMarketData::new()),
        features,
        store.clone(),
        Some(scorer),
    );
    let report = orch
        .run(monday, &["GOOD".to_string(), "THIN".to_string()])
        .await;

    assert!(report.all_steps_completed());
    let signals = store.all_signals().unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].ticker, "GOOD");

    fs::remove_dir_all(artifact_dir).ok();
}

#[test]
fn test_corrupt_member_file_is_fatal_at_load() {
    let artifact_dir = write_artifact_dir(0.97);
    fs::write(artifact_dir.join("rf-1.json"), "{not json").unwrap();

    let err = ModelArtifacts::load(&artifact_dir).unwrap_err();
    assert!(err.to_string().contains("rf-1.json"));

    fs::remove_dir_all(artifact_dir).ok();
}

#[test]
fn test_config_requires_api_key() {
    // Isolated key name per test binary run; from_env is fatal without it
    unsafe { std::env::remove_var("PROVIDER_API_KEY") };
    assert!(Config::from_env().is_err());
}
