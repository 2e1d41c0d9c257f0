//! Switchboard Core Integration Tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use switchboard_core::{
    Error,
    config::Config,
    profiles::{ProfileCatalog, WEIGHT_SUM_TOLERANCE, WeightProfileStore},
    registry::{
        Capability, Certification, ReadinessTier, RegistrySnapshot, SharedRegistry, Worker,
        WorkerClass,
    },
    scoring::{ComplianceScorer, Scorer, ScoringContext},
    selection::{
        Domain, FilterPredicate, MemoryTraceSink, OptimizationPreference, RequestContext,
        SelectionEngine, SelectionResult,
    },
};

const CAPABILITIES: [Capability; 4] = [
    Capability::Streaming,
    Capability::ToolUse,
    Capability::Vision,
    Capability::JsonMode,
];

const CERTIFICATIONS: [Certification; 3] =
    [Certification::Hipaa, Certification::Soc2, Certification::Gdpr];

fn generated_pool(seed: u64, size: usize, prefix: &str) -> Vec<Worker> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|i| {
            let capabilities: Vec<Capability> = CAPABILITIES
                .iter()
                .copied()
                .filter(|_| rng.gen_bool(0.7))
                .collect();
            let certifications: Vec<Certification> = CERTIFICATIONS
                .iter()
                .copied()
                .filter(|_| rng.gen_bool(0.4))
                .collect();
            let readiness = match rng.gen_range(0..4) {
                0 => ReadinessTier::Warm,
                1 => ReadinessTier::Scaling,
                2 => ReadinessTier::Cold,
                _ => ReadinessTier::Hot,
            };
            Worker::new(format!("{prefix}/w{i:03}"), prefix)
                .with_quality(rng.gen_range(50.0..99.0))
                .with_pricing(rng.gen_range(0.1..15.0), rng.gen_range(0.3..60.0))
                .with_latency_ms(rng.gen_range(150..4000))
                .with_reliability(rng.gen_range(95.0..100.0), rng.gen_range(0.0..0.05))
                .with_capabilities(capabilities)
                .with_certifications(certifications)
                .with_readiness(readiness)
                .with_benchmark(Capability::Vision, rng.gen_range(40.0..100.0))
        })
        .collect()
}

fn engine_for(workers: Vec<Worker>) -> SelectionEngine {
    let mut config = Config::default();
    config.engine.latency_budget_ms = 60_000;
    SelectionEngine::builder()
        .config(config)
        .registry(Arc::new(SharedRegistry::new(RegistrySnapshot::new(1, workers))))
        .trace_sink(Arc::new(MemoryTraceSink::new()))
        .build()
        .unwrap()
}

#[test]
fn test_every_catalog_profile_sums_to_one() {
    let catalog = ProfileCatalog::builtin().unwrap();
    assert_eq!(catalog.len(), 14);
    for profile in catalog.all() {
        assert!((profile.weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
    }
}

#[tokio::test]
async fn test_selection_is_deterministic() {
    let engine = engine_for(generated_pool(42, 200, "pool"));
    let request = RequestContext::new()
        .with_capabilities([Capability::Streaming])
        .with_domain(Domain::Coding);

    let first = engine.select(&request).await.unwrap();
    for _ in 0..5 {
        let again = engine.select(&request).await.unwrap();
        assert_eq!(again.primary, first.primary);
        assert_eq!(again.fallbacks, first.fallbacks);
        assert_eq!(again.composite_score, first.composite_score);
        assert_eq!(again.scores, first.scores);
    }
    assert!(!first.metadata.partial_scoring);
}

#[tokio::test]
async fn test_missing_capability_worker_never_selected() {
    let caps = [Capability::Streaming, Capability::ToolUse];
    let workers = vec![
        Worker::new("a", "p").with_capabilities(caps).with_quality(70.0),
        Worker::new("b", "p").with_capabilities(caps).with_quality(75.0),
        // Best on paper, but lacks tool use
        Worker::new("c", "p")
            .with_capabilities([Capability::Streaming])
            .with_quality(99.0)
            .with_pricing(0.01, 0.01)
            .with_latency_ms(100),
        Worker::new("d", "p").with_capabilities(caps).with_quality(80.0),
        Worker::new("e", "p").with_capabilities(caps).with_quality(65.0),
    ];
    let engine = engine_for(workers);

    let result = engine
        .select(&RequestContext::new().with_capabilities(caps))
        .await
        .unwrap();

    assert_eq!(result.metadata.candidates_eligible, 4);
    assert_ne!(result.primary, "c");
    assert!(result.chain().all(|id| id != "c"));
}

#[tokio::test]
async fn test_healthcare_domain_enforces_floor_and_certification() {
    let workers = vec![
        Worker::new("certified-strong", "p")
            .with_quality(88.0)
            .with_certifications([Certification::Hipaa]),
        Worker::new("certified-weak", "p")
            .with_quality(70.0)
            .with_certifications([Certification::Hipaa]),
        Worker::new("uncertified", "p").with_quality(95.0),
    ];
    let engine = engine_for(workers);

    let result = engine
        .select(&RequestContext::new().with_domain(Domain::Healthcare))
        .await
        .unwrap();

    assert_eq!(result.profile.id, "healthcare");
    assert_eq!(result.primary, "certified-strong");
    assert!(result.fallbacks.is_empty());
}

#[tokio::test]
async fn test_detected_domain_from_content() {
    let workers = vec![
        Worker::new("hipaa", "p")
            .with_quality(90.0)
            .with_certifications([Certification::Hipaa]),
    ];
    let engine = engine_for(workers);

    let request = RequestContext::new()
        .with_content("Summarize the patient's symptoms and current medication dosage");
    let result = engine.select(&request).await.unwrap();

    assert_eq!(result.profile.id, "healthcare");
}

#[tokio::test]
async fn test_explicit_profile_always_wins() {
    let engine = engine_for(generated_pool(7, 40, "pool"));
    let catalog = ProfileCatalog::builtin().unwrap();

    for profile in catalog.all() {
        // Profiles with hard constraints may legitimately eliminate everyone
        if profile.forced_class.is_some() || !profile.required_certifications.is_empty() {
            continue;
        }
        for domain in [Domain::Healthcare, Domain::Creative] {
            for preference in [OptimizationPreference::Cost, OptimizationPreference::Quality] {
                let request = RequestContext::new()
                    .with_profile(profile.id.clone())
                    .with_domain(domain)
                    .with_optimization(preference);
                let result = engine.select(&request).await.unwrap();
                assert_eq!(result.profile.id, profile.id);
            }
        }
    }
}

#[tokio::test]
async fn test_zero_budget_still_selects() {
    let mut config = Config::default();
    config.engine.latency_budget_ms = 0;
    config.engine.partial_scoring_cap = 8;
    let engine = SelectionEngine::builder()
        .config(config)
        .registry(Arc::new(SharedRegistry::new(RegistrySnapshot::new(
            1,
            generated_pool(3, 100, "pool"),
        ))))
        .trace_sink(Arc::new(MemoryTraceSink::new()))
        .build()
        .unwrap();

    let result = engine.select(&RequestContext::new()).await.unwrap();

    assert!(result.metadata.partial_scoring);
    assert!(!result.primary.is_empty());
    assert!(result.metadata.candidates_scored <= 8);
}

#[tokio::test]
async fn test_no_eligible_worker_has_breakdown() {
    let engine = engine_for(generated_pool(11, 20, "pool"));

    let request = RequestContext::new().with_capabilities([Capability::Audio]);
    let err = engine.select(&request).await.unwrap_err();

    let Error::NoEligibleWorker { reason, breakdown } = err else {
        panic!("expected NoEligibleWorker");
    };
    assert_eq!(reason, FilterPredicate::Capability);
    assert_eq!(breakdown.total, 20);
    assert_eq!(breakdown.total_eliminated(), 20);
    assert!(breakdown.count(FilterPredicate::Capability) > 0);
}

#[tokio::test]
async fn test_empty_registry_is_no_eligible_worker() {
    let engine = engine_for(Vec::new());
    let err = engine.select(&RequestContext::new()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::NoEligibleWorker {
            reason: FilterPredicate::Registry,
            ..
        }
    ));
    assert_eq!(err.code(), "E001");
}

#[tokio::test]
async fn test_forced_class_profile() {
    let workers = vec![
        Worker::new("fast", "p").with_class(WorkerClass::Fast).with_quality(99.0),
        Worker::new("thinker", "p")
            .with_class(WorkerClass::HighReasoning)
            .with_quality(80.0),
    ];
    let engine = engine_for(workers);

    let result = engine
        .select(&RequestContext::new().with_domain(Domain::Scientific))
        .await
        .unwrap();
    assert_eq!(result.primary, "thinker");
}

#[test]
fn test_compliance_scores_full_only_with_every_certification() {
    let catalog = ProfileCatalog::builtin().unwrap();
    let financial = catalog.get_profile("financial").unwrap();
    let request = RequestContext::new().with_certifications([Certification::Gdpr]);
    let ctx = ScoringContext::new(request, Config::default().scoring)
        .with_required_certifications(financial.required_certifications.iter().copied());

    let exact = Worker::new("exact", "p").with_certifications([
        Certification::Gdpr,
        Certification::Soc2,
        Certification::PciDss,
    ]);
    let all = Worker::new("all", "p").with_certifications([
        Certification::Gdpr,
        Certification::Soc2,
        Certification::PciDss,
        Certification::Iso27001,
        Certification::Hipaa,
    ]);
    let partial =
        Worker::new("partial", "p").with_certifications([Certification::Gdpr, Certification::Soc2]);

    let exact_score = ComplianceScorer.score(&exact, &ctx).unwrap();
    let partial_score = ComplianceScorer.score(&partial, &ctx).unwrap();
    assert_eq!(ComplianceScorer.score(&all, &ctx).unwrap(), 100.0);
    assert!(exact_score < 100.0);
    assert!(partial_score < exact_score);
}

#[tokio::test]
async fn test_extra_certifications_break_healthcare_ties() {
    // Identical except for certifications beyond the required HIPAA
    let workers = vec![
        Worker::new("bare", "p")
            .with_quality(90.0)
            .with_certifications([Certification::Hipaa]),
        Worker::new("rich", "p").with_quality(90.0).with_certifications([
            Certification::Hipaa,
            Certification::Soc2,
            Certification::Gdpr,
            Certification::Iso27001,
        ]),
    ];
    let engine = engine_for(workers);

    let result = engine
        .select(&RequestContext::new().with_domain(Domain::Healthcare))
        .await
        .unwrap();

    assert_eq!(result.primary, "rich");
    assert_eq!(result.scores.compliance, 100.0);
    assert_eq!(result.fallbacks, ["bare"]);
}

#[tokio::test]
async fn test_selection_result_round_trip() {
    let engine = engine_for(generated_pool(5, 30, "pool"));
    let result = engine
        .select(&RequestContext::new().with_optimization(OptimizationPreference::Quality))
        .await
        .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let decoded: SelectionResult = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded.scores, result.scores);
    assert_eq!(decoded.fallbacks, result.fallbacks);
    assert_eq!(decoded, result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_selects_during_registry_swap() {
    let registry = SharedRegistry::new(RegistrySnapshot::new(1, generated_pool(1, 30, "g1")));
    let mut config = Config::default();
    config.engine.latency_budget_ms = 60_000;
    let engine = Arc::new(
        SelectionEngine::builder()
            .config(config)
            .registry(Arc::new(registry.clone()))
            .trace_sink(Arc::new(MemoryTraceSink::new()))
            .build()
            .unwrap(),
    );

    let publisher = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for _ in 0..10 {
                let next = registry.version() + 1;
                registry
                    .publish(generated_pool(next, 30, &format!("g{next}")))
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut selections = Vec::new();
    for _ in 0..32 {
        let engine = Arc::clone(&engine);
        selections.push(tokio::spawn(async move {
            engine.select(&RequestContext::new()).await
        }));
    }

    publisher.await.unwrap();
    for selection in selections {
        let result = selection.await.unwrap().unwrap();
        // Every id in the result comes from the snapshot version it reports
        let prefix = format!("g{}/", result.metadata.registry_version);
        assert!(result.chain().all(|id| id.starts_with(&prefix)));
    }
    assert_eq!(registry.version(), 11);
}
