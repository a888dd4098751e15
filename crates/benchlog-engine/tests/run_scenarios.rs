mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use benchlog_adapters::TimeoutPolicy;
use benchlog_core::{BenchmarkRecord, LogKey, Rating};
use benchlog_engine::{fingerprint, FailureKind, PairResult, RunOrchestrator, RunSettings, RunStatus};
use benchlog_store::{ContinuationToken, LogStore, MemoryLogStore, ScanPage, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use common::{catalog, text, Reply, ScriptedInvoker};
use mockall::mock;
use serde_json::json;

const META: &str = "meta.llama3-8b-instruct-v1:0";
const TITAN: &str = "amazon.titan-text-express-v1";

mock! {
    pub Store {}

    #[async_trait]
    impl LogStore for Store {
        async fn scan_page(
            &self,
            key: &LogKey,
            start: Option<ContinuationToken>,
            limit: usize,
        ) -> StoreResult<ScanPage>;
        async fn put(&self, record: BenchmarkRecord) -> StoreResult<()>;
        async fn set_rating(
            &self,
            key: &LogKey,
            date: DateTime<Utc>,
            rating: Rating,
        ) -> StoreResult<()>;
        async fn scan_all(
            &self,
            start: Option<ContinuationToken>,
            limit: usize,
        ) -> StoreResult<ScanPage>;
    }
}

fn orchestrator(
    store: Arc<dyn LogStore>,
    invoker: Arc<ScriptedInvoker>,
    models: &[&str],
) -> RunOrchestrator {
    RunOrchestrator::new(
        catalog(&[("knowledge_1100", "What is 2+2?")]),
        store,
        invoker,
        RunSettings::default().with_models(models.iter().copied()),
    )
}

#[tokio::test]
async fn unchanged_output_is_not_stored_twice() {
    let store = Arc::new(MemoryLogStore::new());
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(META, text("4"))
            .reply(META, text("4")),
    );
    let run = orchestrator(store.clone(), invoker, &[META]);

    let first = run.run().await.unwrap();
    assert_eq!(first.totals.persisted, 1);
    let records = store.snapshot().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].output_hash, fingerprint("4"));

    let second = run.run().await.unwrap();
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(second.totals.persisted, 0);
    assert_eq!(second.totals.unchanged, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn changed_output_appends_a_later_record() {
    let store = Arc::new(MemoryLogStore::new());
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(META, text("4"))
            .reply(META, text("five")),
    );
    let run = orchestrator(store.clone(), invoker, &[META]);

    run.run().await.unwrap();
    let second = run.run().await.unwrap();
    assert_eq!(second.totals.persisted, 1);

    let records = store.snapshot().await;
    assert_eq!(records.len(), 2);
    assert!(records[1].date > records[0].date);
    assert_eq!(records[1].output_hash, fingerprint("five"));
    assert!(matches!(
        second.pairs[0].result,
        PairResult::Persisted { first: false, .. }
    ));
}

#[tokio::test]
async fn meta_leading_whitespace_is_stripped_before_fingerprinting() {
    let store = Arc::new(MemoryLogStore::new());
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(META, text("4"))
            .reply(META, text("\n  4")),
    );
    let run = orchestrator(store.clone(), invoker, &[META]);

    run.run().await.unwrap();
    let second = run.run().await.unwrap();

    assert_eq!(second.totals.unchanged, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn unknown_family_fails_only_its_own_pairs() {
    let store = Arc::new(MemoryLogStore::new());
    let invoker = Arc::new(ScriptedInvoker::new().reply(META, text("4")));
    let run = orchestrator(store.clone(), invoker.clone(), &["unknown-vendor.v1", META]);

    let report = run.run().await.unwrap();

    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].model_id, "unknown-vendor.v1");
    assert_eq!(report.failures[0].kind, FailureKind::Configuration);
    assert_eq!(invoker.calls_for("unknown-vendor.v1"), 0);

    assert_eq!(report.totals.persisted, 1);
    assert_eq!(store.len().await, 1);
    assert_eq!(report.completion().status, 500);
}

#[tokio::test]
async fn parse_and_invocation_failures_are_reported_per_pair() {
    let store = Arc::new(MemoryLogStore::new());
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(META, Reply::Raw(json!({"outputs": [{"text": "wrong shape"}]})))
            .reply(TITAN, Reply::Fail("503 after retries".into())),
    );
    let run = orchestrator(store.clone(), invoker, &[META, TITAN]);

    let report = run.run().await.unwrap();

    assert_eq!(report.status, RunStatus::PartialFailure);
    let kinds: Vec<_> = report.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FailureKind::AdapterParse, FailureKind::Invocation]);
    assert!(report.failures[0].message.contains("generation"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn slow_model_times_out_and_the_run_continues() {
    let store = Arc::new(MemoryLogStore::new());
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(META, Reply::Hang(Duration::from_secs(5)))
            .reply(TITAN, text("fine")),
    );
    let settings = RunSettings {
        timeouts: TimeoutPolicy::new(Duration::from_millis(50), Duration::from_secs(5)),
        ..RunSettings::default()
    }
    .with_models([META, TITAN]);
    let run = RunOrchestrator::new(
        catalog(&[("knowledge_1100", "What is 2+2?")]),
        store.clone(),
        invoker,
        settings,
    );

    let report = run.run().await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::Timeout);
    assert_eq!(report.totals.persisted, 1);
}

#[tokio::test]
async fn unreachable_store_fails_the_run() {
    let mut store = MockStore::new();
    store
        .expect_scan_page()
        .returning(|_, _, _| Err(StoreError::Unavailable("connection refused".into())));
    store.expect_put().never();

    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(META, text("4"))
            .reply(TITAN, text("4")),
    );
    let run = orchestrator(Arc::new(store), invoker, &[META, TITAN]);

    let report = run.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Failure);
    assert!(report
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::StoreAccess));
    let completion = report.completion();
    assert_eq!(completion.status, 500);
    assert!(completion.message.contains("failure"));
}

#[tokio::test]
async fn failed_write_is_a_store_failure_for_that_pair() {
    let mut store = MockStore::new();
    store
        .expect_scan_page()
        .returning(|_, _, _| Ok(ScanPage::default()));
    store
        .expect_put()
        .times(1)
        .returning(|_| Err(StoreError::Unavailable("throttled".into())));

    let invoker = Arc::new(ScriptedInvoker::new().reply(META, text("4")));
    let report = orchestrator(Arc::new(store), invoker, &[META])
        .run()
        .await
        .unwrap();

    assert_eq!(report.failures[0].kind, FailureKind::StoreAccess);
    assert_eq!(report.status, RunStatus::Failure);
}

#[tokio::test]
async fn parallel_runs_match_sequential_results() {
    let models = [META, TITAN, "mistral.mistral-7b-instruct-v0:2", "anthropic.claude-v2"];
    let prompts = [
        ("code_100", "a"),
        ("code_200", "b"),
        ("creativity_500", "c"),
    ];

    let mut invoker = ScriptedInvoker::new();
    for model in models {
        for (id, _) in prompts {
            invoker = invoker.reply(model, text(&format!("{} says {}", model, id)));
        }
    }

    let store = Arc::new(MemoryLogStore::new());
    let report = RunOrchestrator::new(
        catalog(&prompts),
        store.clone(),
        Arc::new(invoker),
        RunSettings::default().with_models(models).with_parallel(3),
    )
    .run()
    .await
    .unwrap();

    assert!(report.is_success());
    assert_eq!(report.totals.persisted, 12);
    for model in models {
        for (id, _) in prompts {
            assert_eq!(store.count_for(&LogKey::new(model, id)).await, 1);
        }
    }
}
