use benchlens_core::config::SourceConfig;
use benchlens_core::context::ReconcileContext;
use benchlens_core::errors::SourceError;
use benchlens_core::model::{Benchmark, PromptOutcome};
use benchlens_core::reconcile::status::ProgressState;
use benchlens_core::retry::RetryPolicy;
use benchlens_core::source::store::StoreSource;
use benchlens_core::source::build_source;
use benchlens_core::storage::Store;
use std::sync::Arc;
use tempfile::tempdir;

fn fixture() -> Benchmark {
    serde_json::from_str(include_str!("fixtures/nightly.json")).unwrap()
}

#[tokio::test]
async fn test_store_backed_context_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = Store::open(&dir.path().join("bench.db"))?;
    store.init_schema()?;
    store.import_benchmark(&fixture())?;

    let ctx = ReconcileContext::new(
        Arc::new(StoreSource::new(store.clone())),
        16,
        RetryPolicy::no_retry(),
    );

    let view = ctx.refresh(42).await?.view().clone();
    assert_eq!(view.label, "nightly-regression");
    assert_eq!(view.state, ProgressState::Complete);

    let out = ctx.sync(42, false).await?;
    assert!(!out.issued);
    assert!(store.pending_requests()?.is_empty());

    let out = ctx.sync(42, true).await?;
    assert!(out.issued);
    // a second forced sync is folded into the pending one
    ctx.sync(42, true).await?;
    assert_eq!(store.pending_requests()?.len(), 1);

    ctx.refresh(42).await?;
    let rerun = ctx.rerun(106).await?;
    assert_eq!(rerun.previous, Some(PromptOutcome::Error));
    assert_eq!(store.pending_requests()?.len(), 2);

    let err = ctx.rerun(999).await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));

    let report = ctx.sync_status(42).await?;
    assert!(report.agrees);
    assert!(!report.backend.sync_needed);

    let stats = store.stats_best_effort()?;
    assert_eq!(stats.benchmarks, Some(1));
    assert_eq!(stats.runs, Some(3));
    assert_eq!(stats.prompt_results, Some(6));
    Ok(())
}

#[tokio::test]
async fn test_unknown_benchmark_is_not_found() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let source = build_source(&SourceConfig::Sqlite {
        path: dir.path().join("nested/state/bench.db"),
    })?;
    let err = source.get_benchmark_details(1).await.unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));
    assert!(!err.is_connection_failure());
    assert!(source.list_benchmarks(true).await?.is_empty());
    Ok(())
}

#[test]
fn test_reimport_keeps_prompt_ids() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    store.import_benchmark(&fixture())?;
    store.import_benchmark(&fixture())?;

    let loaded = store.load_benchmark(42)?.unwrap();
    let ids: Vec<i64> = loaded
        .runs
        .iter()
        .flat_map(|r| r.prompts.iter().filter_map(|p| p.id))
        .collect();
    assert_eq!(ids, vec![101, 102, 103, 104, 105, 106]);
    assert_eq!(store.list_benchmarks()?.len(), 1);
    Ok(())
}
