use benchlens_core::model::{Benchmark, PersistedStatus, PromptOutcome, PromptResult, Run};
use benchlens_core::normalize::latency_ms;
use benchlens_core::reconcile::reconcile;
use benchlens_core::reconcile::status::ProgressState;
use benchlens_core::reconcile::sync::{select_sync, SyncReason};

fn pr(prompt: &str, response: Option<&str>) -> PromptResult {
    PromptResult {
        prompt: prompt.into(),
        response: response.map(String::from),
        cost: 0.01,
        output_tokens: 10,
        latency: 1.0,
        ..Default::default()
    }
}

fn run(model: &str, provider: &str, prompts: Vec<PromptResult>) -> Run {
    Run {
        model_name: model.into(),
        provider: provider.into(),
        prompts,
        ..Default::default()
    }
}

fn benchmark(status: PersistedStatus, runs: Vec<Run>) -> Benchmark {
    Benchmark {
        id: 1,
        label: "props".into(),
        status,
        runs,
        ..Default::default()
    }
}

fn scenario() -> Benchmark {
    benchmark(
        PersistedStatus::Running,
        vec![
            run("gpt-x", "openai", vec![pr("P1", Some("a")), pr("P2", Some(""))]),
            run(
                "gpt-x",
                "openai",
                vec![pr("P1", Some("a")), pr("P2", Some("latest"))],
            ),
            run(
                "claude-y",
                "anthropic",
                vec![
                    pr("P1", Some("b")),
                    PromptResult {
                        outcome: Some(PromptOutcome::Error),
                        error: Some("upstream 500".into()),
                        ..pr("P2", None)
                    },
                ],
            ),
        ],
    )
}

#[test]
fn test_two_model_scenario_completes_despite_running_flag() {
    let view = reconcile(&scenario());

    let gpt = view.model("gpt-x").unwrap();
    assert_eq!((gpt.completed, gpt.total), (2, 2));
    assert_eq!(gpt.fragments, 2);
    assert_eq!(gpt.state, ProgressState::Complete);
    let p2 = gpt.prompts.iter().find(|p| p.prompt == "P2").unwrap();
    assert_eq!(p2.outcome, PromptOutcome::Success);
    assert_eq!(p2.fragment, 1);

    let claude = view.model("claude-y").unwrap();
    assert_eq!((claude.completed, claude.total), (2, 2));
    assert_eq!((claude.succeeded, claude.errored), (1, 1));
    assert_eq!(claude.state, ProgressState::Complete);

    assert_eq!((view.prompts_complete, view.prompts_total), (2, 2));
    assert_eq!((view.models_complete, view.models_total), (2, 2));
    assert_eq!(view.state, ProgressState::Complete);
    assert!(view.status_overridden);
}

#[test]
fn test_reconcile_is_idempotent() {
    let raw = scenario();
    let a = reconcile(&raw);
    let b = reconcile(&raw);
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn test_fragments_yield_one_view_with_distinct_prompt_total() {
    let view = reconcile(&benchmark(
        PersistedStatus::Running,
        vec![
            run("m", "p", vec![pr("A", None), pr("B", None)]),
            run("m", "p", vec![pr("B", Some("x")), pr("C", None)]),
            run("m", "p", vec![pr("A", Some("y"))]),
        ],
    ));
    assert_eq!(view.models.len(), 1);
    assert_eq!(view.models[0].total, 3);
    assert_eq!(view.models[0].fragments, 3);
}

#[test]
fn test_completion_is_monotonic() {
    let mut raw = benchmark(
        PersistedStatus::Running,
        vec![run("m", "p", vec![pr("A", Some("done"))])],
    );
    assert_eq!(reconcile(&raw).models[0].completed, 1);

    // a later fragment with nothing new must not undo the completion
    raw.runs.push(run("m", "p", vec![pr("A", None)]));
    raw.runs.push(run("m", "p", vec![pr("A", Some("  "))]));
    let view = reconcile(&raw);
    assert_eq!(view.models[0].completed, 1);
    assert_eq!(view.models[0].prompts[0].outcome, PromptOutcome::Success);
    assert_eq!(view.models[0].prompts[0].attempts, 3);
    assert_eq!(view.state, ProgressState::Complete);
}

#[test]
fn test_latency_units() {
    assert_eq!(latency_ms(500.0), 500_000.0);
    assert_eq!(latency_ms(1500.0), 1500.0);
}

#[test]
fn test_running_flag_overridden_when_data_complete() {
    let view = reconcile(&benchmark(
        PersistedStatus::Running,
        vec![
            run("a", "x", vec![pr("P", Some("ok"))]),
            run("b", "y", vec![pr("P", Some("ERROR: timeout"))]),
        ],
    ));
    assert_eq!(view.state, ProgressState::Complete);
    assert_eq!(view.persisted_status, PersistedStatus::Running);
}

#[test]
fn test_sync_selects_only_the_pending_pair() {
    let prompts = ["P1", "P2", "P3", "P4"];
    let full = |model: &str| {
        run(
            model,
            "prov",
            prompts.iter().map(|p| pr(p, Some("done"))).collect(),
        )
    };
    let mut a = full("A");
    a.prompts[2].response = None;

    let view = reconcile(&benchmark(
        PersistedStatus::Running,
        vec![a, full("B"), full("C")],
    ));
    let plan = select_sync(&view);
    assert_eq!(plan.items.len(), 1);
    assert_eq!(plan.items[0].model.model, "A");
    assert_eq!(plan.items[0].prompt, "P3");
    assert_eq!(plan.items[0].reason, SyncReason::Pending);
}

#[test]
fn test_fixture_snapshot_reconciles() {
    let raw: Benchmark =
        serde_json::from_str(include_str!("fixtures/nightly.json")).unwrap();
    assert_eq!(raw.label, "nightly-regression");

    let view = reconcile(&raw);
    assert_eq!(view.state, ProgressState::Complete);

    let gpt = view.model("gpt-x").unwrap();
    // second fragment wins for P2: string token count and millisecond latency
    assert_eq!(gpt.per_prompt_totals.tokens.output, 32);
    assert_eq!(gpt.per_prompt_totals.latency_ms, 1200.0 + 1500.0);

    let claude = view.model("claude-y").unwrap();
    assert_eq!(claude.errored, 1);
    assert_eq!(claude.metrics.totals.cost, 0.05);
    assert_eq!(claude.metrics.totals.latency_ms, 4000.0);
}

#[test]
fn test_oversized_token_counts_do_not_abort_reconcile() {
    let huge = PromptResult {
        output_tokens: u64::MAX,
        ..pr("P1", Some("a"))
    };
    let small = PromptResult {
        output_tokens: 1,
        ..pr("P2", Some("b"))
    };
    let view = reconcile(&benchmark(
        PersistedStatus::Running,
        vec![run("m", "p", vec![huge, small])],
    ));

    let m = view.model("m").unwrap();
    assert_eq!(m.per_prompt_totals.tokens.output, u64::MAX);
    assert_eq!(view.totals.tokens.total(), u64::MAX);
    assert_eq!(view.state, ProgressState::Complete);
    assert!(benchlens_core::report::console::render_view(&view, false).contains("m (p)"));
}
