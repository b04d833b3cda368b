//! Scenario runner tests against scripted sessions.
//!
//! Every test runs on a paused Tokio clock, so timeouts elapse instantly.

use std::time::Duration;

use replcheck::config::{MarkerConfig, TimeoutConfig};
use replcheck::report::Console;
use replcheck::runner::{Resolution, Resync};
use replcheck::suite::{self, run_suite};
use replcheck::{
    IncompleteCheck, Markers, MultiTurn, PatternSpec, Reply, ScenarioRunner, ScriptedSession,
    Session, Shutdown, Status, Step, TestLedger,
};

const PROMPT: &str = "rshell> ";

fn runner(session: ScriptedSession) -> ScenarioRunner<ScriptedSession> {
    let markers = Markers::compile(&MarkerConfig::default()).unwrap();
    ScenarioRunner::new(session, markers, TimeoutConfig::default())
}

/// Output followed shortly by a fresh prompt.
fn answer(output: &str) -> Reply {
    Reply::new()
        .emit_after(Duration::from_millis(20), format!("{output}\r\n"))
        .emit_after(Duration::from_millis(5), PROMPT)
}

#[tokio::test(start_paused = true)]
async fn echo_records_single_pass() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on_start(Reply::new().emit(PROMPT))
            .on("echo hello", answer("hello"))
            .build(),
    );
    runner.await_ready().await.unwrap();
    let mut ledger = TestLedger::new();

    let report = runner
        .run_step(&mut ledger, &Step::new("echo hello", "hello", "echo command"))
        .await
        .unwrap();

    assert_eq!(report.resolution, Resolution::Primary);
    assert_eq!(report.resync, Resync::Resynced);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.outcomes()[0].status, Status::Pass);
    assert_eq!(ledger.outcomes()[0].name, "echo command");
    assert_eq!(ledger.outcomes()[0].detail, None);
}

#[tokio::test(start_paused = true)]
async fn several_args_pass() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on("echo one two three", answer("one two three"))
            .build(),
    );
    let mut ledger = TestLedger::new();

    runner
        .run_step(
            &mut ledger,
            &Step::new("echo one two three", "one two three", "echo multiple args"),
        )
        .await
        .unwrap();

    assert_eq!(ledger.summary().passed, 1);
    assert_eq!(ledger.summary().total, 1);
}

#[tokio::test(start_paused = true)]
async fn incomplete_marker_passes_with_annotation() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on(
                "A=12",
                Reply::new()
                    .emit_after(
                        Duration::from_secs(5),
                        "\u{1b}[31mTIMEOUT: Input not complete after 5000ms\u{1b}[0m\r\n",
                    )
                    .emit(PROMPT),
            )
            .build(),
    );
    let mut ledger = TestLedger::new();
    let step = Step::new("A=12", "DeclarationCommand", "variable declaration")
        .timeout(Duration::from_secs(6));

    let report = runner.run_step(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Secondary);
    assert_eq!(report.resync, Resync::Resynced);
    let outcome = &ledger.outcomes()[0];
    assert_eq!(outcome.status, Status::Pass);
    assert_eq!(outcome.name, "variable declaration (timeout error shown)");
    assert_eq!(outcome.detail, None);
}

#[tokio::test(start_paused = true)]
async fn incomplete_marker_split_across_lines() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on(
                "A=12",
                Reply::new()
                    .emit_after(Duration::from_millis(50), "TIMEOUT:\r\nInput not complete\r\n")
                    .emit(PROMPT),
            )
            .build(),
    );
    let mut ledger = TestLedger::new();

    let report = runner
        .run_step(
            &mut ledger,
            &Step::new("A=12", "DeclarationCommand", "variable declaration"),
        )
        .await
        .unwrap();

    assert_eq!(report.resolution, Resolution::Secondary);
    assert_eq!(report.resync, Resync::Resynced);
    assert_eq!(ledger.summary().passed, 1);
}

#[tokio::test(start_paused = true)]
async fn earliest_candidate_wins() {
    // Both candidates are in the same chunk; the marker comes first.
    let mut runner = runner(
        ScriptedSession::builder()
            .on(
                ".ast",
                answer("TIMEOUT: parse not complete\r\nNo AST yet"),
            )
            .build(),
    );
    let mut ledger = TestLedger::new();

    let report = runner
        .run_step(&mut ledger, &Step::new(".ast", "No AST yet", ".ast command"))
        .await
        .unwrap();

    assert_eq!(report.resolution, Resolution::Secondary);
}

#[tokio::test(start_paused = true)]
async fn bare_timeout_fails_without_resync() {
    let mut runner = runner(ScriptedSession::builder().build());
    let mut ledger = TestLedger::new();

    let report = runner
        .run_step(&mut ledger, &Step::new(".status", "Status:", ".status command"))
        .await
        .unwrap();

    assert_eq!(report.resolution, Resolution::Expired);
    assert_eq!(report.resync, Resync::NotAttempted);
    assert_eq!(ledger.outcomes()[0].status, Status::Fail);
    assert_eq!(
        ledger.outcomes()[0].detail.as_deref(),
        Some("Timeout waiting for: Status:")
    );
}

#[tokio::test(start_paused = true)]
async fn incomplete_check_without_marker_fails() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on("A=12", answer("ok"))
            .build(),
    );
    let mut ledger = TestLedger::new();
    let mut check = IncompleteCheck::new("A=12", "variable declaration shows red timeout error");
    check.fail_name = Some("variable declaration timeout".to_string());
    check.timeout = Some(Duration::from_secs(6));

    let report = runner.run_incomplete(&mut ledger, &check).await.unwrap();

    assert_eq!(report.resolution, Resolution::Expired);
    let outcome = &ledger.outcomes()[0];
    assert_eq!(outcome.status, Status::Fail);
    assert_eq!(outcome.name, "variable declaration timeout");
    assert_eq!(outcome.detail.as_deref(), Some("No timeout message"));
}

#[tokio::test(start_paused = true)]
async fn multiline_waits_for_continuation() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on("echo \"hello", Reply::new().emit_after(Duration::from_millis(10), "quote> "))
            .on("world\"", answer("hello\r\nworld"))
            .build(),
    );
    let mut ledger = TestLedger::new();
    let step = MultiTurn::new(
        "multiline quote continuation",
        "echo \"hello",
        "world\"",
        PatternSpec::regex("hello.*world"),
    );

    let report = runner.run_multi_turn(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Primary);
    assert_eq!(report.resync, Resync::Resynced);
    assert_eq!(runner.session().written(), ["echo \"hello", "world\""]);
    assert_eq!(ledger.summary().passed, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_output_after_quick_continuation() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on("echo \"hello", Reply::new().emit_after(Duration::from_millis(10), "quote> "))
            .on(
                "world\"",
                Reply::new()
                    .emit_after(Duration::from_secs(5), "hello\r\nworld\r\n")
                    .emit(PROMPT),
            )
            .build(),
    );
    let mut ledger = TestLedger::new();
    let mut step = MultiTurn::new(
        "multiline quote continuation",
        "echo \"hello",
        "world\"",
        PatternSpec::regex("hello.*world"),
    );
    step.continuation_timeout = Some(Duration::from_millis(100));
    step.output_timeout = Some(Duration::from_secs(8));

    let report = runner.run_multi_turn(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Primary);
    assert_eq!(ledger.summary().passed, 1);
}

#[tokio::test(start_paused = true)]
async fn continuation_timeout_bounds_prompt_wait() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on("echo \"hello", Reply::new().emit_after(Duration::from_secs(1), "quote> "))
            .build(),
    );
    let mut ledger = TestLedger::new();
    let mut step = MultiTurn::new(
        "multiline quote continuation",
        "echo \"hello",
        "world\"",
        PatternSpec::regex("hello.*world"),
    );
    step.continuation_timeout = Some(Duration::from_millis(100));
    step.output_timeout = Some(Duration::from_secs(8));

    let report = runner.run_multi_turn(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Expired);
    assert_eq!(runner.session().written(), ["echo \"hello"]);
}

#[tokio::test(start_paused = true)]
async fn missing_continuation_fails_and_resyncs() {
    let mut runner = runner(ScriptedSession::builder().build());
    let mut ledger = TestLedger::new();
    let step = MultiTurn::new(
        "multiline quote continuation",
        "echo \"hello",
        "world\"",
        PatternSpec::regex("hello.*world"),
    );

    let report = runner.run_multi_turn(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Expired);
    assert_eq!(report.resync, Resync::Unresynced);
    assert_eq!(runner.session().written(), ["echo \"hello"]);
    assert_eq!(
        ledger.outcomes()[0].detail.as_deref(),
        Some("Timeout waiting for: quote>")
    );
}

#[tokio::test(start_paused = true)]
async fn skip_touches_nothing() {
    let mut runner = runner(ScriptedSession::builder().build());
    let mut ledger = TestLedger::new();

    let report = runner.skip(&mut ledger, "while loop", "Control flow in development");

    assert_eq!(report.resolution, Resolution::Skipped);
    assert!(runner.session().written().is_empty());
    assert_eq!(ledger.summary().skipped, 1);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminating_twice_leaves_ledger_alone() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on("echo hello", answer("hello"))
            .on(".quit", Reply::new().emit("Goodbye!\r\n").close())
            .build(),
    );
    let mut ledger = TestLedger::new();
    runner
        .run_step(&mut ledger, &Step::new("echo hello", "hello", "echo command"))
        .await
        .unwrap();
    let before = ledger.clone();

    assert_eq!(runner.shutdown().await, Shutdown::Graceful);
    assert_eq!(runner.shutdown().await, Shutdown::AlreadyTerminated);
    assert_eq!(ledger, before);
    assert_eq!(runner.session().terminate_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stubborn_program_is_forced() {
    let mut runner = runner(ScriptedSession::builder().grace(Duration::from_millis(500)).build());
    assert_eq!(runner.shutdown().await, Shutdown::Forced);
}

#[tokio::test(start_paused = true)]
async fn closed_session_rejects_steps() {
    let mut runner = runner(
        ScriptedSession::builder()
            .on(".quit", Reply::new().close())
            .build(),
    );
    runner.shutdown().await;
    let mut ledger = TestLedger::new();

    let err = runner
        .run_step(&mut ledger, &Step::new("echo hello", "hello", "echo command"))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(ledger.summary().failed, 1);
    assert!(!runner.session_mut().is_alive());
}

/// A scripted RShell that answers every command of the built-in suite.
fn scripted_rshell() -> ScriptedSession {
    ScriptedSession::builder()
        .label("scripted rshell")
        .on_start(
            Reply::new()
                .emit("Compiling 12 files (.ex)\r\n")
                .emit_after(Duration::from_millis(800), format!("RShell v0.1\r\n{PROMPT}")),
        )
        .on("echo hello", answer("hello"))
        .on("echo one two three", answer("one two three"))
        .on("printf 'test\\n'", answer("test"))
        .on(".help", answer("Available Commands:\r\n  .help .status .ast .reset .quit"))
        .on(".status", answer("Status: ready"))
        .on(".ast", answer("No AST yet"))
        .on(".reset", answer("Parser state reset"))
        .on(
            "A=12",
            Reply::new()
                .emit_after(Duration::from_secs(5), "TIMEOUT: Input not complete after 5000ms\r\n")
                .emit(PROMPT),
        )
        .on(".ast", answer("DeclarationCommand{name: A}"))
        .on(".reset", answer("Parser state reset"))
        .on("echo \"hello", Reply::new().emit("quote> "))
        .on("world\"", answer("hello\r\nworld"))
        .on(".help echo", answer("echo - print arguments"))
        .on(".help printf", answer("printf - formatted output"))
        .on(".help nonexistent", answer("Unknown builtin: nonexistent"))
        .on(".quit", Reply::new().emit("Goodbye!\r\n").close())
        .build()
}

#[tokio::test(start_paused = true)]
async fn builtin_suite_against_scripted_rshell() {
    let suite = suite::rshell();
    let mut runner = runner(scripted_rshell());
    runner.await_ready().await.unwrap();

    let mut ledger = TestLedger::new();
    let mut console = Console::new(Vec::new(), false);
    let report = run_suite(&mut runner, &suite, &mut ledger, &mut console).await;
    assert_eq!(runner.shutdown().await, Shutdown::Graceful);

    assert!(report.completed());
    let summary = ledger.summary();
    assert_eq!(summary.total, 17);
    assert_eq!(summary.passed, 14);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.success_rate, Some(82));

    let text = String::from_utf8(console.into_inner()).unwrap();
    assert!(text.contains("\n📦 Testing Basic Builtins\n✓ echo command\n"));
    assert!(text.contains("✓ variable declaration shows red timeout error\n"));
    assert!(text.contains("⊘ for loop (SKIPPED)\n  Control flow in development\n"));
}

#[tokio::test(start_paused = true)]
async fn crash_mid_suite_skips_later_groups() {
    let suite = suite::rshell();
    let mut runner = runner(
        ScriptedSession::builder()
            .on("echo hello", answer("hello"))
            .on(
                "echo one two three",
                Reply::new().emit("** (EXIT from #PID<0.94.0>) shutdown\r\n").close(),
            )
            .build(),
    );

    let mut ledger = TestLedger::new();
    let report = run_suite(&mut runner, &suite, &mut ledger, &mut ()).await;

    assert_eq!(report.aborted.len(), 1);
    assert_eq!(report.aborted[0].group, "Basic Builtins");
    assert_eq!(report.skipped.len(), 5);
    assert_eq!(ledger.summary().passed, 1);
    assert_eq!(ledger.summary().failed, 1);
    assert_eq!(ledger.outcomes()[1].name, "echo multiple args");
    assert_eq!(runner.shutdown().await, Shutdown::Graceful);
}
