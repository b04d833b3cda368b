//! End-to-end tests driving `/bin/sh` as a stand-in REPL.
//!
//! The shell's prompts are set to the RShell markers so the default marker
//! configuration applies unchanged.

#![cfg(unix)]

use std::time::Duration;

use replcheck::config::{MarkerConfig, SessionConfig, TimeoutConfig};
use replcheck::error::SpawnError;
use replcheck::{
    ExpectError, Markers, MultiTurn, PatternSpec, PtySession, Resolution, Resync,
    ScenarioRunner, Session, Shutdown, Status, Step, TestLedger,
};

fn shell() -> SessionConfig {
    SessionConfig::new("/bin/sh")
        .args(["-i"])
        .env("PS1", "rshell> ")
        .env("PS2", "quote> ")
        .env("ENV", "")
        .quit_command("exit")
        .grace(Duration::from_secs(2))
}

async fn ready_runner(config: &SessionConfig) -> ScenarioRunner<PtySession> {
    let session = PtySession::spawn(config).await.unwrap();
    let markers = Markers::compile(&MarkerConfig::default()).unwrap();
    let mut runner = ScenarioRunner::new(session, markers, TimeoutConfig::default());
    runner.await_ready().await.unwrap();
    runner
}

#[tokio::test]
async fn steps_pass_against_shell() {
    let mut runner = ready_runner(&shell()).await;
    let mut ledger = TestLedger::new();

    let report = runner
        .run_step(&mut ledger, &Step::new("echo hello", "hello", "echo command"))
        .await
        .unwrap();
    assert_eq!(report.resync, Resync::Resynced);

    runner
        .run_step(
            &mut ledger,
            &Step::new("echo one two three", "one two three", "echo multiple args"),
        )
        .await
        .unwrap();
    runner
        .run_step(&mut ledger, &Step::new(r"printf 'test\n'", "test", "printf command"))
        .await
        .unwrap();

    assert_eq!(runner.shutdown().await, Shutdown::Graceful);
    let summary = ledger.summary();
    assert_eq!(summary.passed, 3);
    assert_eq!(summary.success_rate, Some(100));
}

#[tokio::test]
async fn quoted_input_spans_continuation_prompt() {
    let mut runner = ready_runner(&shell()).await;
    let mut ledger = TestLedger::new();
    let step = MultiTurn::new(
        "multiline quote continuation",
        "echo \"hello",
        "world\"",
        PatternSpec::regex("hello.*world"),
    );

    let report = runner.run_multi_turn(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Primary);
    assert_eq!(ledger.outcomes()[0].status, Status::Pass);
    runner.shutdown().await;
}

#[tokio::test]
async fn missing_output_times_out() {
    let mut runner = ready_runner(&shell()).await;
    let mut ledger = TestLedger::new();
    let step = Step::new("true", "never printed", "silent command")
        .timeout(Duration::from_millis(300));

    let report = runner.run_step(&mut ledger, &step).await.unwrap();

    assert_eq!(report.resolution, Resolution::Expired);
    assert_eq!(ledger.summary().failed, 1);
    runner.shutdown().await;
}

#[tokio::test]
async fn ignored_quit_command_forces_kill() {
    let config = shell().quit_command("# stay").grace(Duration::from_millis(300));
    let mut runner = ready_runner(&config).await;

    assert_eq!(runner.shutdown().await, Shutdown::Forced);
    assert_eq!(runner.shutdown().await, Shutdown::AlreadyTerminated);
    assert!(!runner.session_mut().is_alive());
}

#[tokio::test]
async fn missing_program_is_reported() {
    let err = PtySession::spawn(&SessionConfig::new("/nonexistent/rshell"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExpectError::Spawn(SpawnError::CommandNotFound { .. })
    ));
}

#[tokio::test]
async fn exit_before_prompt_is_reported() {
    let config = SessionConfig::new("/bin/sh").args(["-c", "echo compile error"]);
    let session = PtySession::spawn(&config).await.unwrap();
    let markers = Markers::compile(&MarkerConfig::default()).unwrap();
    let mut runner = ScenarioRunner::new(session, markers, TimeoutConfig::default());

    let err = runner.await_ready().await.unwrap_err();
    assert!(matches!(
        err,
        ExpectError::Spawn(SpawnError::ExitedImmediately { ref output, .. })
            if output.contains("compile error")
    ));
    runner.shutdown().await;
}
