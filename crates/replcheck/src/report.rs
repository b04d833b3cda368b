//! Console output.
//!
//! [`Console`] prints the banner, one line per outcome, group headers and
//! the closing summary. Colors are applied with `crossterm` styling and can
//! be turned off per console.

use std::fmt::Display;
use std::io::{self, Write};

use crossterm::style::{Color, Stylize};
use serde::Serialize;

use crate::error::ExpectError;
use crate::ledger::{Outcome, Status, Summary, TestLedger};
use crate::suite::{Group, Reporter};

/// Width of the `=` rules.
const RULE_WIDTH: usize = 40;

/// Check whether the environment asks for plain output.
#[must_use]
pub fn no_color_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty())
}

/// Writes progress and results for humans.
#[derive(Debug)]
pub struct Console<W> {
    out: W,
    color: bool,
}

impl Console<io::Stdout> {
    /// Console on standard output.
    #[must_use]
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> Console<W> {
    /// Console writing to `out`.
    pub const fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Suite title and rule.
    pub fn banner(&mut self, title: &str) {
        let line = format!("{}\n{}\n", paint(format!("🧪 {title}"), Color::Blue, self.color), rule());
        self.line(line);
    }

    /// The program is being started.
    pub fn starting(&mut self, label: &str) {
        let line = paint(format!("🚀 Starting {label}..."), Color::Blue, self.color);
        self.line(line);
    }

    /// The program showed its first prompt.
    pub fn started(&mut self) {
        let line = paint("✓ CLI started successfully\n", Color::Green, self.color);
        self.line(line);
    }

    /// The program could not be started.
    pub fn start_failed(&mut self, error: &ExpectError) {
        let line = paint(format!("✗ Failed to start CLI: {error}"), Color::Red, self.color);
        self.line(line);
    }

    /// The run was cut short by Ctrl-C.
    pub fn interrupted(&mut self) {
        let line = paint("\nTest interrupted by user", Color::Yellow, self.color);
        self.line(line);
    }

    /// Closing counts.
    pub fn summary(&mut self, summary: &Summary) {
        let text = summary_block(summary, self.color);
        self.line(text);
    }

    /// Print the ledger and its summary as JSON.
    pub fn json(&mut self, ledger: &TestLedger) -> io::Result<()> {
        let report = JsonReport {
            ledger,
            summary: ledger.summary(),
        };
        serde_json::to_writer_pretty(&mut self.out, &report)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn line(&mut self, text: impl Display) {
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::debug!(error = %e, "console write failed");
        }
    }
}

impl<W: Write> Reporter for Console<W> {
    fn group_started(&mut self, group: &Group) {
        let title = match &group.icon {
            Some(icon) => format!("\n{icon} Testing {}", group.name),
            None => format!("\nTesting {}", group.name),
        };
        let line = paint(title, Color::Yellow, self.color);
        self.line(line);
    }

    fn outcome(&mut self, outcome: &Outcome) {
        let text = outcome_line(outcome, self.color);
        self.line(text);
    }

    fn group_aborted(&mut self, group: &Group, error: &ExpectError) {
        let line = paint(
            format!("  {} stopped: {}", group.name, error.summary()),
            Color::Red,
            self.color,
        );
        self.line(line);
    }

    fn groups_skipped(&mut self, groups: &[Group]) {
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        let line = paint(
            format!("\n⊘ Session unusable, not running: {}", names.join(", ")),
            Color::Yellow,
            self.color,
        );
        self.line(line);
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    ledger: &'a TestLedger,
    summary: Summary,
}

/// Format one outcome, with its detail on the following line.
#[must_use]
pub fn outcome_line(outcome: &Outcome, color: bool) -> String {
    let name = &outcome.name;
    match outcome.status {
        Status::Pass => format!("{} {name}", paint("✓", Color::Green, color)),
        Status::Fail => {
            let mark = paint("✗", Color::Red, color);
            match &outcome.detail {
                Some(detail) => format!("{mark} {name}\n  {}", paint(detail, Color::Red, color)),
                None => format!("{mark} {name}"),
            }
        }
        Status::Skip => {
            let mark = paint("⊘", Color::Yellow, color);
            match &outcome.detail {
                Some(detail) => {
                    format!("{mark} {name} (SKIPPED)\n  {}", paint(detail, Color::Yellow, color))
                }
                None => format!("{mark} {name} (SKIPPED)"),
            }
        }
    }
}

/// Format the closing summary.
#[must_use]
pub fn summary_block(summary: &Summary, color: bool) -> String {
    let mut lines = vec![
        format!("\n{}", rule()),
        paint("Test Summary", Color::Blue, color),
        rule(),
        format!("Total:   {}", summary.total),
        paint(format!("Passed:  {}", summary.passed), Color::Green, color),
        paint(format!("Failed:  {}", summary.failed), Color::Red, color),
        paint(format!("Skipped: {}", summary.skipped), Color::Yellow, color),
    ];
    if let Some(rate) = summary.success_rate {
        lines.push(format!("Success: {rate}%"));
    }
    lines.push(String::new());
    lines.push(if summary.all_passed() {
        paint("✅ All executed tests passed!", Color::Green, color)
    } else {
        paint("⚠️  Some tests failed!", Color::Red, color)
    });
    lines.join("\n")
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn paint(text: impl Display, color: Color, enabled: bool) -> String {
    if enabled {
        text.to_string().with(color).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(outcome: Outcome) -> String {
        outcome_line(&outcome, false)
    }

    #[test]
    fn pass_lines() {
        let mut ledger = TestLedger::new();
        ledger.pass("echo command");
        ledger.pass("variable declaration (timeout error shown)");

        assert_eq!(plain(ledger.outcomes()[0].clone()), "✓ echo command");
        assert_eq!(
            plain(ledger.outcomes()[1].clone()),
            "✓ variable declaration (timeout error shown)"
        );
    }

    #[test]
    fn fail_and_skip_lines_carry_detail() {
        let mut ledger = TestLedger::new();
        ledger.fail("printf command", "Timeout waiting for: test");
        ledger.skip("for loop", "Control flow in development");

        assert_eq!(
            plain(ledger.outcomes()[0].clone()),
            "✗ printf command\n  Timeout waiting for: test"
        );
        assert_eq!(
            plain(ledger.outcomes()[1].clone()),
            "⊘ for loop (SKIPPED)\n  Control flow in development"
        );
    }

    #[test]
    fn colored_output_has_escapes() {
        if no_color_requested() {
            return;
        }
        let mut ledger = TestLedger::new();
        ledger.pass("echo command");
        let line = outcome_line(&ledger.outcomes()[0], true);
        assert!(line.contains('\u{1b}'));
        assert!(line.ends_with(" echo command"));
    }

    #[test]
    fn summary_with_failures() {
        let mut ledger = TestLedger::new();
        ledger.pass("a");
        ledger.pass("b");
        ledger.fail("c", "Output not found");
        let block = summary_block(&ledger.summary(), false);

        assert!(block.contains("Total:   3"));
        assert!(block.contains("Failed:  1"));
        assert!(block.contains("Success: 66%"));
        assert!(block.ends_with("⚠️  Some tests failed!"));
    }

    #[test]
    fn empty_summary_omits_rate() {
        let block = summary_block(&TestLedger::new().summary(), false);
        assert!(!block.contains("Success"));
        assert!(block.ends_with("✅ All executed tests passed!"));
    }

    #[test]
    fn console_writes_group_header_and_json() {
        let mut console = Console::new(Vec::new(), false);
        console.group_started(&Group::new("Basic Builtins").icon("📦"));

        let mut ledger = TestLedger::new();
        ledger.pass("echo command");
        console.json(&ledger).unwrap();

        let text = String::from_utf8(console.into_inner()).unwrap();
        let (header, json) = text.split_once("\n{").unwrap();
        assert_eq!(header, "\n📦 Testing Basic Builtins");

        let value: serde_json::Value = serde_json::from_str(&format!("{{{json}")).unwrap();
        assert_eq!(value["summary"]["passed"], 1);
        assert_eq!(value["ledger"][0]["name"], "echo command");
    }
}
