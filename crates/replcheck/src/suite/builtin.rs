//! The built-in RShell REPL suite.

use std::time::Duration;

use super::{Group, Scenario, Suite};
use crate::expect::PatternSpec;

/// Reason recorded for the control-flow placeholders.
const CONTROL_FLOW_PENDING: &str = "Control flow in development";

/// Suite covering builtins, meta commands, error reporting, multiline input
/// and builtin help of the RShell REPL.
#[must_use]
pub fn rshell() -> Suite {
    Suite {
        title: "RShell Interactive CLI Test Suite".to_string(),
        groups: vec![
            basic_builtins(),
            meta_commands(),
            error_handling(),
            multiline_input(),
            builtin_help(),
            control_flow(),
        ],
    }
}

fn basic_builtins() -> Group {
    Group::new("Basic Builtins")
        .icon("📦")
        .scenario(Scenario::step("echo command", "echo hello", "hello"))
        .scenario(Scenario::step(
            "echo multiple args",
            "echo one two three",
            "one two three",
        ))
        .scenario(Scenario::step("printf command", r"printf 'test\n'", "test"))
}

fn meta_commands() -> Group {
    Group::new("Meta Commands")
        .icon("🔧")
        .scenario(Scenario::step(".help command", ".help", "Available Commands"))
        .scenario(Scenario::step(".status command", ".status", "Status:"))
        .scenario(Scenario::step(
            ".ast command",
            ".ast",
            PatternSpec::regex("(Full Accumulated AST|No AST yet)"),
        ))
        .scenario(Scenario::step(".reset command", ".reset", "Parser state reset"))
}

fn error_handling() -> Group {
    Group::new("Error Handling")
        .icon("⚠️")
        .scenario(
            Scenario::expect_incomplete("variable declaration shows red timeout error", "A=12")
                .on_failure("variable declaration timeout", "No timeout message")
                .with_timeout(Duration::from_secs(6)),
        )
        .scenario(Scenario::step(
            ".ast after timeout (AST preserved)",
            ".ast",
            PatternSpec::regex("(DeclarationCommand|No AST)"),
        ))
        .scenario(Scenario::step(
            ".reset after error",
            ".reset",
            "Parser state reset",
        ))
}

fn multiline_input() -> Group {
    Group::new("Multiline Input").icon("📝").scenario(Scenario::multi_turn(
        "multiline quote continuation",
        "echo \"hello",
        "world\"",
        PatternSpec::regex("hello.*world"),
    ))
}

fn builtin_help() -> Group {
    Group::new("Builtin Help")
        .icon("📖")
        .scenario(Scenario::step(".help echo", ".help echo", "echo"))
        .scenario(Scenario::step(".help printf", ".help printf", "printf"))
        .scenario(Scenario::step(
            ".help nonexistent (error)",
            ".help nonexistent",
            "Unknown builtin",
        ))
}

fn control_flow() -> Group {
    Group::new("Control Flow (Partial Implementation)")
        .icon("🔄")
        .scenario(Scenario::skip("for loop", CONTROL_FLOW_PENDING))
        .scenario(Scenario::skip("while loop", CONTROL_FLOW_PENDING))
        .scenario(Scenario::skip("if statement", CONTROL_FLOW_PENDING))
}
