//! In-memory session with scripted output.
//!
//! A [`ScriptedSession`] stands in for a real program. Each input line can
//! trigger a [`Reply`]: output chunks released after virtual delays, and
//! optionally end of file. Delays use Tokio's clock, so tests run under
//! `#[tokio::test(start_paused = true)]` finish instantly while still
//! exercising every timeout path.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use replcheck::session::{Reply, ScriptedSession};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let session = ScriptedSession::builder()
//!     .on_start(Reply::new().emit("rshell> "))
//!     .on("echo hello", Reply::new().emit("hello\r\n").emit_after(Duration::from_millis(5), "rshell> "))
//!     .on(".quit", Reply::new().emit("Goodbye!\r\n").close())
//!     .build();
//! # drop(session);
//! # }
//! ```

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout};

use super::{Session, Shutdown, drain_to_eof};
use crate::config::DEFAULT_QUIT_COMMAND;
use crate::error::{ExpectError, Result};
use crate::expect::{DEFAULT_CAPACITY, Expectation, ExpectationMatcher, MatchResult, OutputBuffer, OutputSource};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Output(Vec<u8>),
    Close,
}

/// Output produced in response to one input line.
///
/// Each event's delay counts from the previous event of the same reply.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    events: Vec<(Duration, Event)>,
}

impl Reply {
    /// Create an empty reply.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit `text` immediately after the previous event.
    #[must_use]
    pub fn emit(self, text: impl AsRef<[u8]>) -> Self {
        self.emit_after(Duration::ZERO, text)
    }

    /// Emit `text` `delay` after the previous event.
    #[must_use]
    pub fn emit_after(mut self, delay: Duration, text: impl AsRef<[u8]>) -> Self {
        self.events.push((delay, Event::Output(text.as_ref().to_vec())));
        self
    }

    /// Close the terminal immediately after the previous event.
    #[must_use]
    pub fn close(self) -> Self {
        self.close_after(Duration::ZERO)
    }

    /// Close the terminal `delay` after the previous event.
    #[must_use]
    pub fn close_after(mut self, delay: Duration) -> Self {
        self.events.push((delay, Event::Close));
        self
    }
}

/// Scheduled output, released as virtual time passes.
#[derive(Debug, Default)]
struct Timeline {
    queue: VecDeque<(Instant, Event)>,
    closed: bool,
}

impl Timeline {
    /// Queue `reply` to start now, never ahead of output already queued.
    fn schedule(&mut self, reply: &Reply) {
        let now = Instant::now();
        let mut due = self.queue.back().map_or(now, |(at, _)| (*at).max(now));
        for (delay, event) in &reply.events {
            due += *delay;
            self.queue.push_back((due, event.clone()));
        }
    }
}

impl OutputSource for Timeline {
    async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        let Some(due) = self.queue.front().map(|(at, _)| *at) else {
            return std::future::pending().await;
        };

        sleep_until(due).await;
        match self.queue.pop_front() {
            Some((_, Event::Output(bytes))) => Ok(Some(bytes)),
            Some((_, Event::Close)) | None => {
                self.closed = true;
                self.queue.clear();
                Ok(None)
            }
        }
    }
}

/// Builder for [`ScriptedSession`].
#[derive(Debug, Clone)]
pub struct ScriptedSessionBuilder {
    label: String,
    startup: Reply,
    rules: Vec<(String, Reply)>,
    echo: bool,
    quit_command: String,
    grace: Duration,
    max_buffer: usize,
}

impl Default for ScriptedSessionBuilder {
    fn default() -> Self {
        Self {
            label: "scripted".to_string(),
            startup: Reply::new(),
            rules: Vec::new(),
            echo: false,
            quit_command: DEFAULT_QUIT_COMMAND.to_string(),
            grace: Duration::from_secs(2),
            max_buffer: DEFAULT_CAPACITY,
        }
    }
}

impl ScriptedSessionBuilder {
    /// Set the label used in messages.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Output produced as soon as the session is built.
    #[must_use]
    pub fn on_start(mut self, reply: Reply) -> Self {
        self.startup = reply;
        self
    }

    /// Reply to the next line equal to `input`.
    ///
    /// Each rule fires once; register the same input again to answer it
    /// again. Lines without a rule produce no output.
    #[must_use]
    pub fn on(mut self, input: impl Into<String>, reply: Reply) -> Self {
        self.rules.push((input.into(), reply));
        self
    }

    /// Echo every input line back, as a terminal in canonical mode does.
    #[must_use]
    pub const fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Set the line sent by [`Session::terminate`].
    #[must_use]
    pub fn quit_command(mut self, command: impl Into<String>) -> Self {
        self.quit_command = command.into();
        self
    }

    /// Set how long termination waits for end of file.
    #[must_use]
    pub const fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Set the limit on unconsumed output.
    #[must_use]
    pub const fn max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    /// Build the session, starting its clock now.
    #[must_use]
    pub fn build(self) -> ScriptedSession {
        let mut timeline = Timeline::default();
        timeline.schedule(&self.startup);

        ScriptedSession {
            label: self.label,
            timeline,
            buffer: OutputBuffer::new(self.max_buffer),
            rules: self.rules,
            echo: self.echo,
            quit_command: self.quit_command,
            grace: self.grace,
            written: Vec::new(),
            terminated: false,
            terminate_calls: 0,
        }
    }
}

/// A fake program driven by a script.
#[derive(Debug)]
pub struct ScriptedSession {
    label: String,
    timeline: Timeline,
    buffer: OutputBuffer,
    rules: Vec<(String, Reply)>,
    echo: bool,
    quit_command: String,
    grace: Duration,
    written: Vec<String>,
    terminated: bool,
    terminate_calls: usize,
}

impl ScriptedSession {
    /// Start building a scripted session.
    #[must_use]
    pub fn builder() -> ScriptedSessionBuilder {
        ScriptedSessionBuilder::default()
    }

    /// Every line written so far, including the quit command.
    #[must_use]
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// How many times [`Session::terminate`] was called.
    #[must_use]
    pub const fn terminate_calls(&self) -> usize {
        self.terminate_calls
    }

    /// Check whether the session has been terminated.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Record `text` as input and queue its echo and reply.
    fn feed(&mut self, text: &str) {
        self.written.push(text.to_string());

        let mut reply = if self.echo {
            Reply::new().emit(format!("{text}\r\n"))
        } else {
            Reply::new()
        };
        if let Some(index) = self.rules.iter().position(|(input, _)| input == text) {
            let (_, rule) = self.rules.remove(index);
            reply.events.extend(rule.events);
        } else {
            tracing::trace!(input = text, "no scripted reply");
        }
        self.timeline.schedule(&reply);
    }
}

impl Session for ScriptedSession {
    fn label(&self) -> &str {
        &self.label
    }

    async fn write_line(&mut self, text: &str) -> Result<()> {
        if self.terminated || self.timeline.closed {
            return Err(ExpectError::SessionClosed);
        }
        self.feed(text);
        Ok(())
    }

    async fn read_until(&mut self, expectation: &Expectation, timeout: Duration) -> Result<MatchResult> {
        if self.terminated {
            return Err(ExpectError::SessionClosed);
        }
        ExpectationMatcher::new(expectation, timeout)
            .run(&mut self.timeline, &mut self.buffer)
            .await
    }

    async fn terminate(&mut self) -> Shutdown {
        self.terminate_calls += 1;
        if self.terminated {
            return Shutdown::AlreadyTerminated;
        }
        self.terminated = true;

        if self.timeline.closed {
            return Shutdown::Graceful;
        }

        let quit = self.quit_command.clone();
        self.feed(&quit);

        let drained = timeout(
            self.grace,
            drain_to_eof(&mut self.timeline, &mut self.buffer),
        )
        .await;
        self.timeline.closed = true;
        self.timeline.queue.clear();

        if drained.is_ok() {
            Shutdown::Graceful
        } else {
            tracing::warn!(grace = ?self.grace, "scripted program ignored quit command");
            Shutdown::Forced
        }
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated && !self.timeline.closed
    }

    fn pending_output(&self) -> String {
        self.buffer.as_str_lossy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::Candidate;

    fn expect(text: &str) -> Expectation {
        Expectation::new().with(Candidate::literal(text)).or_timeout()
    }

    #[tokio::test(start_paused = true)]
    async fn replies_follow_input() {
        let mut session = ScriptedSession::builder()
            .on("echo hello", Reply::new().emit_after(Duration::from_millis(50), "hello\r\n"))
            .build();

        session.write_line("echo hello").await.unwrap();
        let result = session
            .read_until(&expect("hello"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.is_matched());
        assert_eq!(session.written(), ["echo hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn echo_precedes_reply() {
        let mut session = ScriptedSession::builder()
            .echo(true)
            .on("echo hi", Reply::new().emit("hi\r\n"))
            .build();

        session.write_line("echo hi").await.unwrap();
        let m = session
            .read_until(&expect("hi\r\n"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(m.as_match().unwrap().before, "echo ");
    }

    #[tokio::test(start_paused = true)]
    async fn unscripted_input_times_out() {
        let mut session = ScriptedSession::builder().build();
        session.write_line("for i in 1 2 3").await.unwrap();
        let result = session
            .read_until(&expect("done"), Duration::from_millis(200))
            .await
            .unwrap();
        assert!(result.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn rules_fire_once() {
        let mut session = ScriptedSession::builder()
            .on(".status", Reply::new().emit("Status: ok\r\n"))
            .build();

        session.write_line(".status").await.unwrap();
        session.write_line(".status").await.unwrap();
        let first = session
            .read_until(&expect("Status:"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(first.is_matched());
        let second = session
            .read_until(&expect("Status:"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(second.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_then_already_terminated() {
        let mut session = ScriptedSession::builder()
            .on(".quit", Reply::new().emit("Goodbye!\r\n").close_after(Duration::from_millis(100)))
            .build();

        assert!(session.is_alive());
        assert_eq!(session.terminate().await, Shutdown::Graceful);
        assert_eq!(session.terminate().await, Shutdown::AlreadyTerminated);
        assert_eq!(session.terminate_calls(), 2);
        assert_eq!(session.written(), [".quit"]);
        assert!(!session.is_alive());
        assert!(matches!(
            session.write_line("echo late").await,
            Err(ExpectError::SessionClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn lingering_program_is_forced() {
        let mut session = ScriptedSession::builder()
            .grace(Duration::from_millis(500))
            .build();
        let started = Instant::now();
        assert_eq!(session.terminate().await, Shutdown::Forced);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn eof_closes_session() {
        let mut session = ScriptedSession::builder()
            .on_start(Reply::new().emit("bye").close())
            .build();

        let err = session
            .read_until(&expect("rshell>"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_eof());
        assert!(!session.is_alive());
        assert!(matches!(
            session.write_line("echo").await,
            Err(ExpectError::SessionClosed)
        ));
        assert_eq!(session.terminate().await, Shutdown::Graceful);
    }
}
