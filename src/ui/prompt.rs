//! Line-oriented user input.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

/// Source of answers to confirmation prompts.
pub trait Prompter {
    /// Show `prompt` and read one line. `None` on end of input, read error
    /// or Ctrl-C.
    fn ask(&mut self, prompt: &str) -> Option<String>;
}

/// Exit status of a run ended by Ctrl-C outside a prompt.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Default)]
struct InterruptState {
    /// A prompt is waiting for an answer.
    waiting: AtomicBool,
    fired: AtomicBool,
}

/// Ctrl-C routing shared between the signal listener and the prompter.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<InterruptState>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for Ctrl-C on the current runtime.
    ///
    /// While a prompt waits, the signal cancels that prompt. Otherwise the
    /// run ends with status 130.
    pub fn listen(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("No runtime for the Ctrl-C listener: {}", e);
                return;
            }
        };
        let interrupt = self.clone();
        handle.spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                if interrupt.0.waiting.load(Ordering::SeqCst) {
                    interrupt.trigger();
                } else {
                    info!("Interrupted");
                    std::process::exit(INTERRUPTED_EXIT);
                }
            }
        });
    }

    /// Cancel the pending prompt, if any.
    pub fn trigger(&self) {
        self.0.fired.store(true, Ordering::SeqCst);
    }

    fn begin(&self) {
        self.0.fired.store(false, Ordering::SeqCst);
        self.0.waiting.store(true, Ordering::SeqCst);
    }

    fn end(&self) {
        self.0.waiting.store(false, Ordering::SeqCst);
    }

    fn fired(&self) -> bool {
        self.0.fired.load(Ordering::SeqCst)
    }
}

/// Reads answers from stdin on a helper thread so Ctrl-C can cancel a
/// pending prompt.
#[derive(Debug)]
pub struct TerminalPrompter {
    requests: Sender<()>,
    lines: Receiver<Option<String>>,
    /// A read was requested and its line has not been consumed yet.
    outstanding: bool,
    interrupt: Interrupt,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalPrompter {
    const POLL: Duration = Duration::from_millis(50);

    /// Prompter on stdin with the Ctrl-C listener installed.
    pub fn new() -> Self {
        let interrupt = Interrupt::new();
        interrupt.listen();
        Self::with_source(io::BufReader::new(io::stdin()), interrupt)
    }

    pub fn with_source<R: BufRead + Send + 'static>(source: R, interrupt: Interrupt) -> Self {
        let (requests, lines) = spawn_reader(source);
        Self {
            requests,
            lines,
            outstanding: false,
            interrupt,
        }
    }
}

/// One line per request, so nothing is read from stdin while no prompt is
/// showing and child processes keep their input.
fn spawn_reader<R: BufRead + Send + 'static>(mut source: R) -> (Sender<()>, Receiver<Option<String>>) {
    let (request_tx, request_rx) = mpsc::channel::<()>();
    let (line_tx, line_rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("termpilot-stdin".to_string())
        .spawn(move || {
            while request_rx.recv().is_ok() {
                let mut line = String::new();
                let answer = match source.read_line(&mut line) {
                    Ok(0) => None,
                    Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
                    Err(e) => {
                        warn!("Failed to read answer: {}", e);
                        None
                    }
                };
                if line_tx.send(answer).is_err() {
                    break;
                }
            }
        });
    // on failure the closure drops both channel ends and every prompt cancels
    if let Err(e) = spawned {
        warn!("Failed to start stdin reader: {}", e);
    }
    (request_tx, line_rx)
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        let mut stdout = io::stdout();
        if let Err(e) = write!(stdout, "{}", prompt).and_then(|_| stdout.flush()) {
            warn!("Failed to write prompt: {}", e);
        }

        // a line still pending from an interrupted prompt answers this one
        if !self.outstanding {
            if self.requests.send(()).is_err() {
                println!();
                return None;
            }
            self.outstanding = true;
        }

        self.interrupt.begin();
        let answer = loop {
            match self.lines.recv_timeout(Self::POLL) {
                Ok(answer) => {
                    self.outstanding = false;
                    break answer;
                }
                Err(RecvTimeoutError::Timeout) if self.interrupt.fired() => {
                    info!("Prompt interrupted");
                    break None;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.outstanding = false;
                    break None;
                }
            }
        };
        self.interrupt.end();

        if answer.is_none() {
            println!();
        }
        answer
    }
}

/// Replays a fixed list of answers, then reports end of input.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Every prompt shown so far.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::Instant;

    #[test]
    fn test_scripted_prompter_replays_then_eof() {
        let mut p = ScriptedPrompter::new(["y", "n"]);
        assert_eq!(p.ask("one?").as_deref(), Some("y"));
        assert_eq!(p.ask("two?").as_deref(), Some("n"));
        assert_eq!(p.ask("three?"), None);
        assert_eq!(p.asked(), ["one?", "two?", "three?"]);
    }

    #[test]
    fn test_terminal_prompter_reads_lines_then_eof() {
        let source = io::Cursor::new("yes\r\ns\n");
        let mut p = TerminalPrompter::with_source(source, Interrupt::new());
        assert_eq!(p.ask("run? ").as_deref(), Some("yes"));
        assert_eq!(p.ask("run? ").as_deref(), Some("s"));
        assert_eq!(p.ask("run? "), None);
    }

    /// Blocks every read until its sender goes away.
    struct Stalled(mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(()) | Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn test_ctrl_c_cancels_pending_prompt() {
        let (_hold, stalled) = mpsc::channel();
        let interrupt = Interrupt::new();
        let mut p = TerminalPrompter::with_source(io::BufReader::new(Stalled(stalled)), interrupt.clone());

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            interrupt.trigger();
        });
        let started = Instant::now();
        assert_eq!(p.ask("run? "), None);
        assert!(started.elapsed() < Duration::from_secs(5));
        trigger.join().unwrap();
    }
}
