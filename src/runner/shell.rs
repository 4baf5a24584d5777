//! Shell command runner
//!
//! Runs `sh -c <command>` (or `cmd /C` on Windows) in one of three modes:
//! - interactive: stdio inherited from the terminal, nothing captured
//! - piped: stdout/stderr captured and optionally echoed
//! - pty: the child gets a pseudo-terminal, output captured and echoed
//!
//! A pty run that is neither hidden nor watched by responders goes straight to
//! the real terminal. Otherwise output is pumped by helper threads into a
//! channel so responders can answer prompts while the command is still
//! running, and keyboard input is forwarded to the child.

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use super::{CommandRunner, RunError, RunOptions, RunOutput};
use crate::shutdown::ShutdownState;

/// How often the run loop checks for exit and interruption
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to keep reading after the child exited but the pty is still open
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Default pseudo-terminal size
const PTY_ROWS: u16 = 40;
const PTY_COLS: u16 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

enum Event {
    Data(Stream, Vec<u8>),
    Closed,
}

/// Chunks of user input waiting to be written to a child
type InputFeed = Arc<Mutex<Receiver<Vec<u8>>>>;

/// Spawn a thread copying `reader` into a feed
fn input_feed(mut reader: impl Read + Send + 'static) -> InputFeed {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::trace!("Input reader stopped: {}", e);
                    break;
                }
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

/// The process stdin, read by one thread for the whole process.
/// Input typed between runs stays queued for the next one.
fn stdin_feed() -> InputFeed {
    static FEED: OnceLock<InputFeed> = OnceLock::new();
    FEED.get_or_init(|| input_feed(std::io::stdin())).clone()
}

/// Decodes UTF-8 across read boundaries
#[derive(Debug, Default)]
struct Utf8Stream {
    pending: Vec<u8>,
}

impl Utf8Stream {
    /// Text complete so far; an unfinished trailing character is held back
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let split = self.pending.len() - incomplete_tail_len(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        text
    }

    /// Whatever is left once the stream closed
    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a multi-byte sequence cut off at the end of `bytes`
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        let have = bytes.len() - i;
        return if have < needed { have } else { 0 };
    }
    0
}

/// Child process handle for both spawning backends
enum ChildHandle {
    Pty(Box<dyn portable_pty::Child + Send + Sync>),
    Piped(std::process::Child),
}

impl ChildHandle {
    fn try_wait(&mut self) -> std::io::Result<Option<i32>> {
        match self {
            ChildHandle::Pty(child) => Ok(child.try_wait()?.map(|s| s.exit_code() as i32)),
            ChildHandle::Piped(child) => Ok(child.try_wait()?.map(|s| s.code().unwrap_or(-1))),
        }
    }

    fn wait(&mut self) -> std::io::Result<i32> {
        match self {
            ChildHandle::Pty(child) => Ok(child.wait()?.exit_code() as i32),
            ChildHandle::Piped(child) => Ok(child.wait()?.code().unwrap_or(-1)),
        }
    }

    fn kill(&mut self) {
        let result = match self {
            ChildHandle::Pty(child) => child.kill(),
            ChildHandle::Piped(child) => child.kill(),
        };
        if let Err(e) = result {
            log::warn!("Failed to kill child process: {}", e);
        }
    }
}

/// Runs commands through the platform shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shutdown: ShutdownState,
    cwd: Option<PathBuf>,
    /// Input forwarded to captured children, the process stdin when unset
    input: Option<InputFeed>,
}

impl ShellRunner {
    pub fn new(shutdown: ShutdownState) -> Self {
        Self {
            shutdown,
            cwd: None,
            input: None,
        }
    }

    /// Run every command from this directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Forward `reader` instead of stdin to children that capture output
    pub fn with_input(mut self, reader: impl Read + Send + 'static) -> Self {
        self.input = Some(input_feed(reader));
        self
    }

    fn input(&self) -> InputFeed {
        match self.input {
            Some(ref feed) => feed.clone(),
            None => stdin_feed(),
        }
    }

    fn shell_invocation(command: &str) -> (&'static str, [String; 2]) {
        if cfg!(target_os = "windows") {
            ("cmd", ["/C".to_string(), command.to_string()])
        } else {
            ("sh", ["-c".to_string(), command.to_string()])
        }
    }

    fn std_command(&self, command: &str) -> Command {
        let (program, args) = Self::shell_invocation(command);
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Inherit the terminal: used when no capture or responders are needed
    fn run_interactive(&self, command: &str) -> Result<RunOutput, RunError> {
        let child = self
            .std_command(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RunError::Spawn {
                command: command.to_string(),
                source: e.into(),
            })?;

        let mut handle = ChildHandle::Piped(child);
        loop {
            if self.shutdown.is_shutdown_requested() {
                handle.kill();
                let _ = handle.wait();
                return Err(RunError::Interrupted {
                    command: command.to_string(),
                });
            }
            if let Some(code) = handle.try_wait()? {
                return finish(command, code, String::new(), String::new());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn run_piped(&self, command: &str, options: &RunOptions) -> Result<RunOutput, RunError> {
        let stdin = if options.responders.is_empty() {
            Stdio::inherit()
        } else {
            Stdio::piped()
        };

        let mut child = self
            .std_command(command)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunError::Spawn {
                command: command.to_string(),
                source: e.into(),
            })?;

        let (tx, rx) = mpsc::channel();
        let mut open = 0;
        if let Some(out) = child.stdout.take() {
            pump(out, Stream::Stdout, tx.clone());
            open += 1;
        }
        if let Some(err) = child.stderr.take() {
            pump(err, Stream::Stderr, tx.clone());
            open += 1;
        }
        drop(tx);

        let input: Option<Box<dyn Write + Send>> = child
            .stdin
            .take()
            .map(|stdin| Box::new(stdin) as Box<dyn Write + Send>);

        self.drive(
            command,
            options,
            ChildHandle::Piped(child),
            input,
            rx,
            open,
        )
    }

    fn run_pty(&self, command: &str, options: &RunOptions) -> Result<RunOutput, RunError> {
        let spawn_err = |e: anyhow::Error| RunError::Spawn {
            command: command.to_string(),
            source: e,
        };

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_err(anyhow::anyhow!("Failed to open PTY: {}", e)))?;

        let (program, args) = Self::shell_invocation(command);
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Some(ref cwd) = self.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_err(anyhow::anyhow!("Failed to spawn shell: {}", e)))?;

        // Drop the slave - we only need the master
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(anyhow::anyhow!("Failed to clone PTY reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err(anyhow::anyhow!("Failed to get PTY writer: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        pump(reader, Stream::Stdout, tx);

        // The master must outlive the run loop or the child loses its terminal
        let _master = pair.master;
        self.drive(command, options, ChildHandle::Pty(child), Some(writer), rx, 1)
    }

    /// Pump output, forward input, answer prompts, and wait for the child to finish
    fn drive(
        &self,
        command: &str,
        options: &RunOptions,
        mut child: ChildHandle,
        mut input: Option<Box<dyn Write + Send>>,
        rx: Receiver<Event>,
        mut open_streams: usize,
    ) -> Result<RunOutput, RunError> {
        let feed = input.as_ref().map(|_| self.input());
        let mut responders = options.responders.clone();
        let mut decoders = [Utf8Stream::default(), Utf8Stream::default()];
        let mut stdout = String::new();
        let mut stderr = String::new();
        // Both streams in arrival order, what responders look at
        let mut transcript = String::new();
        let mut exit_code: Option<i32> = None;
        let mut exited_at: Option<Instant> = None;

        loop {
            if self.shutdown.is_shutdown_requested() {
                log::info!("Interrupt received, stopping `{}`", command);
                child.kill();
                let _ = child.wait();
                return Err(RunError::Interrupted {
                    command: command.to_string(),
                });
            }

            let mut outgoing: Vec<Vec<u8>> = Vec::new();
            if exit_code.is_none() {
                if let Some(ref feed) = feed {
                    outgoing.extend(drain_feed(feed));
                }
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Event::Data(stream, bytes)) => {
                    if !options.hide {
                        echo(stream, &bytes);
                    }
                    let text = match stream {
                        Stream::Stdout => decoders[0].push(&bytes),
                        Stream::Stderr => decoders[1].push(&bytes),
                    };
                    match stream {
                        Stream::Stdout => stdout.push_str(&text),
                        Stream::Stderr => stderr.push_str(&text),
                    }
                    transcript.push_str(&text);

                    for responder in responders.iter_mut() {
                        for response in responder.submit(&transcript) {
                            log::debug!("Responding to prompt matching `{}`", responder.pattern());
                            outgoing.push(response.into_bytes());
                        }
                    }
                    if let Some(at) = exited_at.as_mut() {
                        *at = Instant::now();
                    }
                }
                Ok(Event::Closed) => open_streams = open_streams.saturating_sub(1),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => open_streams = 0,
            }

            if let Some(ref mut writer) = input {
                if let Err(e) = write_all_chunks(writer.as_mut(), &outgoing) {
                    log::warn!("Failed to write to `{}`: {}", command, e);
                    child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }

            if exit_code.is_none() {
                exit_code = child.try_wait()?;
                if exit_code.is_some() {
                    exited_at = Some(Instant::now());
                }
            }

            if open_streams == 0 {
                break;
            }
            // Some platforms keep the pty readable after the child is gone
            if let Some(at) = exited_at {
                if at.elapsed() >= DRAIN_GRACE {
                    break;
                }
            }
        }

        stdout.push_str(&decoders[0].finish());
        stderr.push_str(&decoders[1].finish());

        let code = match exit_code {
            Some(code) => code,
            None => child.wait()?,
        };
        finish(command, code, stdout, stderr)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, RunError> {
        log::debug!(
            "Running `{}` (pty: {}, hide: {}, responders: {})",
            command,
            options.pty,
            options.hide,
            options.responders.len()
        );

        let watched = options.hide || !options.responders.is_empty();
        if !watched {
            // The child gets the real terminal, pty or not
            self.run_interactive(command)
        } else if options.pty {
            self.run_pty(command, options)
        } else {
            self.run_piped(command, options)
        }
    }
}

fn pump(mut reader: impl Read + Send + 'static, stream: Stream, tx: Sender<Event>) {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Event::Data(stream, buf[..n].to_vec())).is_err() {
                        return;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                // A closed pty reports EIO instead of EOF on Linux
                Err(e) => {
                    log::trace!("Output reader for {:?} stopped: {}", stream, e);
                    break;
                }
            }
        }
        let _ = tx.send(Event::Closed);
    });
}

/// Queued input chunks, without blocking
fn drain_feed(feed: &InputFeed) -> Vec<Vec<u8>> {
    let Ok(rx) = feed.lock() else {
        return Vec::new();
    };
    let mut chunks = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(chunk) => chunks.push(chunk),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    chunks
}

fn write_all_chunks(writer: &mut (dyn Write + Send), chunks: &[Vec<u8>]) -> std::io::Result<()> {
    if chunks.is_empty() {
        return Ok(());
    }
    for chunk in chunks {
        writer.write_all(chunk)?;
    }
    writer.flush()
}

fn echo(stream: Stream, bytes: &[u8]) {
    let result = match stream {
        Stream::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(bytes).and_then(|_| out.flush())
        }
        Stream::Stderr => {
            let mut err = std::io::stderr().lock();
            err.write_all(bytes).and_then(|_| err.flush())
        }
    };
    if let Err(e) = result {
        log::warn!("Failed to echo command output: {}", e);
    }
}

fn finish(command: &str, code: i32, stdout: String, stderr: String) -> Result<RunOutput, RunError> {
    if code == 0 {
        Ok(RunOutput {
            stdout,
            stderr,
            exit_code: code,
        })
    } else {
        Err(RunError::Failure {
            command: command.to_string(),
            exit_code: code,
            stdout,
            stderr,
        })
    }
}
