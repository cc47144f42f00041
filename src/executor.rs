use crate::config::ExecutionConfig;
use crate::safety::check_command;
use crate::types::{Command, ExecutionResult};
use std::{
    io::{self, Read},
    process::{Child, Command as Process, ExitStatus, Stdio},
    sync::{mpsc, Arc, Mutex},
    thread,
    time::{Duration, Instant},
};
use wait_timeout::ChildExt;

pub const TRUNCATION_MARKER: &str = "... (output truncated)";

/// How long the pipes may stay open once the command itself is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What happened to a spawned process.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnOutcome {
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        stdout: String,
        stderr: String,
    },
}

/// Runs one command string to completion or until the timeout elapses.
pub trait Spawner {
    fn run(&self, command: &str, timeout: Duration) -> io::Result<SpawnOutcome>;
}

/// Runs commands through `<shell> -c`, each in its own process group so a
/// timeout can take down everything the command started.
pub struct ShellSpawner {
    shell: String,
}

impl ShellSpawner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellSpawner {
    fn default() -> Self {
        Self::new("sh")
    }
}

/// Bytes read from one pipe by a background thread.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();
        thread::spawn(move || {
            if let Some(mut reader) = pipe {
                let mut chunk = [0u8; 4096];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = sink.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Whatever was read by `deadline`. A descendant that escaped the process
    /// group may still hold the pipe; its reader thread is left behind.
    fn collect(self, deadline: Instant) -> String {
        let _ = self
            .done
            .recv_timeout(deadline.saturating_duration_since(Instant::now()));
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only sends a signal; the group was created for this child
    // by `process_group(0)` and an already-empty group just yields ESRCH.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

/// Waits with `wait`, then kills the group whatever the outcome. A child that
/// did not exit on its own is reaped before returning.
fn wait_then_kill<W>(child: &mut Child, wait: W) -> io::Result<Option<ExitStatus>>
where
    W: FnOnce(&mut Child) -> io::Result<Option<ExitStatus>>,
{
    let waited = wait(child);
    // Background stragglers would otherwise hold the pipes open.
    kill_process_group(child);
    if !matches!(waited, Ok(Some(_))) {
        let _ = child.wait();
    }
    waited
}

impl Spawner for ShellSpawner {
    fn run(&self, command: &str, timeout: Duration) -> io::Result<SpawnOutcome> {
        let mut process = Process::new(&self.shell);
        process
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            process.process_group(0);
        }

        let mut child = process.spawn()?;
        let stdout_reader = PipeReader::spawn(child.stdout.take());
        let stderr_reader = PipeReader::spawn(child.stderr.take());

        let status = wait_then_kill(&mut child, |c| c.wait_timeout(timeout))?;

        let deadline = Instant::now() + DRAIN_GRACE;
        let stdout = stdout_reader.collect(deadline);
        let stderr = stderr_reader.collect(deadline);

        Ok(match status {
            Some(status) => SpawnOutcome::Exited {
                code: status.code(),
                stdout,
                stderr,
            },
            None => SpawnOutcome::TimedOut { stdout, stderr },
        })
    }
}

pub struct CommandExecutor<P = ShellSpawner> {
    spawner: P,
    timeout_secs: u64,
    max_output_lines: usize,
}

impl CommandExecutor<ShellSpawner> {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self::with_spawner(config, ShellSpawner::new(config.shell.clone()))
    }
}

impl<P: Spawner> CommandExecutor<P> {
    pub fn with_spawner(config: &ExecutionConfig, spawner: P) -> Self {
        Self {
            spawner,
            timeout_secs: config.command_timeout,
            max_output_lines: config.max_output_lines,
        }
    }

    pub fn spawner(&self) -> &P {
        &self.spawner
    }

    /// One result per command, in order. A failing command never stops the
    /// ones after it.
    pub fn execute(&self, commands: &[Command]) -> Vec<ExecutionResult> {
        let results: Vec<ExecutionResult> = commands.iter().map(|c| self.execute_one(c)).collect();
        let ok = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(total = results.len(), succeeded = ok, "executed command plan");
        results
    }

    pub fn execute_one(&self, command: &Command) -> ExecutionResult {
        let cmd = command.command.as_str();

        if let Some(reason) = check_command(cmd) {
            tracing::warn!(command = cmd, reason, "blocked dangerous command");
            return ExecutionResult::blocked(cmd, reason);
        }

        tracing::debug!(command = cmd, timeout = self.timeout_secs, "spawning");
        match self.spawner.run(cmd, Duration::from_secs(self.timeout_secs)) {
            Ok(SpawnOutcome::Exited {
                code,
                stdout,
                stderr,
            }) => {
                let output = truncate_output(&combine(&stdout, &stderr), self.max_output_lines);
                if code == Some(0) {
                    ExecutionResult::success(cmd, output)
                } else {
                    let error = match stderr.trim() {
                        "" => match code {
                            Some(c) => format!("Command exited with code {}", c),
                            None => "Command terminated by signal".to_string(),
                        },
                        msg => msg.to_string(),
                    };
                    ExecutionResult::failed(cmd, code, output, error)
                }
            }
            Ok(SpawnOutcome::TimedOut { stdout, stderr }) => {
                tracing::warn!(command = cmd, timeout = self.timeout_secs, "command timed out");
                let output = truncate_output(&combine(&stdout, &stderr), self.max_output_lines);
                ExecutionResult::timeout(cmd, self.timeout_secs, output)
            }
            Err(e) => ExecutionResult::error(cmd, format!("Failed to start command: {}", e)),
        }
    }
}

fn combine(stdout: &str, stderr: &str) -> String {
    let mut lines: Vec<&str> = stdout.lines().collect();
    lines.extend(stderr.lines());
    lines.join("\n")
}

/// Keeps the first `max_lines` lines and appends a marker line when anything
/// was dropped.
pub fn truncate_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }
    let mut kept: Vec<&str> = lines[..max_lines].to_vec();
    kept.push(TRUNCATION_MARKER);
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionStatus;
    use std::cell::RefCell;

    struct RecordingSpawner {
        calls: RefCell<Vec<String>>,
        outcome: SpawnOutcome,
    }

    impl RecordingSpawner {
        fn returning(outcome: SpawnOutcome) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                outcome,
            }
        }
    }

    impl Spawner for RecordingSpawner {
        fn run(&self, command: &str, _timeout: Duration) -> io::Result<SpawnOutcome> {
            self.calls.borrow_mut().push(command.to_string());
            Ok(self.outcome.clone())
        }
    }

    fn exited_ok(stdout: &str) -> SpawnOutcome {
        SpawnOutcome::Exited {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn config() -> ExecutionConfig {
        ExecutionConfig {
            command_timeout: 5,
            max_output_lines: 10,
            ..ExecutionConfig::default()
        }
    }

    #[test]
    fn blocked_commands_never_spawn() {
        let executor = CommandExecutor::with_spawner(&config(), RecordingSpawner::returning(exited_ok("")));
        let commands = vec![
            Command::new("rm -rf /", "", "command"),
            Command::new("sudo rm -rf /", "", "command"),
            Command::new("shutdown -h now", "", "command"),
        ];
        let results = executor.execute(&commands);

        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.status, ExecutionStatus::Blocked);
            assert!(result.error.as_deref().unwrap().contains("Dangerous command blocked"));
        }
        assert!(executor.spawner().calls.borrow().is_empty());
    }

    #[test]
    fn allowed_sudo_command_is_spawned() {
        let executor =
            CommandExecutor::with_spawner(&config(), RecordingSpawner::returning(exited_ok("Success")));
        let results = executor.execute(&[Command::new("sudo apt-get update", "", "command")]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ExecutionStatus::Success);
        assert_eq!(executor.spawner().calls.borrow().len(), 1);
    }

    #[test]
    fn spawn_failure_is_error_status() {
        struct Broken;
        impl Spawner for Broken {
            fn run(&self, _: &str, _: Duration) -> io::Result<SpawnOutcome> {
                Err(io::Error::new(io::ErrorKind::NotFound, "no shell"))
            }
        }
        let executor = CommandExecutor::with_spawner(&config(), Broken);
        let result = executor.execute_one(&Command::new("echo hi", "", "command"));
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error.unwrap().contains("no shell"));
    }

    #[test]
    fn failure_without_stderr_synthesizes_message() {
        let spawner = RecordingSpawner::returning(SpawnOutcome::Exited {
            code: Some(3),
            stdout: String::new(),
            stderr: String::new(),
        });
        let executor = CommandExecutor::with_spawner(&config(), spawner);
        let result = executor.execute_one(&Command::new("exit 3", "", "command"));
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.return_code, Some(3));
        assert_eq!(result.error.as_deref(), Some("Command exited with code 3"));
    }

    #[cfg(unix)]
    #[test]
    fn wait_error_still_kills_and_reaps() {
        use std::os::unix::process::{CommandExt, ExitStatusExt};

        let mut child = Process::new("sleep")
            .arg("5")
            .process_group(0)
            .spawn()
            .unwrap();
        let started = Instant::now();
        let waited = wait_then_kill(&mut child, |_| Err(io::Error::new(io::ErrorKind::Other, "wait failed")));

        assert!(waited.is_err());
        let status = child.try_wait().unwrap().expect("child reaped");
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn truncation_keeps_max_plus_marker() {
        let text = "a\nb\nc\nd\ne";
        let truncated = truncate_output(text, 3);
        assert_eq!(truncated, "a\nb\nc\n... (output truncated)");
        assert_eq!(truncate_output(text, 5), text);
        assert_eq!(truncate_output("", 3), "");
    }
}
