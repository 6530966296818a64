use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
    pub timeout: Duration,
    /// Let the child draw on our stderr (interactive choosers).
    pub inherit_stderr: bool,
}

impl RunRequest {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            timeout,
            inherit_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn inherit_stderr(mut self) -> Self {
        self.inherit_stderr = true;
        self
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("command '{0}' not found")]
    NotFound(String),
    #[error("command '{program}' timed out after {}s", timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },
    #[error("command '{program}' exited with code {code}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },
    #[error("failed to run '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// Human-readable message stored in place of a tool's output.
    pub fn diagnostic(&self) -> String {
        format!("Error: {self}")
    }
}

pub trait CommandRunner {
    fn run(&self, request: &RunRequest) -> Result<RunOutput, RunError>;
}

/// Runs real processes with a hard deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

impl CommandRunner for SystemRunner {
    fn run(&self, request: &RunRequest) -> Result<RunOutput, RunError> {
        let program = request.program.clone();
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdout(Stdio::piped())
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(if request.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::piped()
            });
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound(program.clone())
            } else {
                RunError::Io {
                    program: program.clone(),
                    source: e,
                }
            }
        })?;

        if let (Some(mut pipe), Some(input)) = (child.stdin.take(), request.stdin.clone()) {
            thread::spawn(move || {
                let _ = pipe.write_all(input.as_bytes());
            });
        }
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + request.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::debug!("'{}' killed after {:?}", request.display(), request.timeout);
                    return Err(RunError::Timeout {
                        program,
                        timeout: request.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(RunError::Io { program, source: e });
                }
            }
        };

        Ok(RunOutput {
            code: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_are_distinct() {
        let not_found = RunError::NotFound("fzf".into()).diagnostic();
        let timeout = RunError::Timeout {
            program: "man".into(),
            timeout: Duration::from_secs(3),
        }
        .diagnostic();
        let exit = RunError::NonZeroExit {
            program: "fzf".into(),
            code: 2,
            stderr: String::new(),
        }
        .diagnostic();
        assert_eq!(not_found, "Error: command 'fzf' not found");
        assert_eq!(timeout, "Error: command 'man' timed out after 3s");
        assert_eq!(exit, "Error: command 'fzf' exited with code 2");
    }

    #[test]
    fn test_request_builder_and_display() {
        let req = RunRequest::new("man", Duration::from_secs(1))
            .arg("tar")
            .env("MANPAGER", "cat");
        assert_eq!(req.display(), "man tar");
        assert_eq!(req.env, vec![("MANPAGER".to_string(), "cat".to_string())]);
        assert!(req.stdin.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let req = RunRequest::new("sh", Duration::from_secs(5))
            .args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = SystemRunner.run(&req).unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_feeds_stdin() {
        let req = RunRequest::new("cat", Duration::from_secs(5)).stdin("a\nb\n");
        let out = SystemRunner.run(&req).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "a\nb\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_times_out() {
        let req = RunRequest::new("sleep", Duration::from_millis(100)).arg("5");
        let started = Instant::now();
        let err = SystemRunner.run(&req).unwrap_err();
        assert!(matches!(err, RunError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_system_runner_missing_program() {
        let req = RunRequest::new("clihunter-no-such-binary-xyz", Duration::from_secs(1));
        let err = SystemRunner.run(&req).unwrap_err();
        assert!(matches!(err, RunError::NotFound(ref p) if p == "clihunter-no-such-binary-xyz"));
    }
}
