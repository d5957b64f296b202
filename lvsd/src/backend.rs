use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Handle;
use crate::error::CommandError;

/// The two capabilities the mirror needs from its environment. `argv`
/// always starts with the program to run.
pub trait Backend {
    /// Runs a command to completion and returns what it printed on stdout.
    fn run(&self, argv: &[String]) -> Result<Vec<u8>, CommandError>;

    /// Runs a command with `input` streamed to its stdin.
    fn run_with_input(&self, input: &str, argv: &[String]) -> Result<(), CommandError>;
}

/// Runs commands as child processes, each bounded by a timeout.
///
/// The mirror lives on a plain thread, so calls are driven to completion
/// on the daemon's runtime through `Handle::block_on`. A command that
/// outlives the timeout is killed and reported as failed.
pub struct CommandBackend {
    runtime: Handle,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(runtime: Handle, timeout: Duration) -> Self {
        Self { runtime, timeout }
    }

    fn execute(&self, argv: &[String], input: Option<&str>) -> Result<Vec<u8>, CommandError> {
        tracing::debug!("Running {}", argv.join(" "));

        let output = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, spawn_and_wait(argv, input)).await })
            .map_err(|_| CommandError::new(argv, format!("timed out after {:?}", self.timeout)))??;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Err(CommandError::new(
            argv,
            format!("{} output: {}", output.status, String::from_utf8_lossy(&combined).trim()),
        ))
    }
}

async fn spawn_and_wait(argv: &[String], input: Option<&str>) -> Result<Output, CommandError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| CommandError::new(argv, "empty command line"))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandError::new(argv, e.to_string()))?;

    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(|e| CommandError::new(argv, e.to_string()))?;
    // a failed exit status explains a broken pipe better than the write error
    if let Err(e) = fed {
        if output.status.success() {
            return Err(CommandError::new(argv, format!("failed to write input: {}", e)));
        }
    }
    Ok(output)
}

impl Backend for CommandBackend {
    fn run(&self, argv: &[String]) -> Result<Vec<u8>, CommandError> {
        self.execute(argv, None)
    }

    fn run_with_input(&self, input: &str, argv: &[String]) -> Result<(), CommandError> {
        self.execute(argv, Some(input)).map(|_| ())
    }
}
