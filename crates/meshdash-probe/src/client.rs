use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Upper bound for `ip` and `status` calls.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Extra time a ping process gets beyond its own `--timeout`.
pub const PING_GRACE: Duration = Duration::from_secs(1);

/// The mesh client commands the dashboard relies on.
pub trait MeshClient: Send + Sync {
    /// Output of `ip -4`: the local node's mesh address.
    fn self_ip(&self) -> Result<String>;

    /// Output of `status`: one line per known peer.
    fn status(&self) -> Result<String>;

    /// Output of a single ping round. A ping that times out is still `Ok`;
    /// only a failure to run the client at all, or a client that outlives
    /// its deadline, is an error.
    fn ping(&self, address: &str, timeout: Duration) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct TailscaleCli {
    binary: PathBuf,
    command_timeout: Duration,
}

impl Default for TailscaleCli {
    fn default() -> Self {
        Self::new("tailscale")
    }
}

impl TailscaleCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Runs the client and collects stdout and stderr. A child still running
    /// at `deadline` is killed and reported as an error.
    fn capture(
        &self,
        args: &[&str],
        require_success: bool,
        deadline: Duration,
    ) -> Result<String> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {command}"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("missing stdout for {command}"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("missing stderr for {command}"))?;
        let stdout = drain(stdout);
        let stderr = drain(stderr);

        let status = match child
            .wait_timeout(deadline)
            .with_context(|| format!("failed to wait for {command}"))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                // Readers are left behind: a grandchild may still hold the pipes.
                return Err(anyhow!("{command} timed out after {deadline:?}"));
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if require_success && !status.success() {
            return Err(anyhow!("{command} failed (status: {status}): {stderr}{stdout}"));
        }

        let mut text = stdout;
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        Ok(text.trim().to_string())
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl MeshClient for TailscaleCli {
    fn self_ip(&self) -> Result<String> {
        self.capture(&["ip", "-4"], true, self.command_timeout)
    }

    fn status(&self) -> Result<String> {
        self.capture(&["status"], true, self.command_timeout)
    }

    fn ping(&self, address: &str, timeout: Duration) -> Result<String> {
        let flag = go_duration(timeout);
        self.capture(
            &["ping", "--c", "1", "--timeout", &flag, address],
            false,
            timeout + PING_GRACE,
        )
    }
}

/// Formats a timeout the way the client's flag parser expects (`1s`, `1500ms`).
fn go_duration(timeout: Duration) -> String {
    let millis = timeout.as_millis().max(1);
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}
