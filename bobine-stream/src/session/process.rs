//! Encoder child-process ownership.
//!
//! Every encoder child is owned by exactly one holder and must be killed,
//! reaped and cleaned up on every exit path. [`ScopedChild`] guarantees the
//! kill-and-reap half even when the holder is simply dropped (a client
//! walking away from a piped response body). Stderr is drained concurrently
//! with stdout: an undrained pipe fills and blocks the child.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr};
use tracing::{debug, warn};

/// How much of the stderr stream is retained for diagnostics.
const STDERR_TAIL_BYTES: usize = 1024;

/// The trailing bytes of a child's stderr, capped at ~1 KB.
#[derive(Clone, Default)]
pub struct StderrTail {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl StderrTail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, chunk: &[u8]) {
        let mut buf = self.buf.lock();
        buf.extend_from_slice(chunk);
        let len = buf.len();
        if len > STDERR_TAIL_BYTES {
            buf.drain(..len - STDERR_TAIL_BYTES);
        }
    }

    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

/// Consume the child's stderr in its own task, retaining only the tail.
pub fn spawn_stderr_drain(mut stderr: ChildStderr) -> StderrTail {
    let tail = StderrTail::new();
    let writer = tail.clone();

    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => writer.push(&chunk[..n]),
                Err(e) => {
                    debug!("stderr drain ended: {}", e);
                    break;
                }
            }
        }
    });

    tail
}

/// A child process that cannot outlive its owner.
///
/// Dropping the guard sends SIGKILL and hands the wait to a background
/// task so the zombie is reaped; explicit teardown paths should prefer
/// [`ScopedChild::kill_and_wait`] to know the process is gone before, for
/// example, deleting its output directory.
pub struct ScopedChild {
    child: Option<Child>,
}

impl ScopedChild {
    #[must_use]
    pub fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Kill the child and wait for it to be reaped.
    pub async fn kill_and_wait(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("kill failed (already exited?): {}", e);
            }
            match child.wait().await {
                Ok(status) => debug!(%status, "encoder child reaped"),
                Err(e) => warn!("failed to reap encoder child: {}", e),
            }
        }
    }

    /// Wait for natural exit, consuming the guard's ownership of the child.
    pub async fn wait(&mut self) -> Option<std::process::ExitStatus> {
        let mut child = self.child.take()?;
        match child.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("wait on encoder child failed: {}", e);
                None
            }
        }
    }
}

impl Drop for ScopedChild {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("kill on drop failed: {}", e);
            }
            // Reap in the background; the runtime is alive wherever
            // streaming bodies are being dropped.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    match child.wait().await {
                        Ok(status) => debug!(%status, "dropped encoder child reaped"),
                        Err(e) => warn!("failed to reap dropped encoder child: {}", e),
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[test]
    fn stderr_tail_keeps_only_the_end() {
        let tail = StderrTail::new();
        tail.push(&vec![b'a'; 2000]);
        tail.push(b"the end");

        let contents = tail.contents();
        assert!(contents.len() <= STDERR_TAIL_BYTES);
        assert!(contents.ends_with("the end"));
    }

    #[tokio::test]
    async fn kill_and_wait_reaps_a_long_running_child() {
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();

        let mut scoped = ScopedChild::new(child);
        // Returns promptly instead of waiting out the sleep.
        tokio::time::timeout(std::time::Duration::from_secs(5), scoped.kill_and_wait())
            .await
            .expect("kill_and_wait should not block");
    }

    #[tokio::test]
    async fn drain_captures_stderr_output() {
        let mut child = Command::new("sh")
            .args(["-c", "echo probe-line >&2"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let tail = spawn_stderr_drain(child.stderr.take().unwrap());
        child.wait().await.unwrap();

        // Give the drain task a beat to observe EOF.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(tail.contents().contains("probe-line"));
    }
}
