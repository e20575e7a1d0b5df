//! Transient `hg` invocations that do not go through the command server:
//! `init` and `clone`. Both spawn a short-lived process, wait for it to
//! exit, and report failure via [`HgError::CommandFailed`].

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use crate::error::HgError;
use crate::types::CommandResult;

const INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `hg init <destination>`, waiting up to five seconds for it to
/// complete.
pub fn init(destination: impl AsRef<Path>, hg_path: impl AsRef<Path>) -> Result<(), HgError> {
    let destination = destination.as_ref().to_string_lossy().into_owned();
    let argv = vec!["init".to_string(), destination];
    run_with_timeout(hg_path.as_ref(), &argv, Some(INIT_TIMEOUT))
}

/// Runs `hg clone [flags…] <source> [<destination>]`.
pub fn clone(
    source: &str,
    destination: Option<&str>,
    flags: &[String],
    hg_path: impl AsRef<Path>,
) -> Result<(), HgError> {
    let mut argv = vec!["clone".to_string()];
    argv.extend(flags.iter().cloned());
    argv.push(source.to_string());
    if let Some(destination) = destination {
        argv.push(destination.to_string());
    }
    run_with_timeout(hg_path.as_ref(), &argv, None)
}

fn run_with_timeout(
    hg_path: &Path,
    argv: &[String],
    timeout: Option<Duration>,
) -> Result<(), HgError> {
    log::debug!("launching one-shot hg process: {hg_path:?} {argv:?}");

    let mut child = Command::new(hg_path)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(HgError::ServerLaunchFailed)?;

    let mut stdout = child.stdout.take().expect("stdout was piped at spawn");
    let mut stderr = child.stderr.take().expect("stderr was piped at spawn");

    // Drain stdout/stderr on their own threads, concurrently with waiting on
    // the child. A chatty child (e.g. `hg clone` of a non-trivial repo)
    // would otherwise block on a full pipe buffer while nothing is reading
    // it, since `wait()` only observes process exit, not pipe contents.
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf);
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    });

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    let status = match timeout {
        Some(timeout) => rx
            .recv_timeout(timeout)
            .map_err(|_| HgError::ProtocolError("hg process timed out".to_string()))?,
        None => rx
            .recv()
            .map_err(|_| HgError::ProtocolError("hg process wait thread died".to_string()))?,
    }
    .map_err(HgError::from)?;

    let stdout_buf = stdout_reader.join().unwrap_or_default();
    let stderr_buf = stderr_reader.join().unwrap_or_default();

    let result = CommandResult {
        stdout: stdout_buf,
        stderr: stderr_buf,
        exit_code: status.code().unwrap_or(-1),
    };

    log::debug!("one-shot hg process exited with {}", result.exit_code);

    if result.exit_code == 0 {
        Ok(())
    } else {
        Err(HgError::CommandFailed { result })
    }
}
