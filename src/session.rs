//! The server session: process lifecycle, handshake, and the
//! mutex-serialized `run_command`/`get_command_output` primitives that the
//! high-level command API is built on.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::demux::{self, InputProvider, OutputSink};
use crate::encoding::TextEncoding;
use crate::error::HgError;
use crate::frame;
use crate::parsers;
use crate::types::{ChannelTag, CommandResult};

/// Caller-facing configuration for [`Session::open`], expressed as a
/// builder rather than a positional parameter list (see the Design Notes
/// on ambient configuration objects).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    hg_path: PathBuf,
    config: Vec<(String, String)>,
    encoding_override: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            hg_path: PathBuf::from("hg"),
            config: Vec::new(),
            encoding_override: None,
        }
    }
}

impl SessionOptions {
    /// Starts from the defaults: `hg_path = "hg"`, no extra `--config`
    /// overrides, no encoding override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the `hg` binary to launch.
    pub fn hg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hg_path = path.into();
        self
    }

    /// Appends a `key=value` pair to the server's `--config` argument.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    /// Sets `HGENCODING` in the child's environment. Per the resolved open
    /// question in the Design Notes, this is only honored when non-empty;
    /// the negotiated handshake encoding is always what the session
    /// actually uses to encode/decode, regardless of this override.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding_override = Some(encoding.into());
        self
    }
}

/// The pipe's `child` handle is `None` only in the in-process test fixture
/// (see [`Session::for_test`]); a session created by [`Session::open`]
/// always owns a real child.
struct Pipe {
    child: Option<Child>,
    stdin: Box<dyn Write + Send>,
    stdout: Box<dyn BufRead + Send>,
}

/// A live connection to an `hg` command server subprocess.
///
/// At most one command runs at a time; concurrent callers serialize on an
/// internal mutex that guards the pipe for the full duration of
/// `run_command`. Once a transport-level error occurs the session is
/// poisoned and every subsequent call fails with [`HgError::ServerClosed`].
pub struct Session {
    pipe: Mutex<Pipe>,
    poisoned: AtomicBool,
    encoding: TextEncoding,
    capabilities: HashSet<String>,
    root_cache: Mutex<Option<String>>,
    version_cache: Mutex<Option<String>>,
    config_cache: Mutex<Option<HashMap<String, String>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("encoding", &self.encoding.name())
            .field("capabilities", &self.capabilities)
            .field("poisoned", &self.poisoned.load(Ordering::SeqCst))
            .finish()
    }
}

impl Session {
    /// Spawns the command server for the repository at `path` and performs
    /// the handshake.
    ///
    /// Fails with [`HgError::InvalidRepository`] if `path` has no `.hg`
    /// directory, [`HgError::ServerLaunchFailed`] if the process can't be
    /// spawned, or [`HgError::HandshakeError`] if the handshake frame is
    /// missing or malformed.
    pub fn open(path: impl AsRef<Path>, options: SessionOptions) -> Result<Session, HgError> {
        let path = path.as_ref();
        if !path.join(".hg").is_dir() {
            return Err(HgError::InvalidRepository(path.to_path_buf()));
        }

        let repo = path.to_string_lossy().into_owned();
        let mut argv = vec![
            "serve".to_string(),
            "--cmdserver".to_string(),
            "pipe".to_string(),
            "--cwd".to_string(),
            repo.clone(),
            "--repository".to_string(),
            repo,
        ];
        if !options.config.is_empty() {
            let joined = options
                .config
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            argv.push("--config".to_string());
            argv.push(joined);
        }

        log::debug!("launching hg command server: {:?} {argv:?}", options.hg_path);
        let mut command = Command::new(&options.hg_path);
        command
            .args(&argv)
            .env("LANG", "en_US")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(encoding) = options.encoding_override.filter(|e| !e.is_empty()) {
            command.env("HGENCODING", encoding);
        }

        let mut child = command.spawn().map_err(HgError::ServerLaunchFailed)?;
        let stdin = child.stdin.take().expect("stdin was piped at spawn");
        let stdout = child.stdout.take().expect("stdout was piped at spawn");
        let _stderr = child.stderr.take();
        let mut stdout = BufReader::new(stdout);

        let (encoding, capabilities) = negotiate_handshake(&mut stdout)?;

        Ok(Session {
            pipe: Mutex::new(Pipe {
                child: Some(child),
                stdin: Box::new(stdin),
                stdout: Box::new(stdout),
            }),
            poisoned: AtomicBool::new(false),
            encoding,
            capabilities,
            root_cache: Mutex::new(None),
            version_cache: Mutex::new(None),
            config_cache: Mutex::new(None),
        })
    }

    /// Builds a session over an already-connected pair of pipes, skipping
    /// process spawn and the handshake. Used by tests to exercise
    /// `run_command`'s serialization and poisoning behavior against a
    /// scripted frame stream instead of a real `hg` binary.
    #[cfg(test)]
    pub(crate) fn for_test(
        stdin: impl Write + Send + 'static,
        stdout: impl BufRead + Send + 'static,
        encoding: TextEncoding,
        capabilities: HashSet<String>,
    ) -> Session {
        Session {
            pipe: Mutex::new(Pipe {
                child: None,
                stdin: Box::new(stdin),
                stdout: Box::new(stdout),
            }),
            poisoned: AtomicBool::new(false),
            encoding,
            capabilities,
            root_cache: Mutex::new(None),
            version_cache: Mutex::new(None),
            config_cache: Mutex::new(None),
        }
    }

    /// The encoding negotiated at handshake. Fixed for the session's
    /// lifetime.
    pub fn encoding(&self) -> &TextEncoding {
        &self.encoding
    }

    /// The capability tokens the server advertised at handshake.
    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    /// The repository root, read once and cached for the session's
    /// lifetime.
    pub fn root(&self) -> Result<String, HgError> {
        let mut cache = self.root_cache.lock().expect("root cache mutex poisoned");
        if let Some(root) = cache.as_ref() {
            return Ok(root.clone());
        }

        let result = self.get_command_output(&["root".to_string()])?;
        apply_exit_policy(&result, &[0])?;
        let root = result.stdout.trim().to_string();
        *cache = Some(root.clone());
        Ok(root)
    }

    /// The server's normalized version string, read once and cached.
    pub fn version(&self) -> Result<String, HgError> {
        let mut cache = self
            .version_cache
            .lock()
            .expect("version cache mutex poisoned");
        if let Some(version) = cache.as_ref() {
            return Ok(version.clone());
        }

        let result = self.get_command_output(&["version".to_string()])?;
        apply_exit_policy(&result, &[0])?;
        let version = parsers::parse_version(&result.stdout)?;
        *cache = Some(version.clone());
        Ok(version)
    }

    /// The repository's effective configuration (`hg showconfig`), read
    /// once and cached.
    pub fn configuration(&self) -> Result<HashMap<String, String>, HgError> {
        let mut cache = self
            .config_cache
            .lock()
            .expect("config cache mutex poisoned");
        if let Some(config) = cache.as_ref() {
            return Ok(config.clone());
        }

        let result = self.get_command_output(&["showconfig".to_string()])?;
        apply_exit_policy(&result, &[0])?;
        let config = parsers::parse_kv(&result.stdout, &["="]);
        *cache = Some(config.clone());
        Ok(config)
    }

    /// Runs one command to completion and returns its exit code.
    ///
    /// Acquires the session's pipe mutex for the full duration: writing the
    /// `runcommand` frame, demultiplexing the response stream into
    /// `output_sinks`/`input_providers`, and reading the terminating
    /// `Result` frame. A transport-level failure (`ServerClosed` or
    /// `ProtocolError`) poisons the session.
    pub fn run_command(
        &self,
        argv: &[String],
        output_sinks: HashMap<ChannelTag, OutputSink<'_>>,
        input_providers: HashMap<ChannelTag, InputProvider<'_>>,
    ) -> Result<i32, HgError> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(HgError::ServerClosed);
        }

        let mut pipe = self.pipe.lock().expect("session pipe mutex poisoned");
        log::debug!("dispatching command: {argv:?}");

        let encoded: Vec<Vec<u8>> = argv.iter().map(|a| self.encoding.encode(a)).collect();
        let result = frame::write_runcommand(&mut pipe.stdin, &encoded).and_then(|()| {
            demux::drive_command(&mut pipe.stdout, &mut pipe.stdin, output_sinks, input_providers)
        });

        if let Err(ref err) = result {
            if matches!(err, HgError::ServerClosed | HgError::ProtocolError(_)) {
                log::error!("poisoning session after transport error: {err}");
                self.poisoned.store(true, Ordering::SeqCst);
            }
        }

        result
    }

    /// Runs a command, capturing its Output/Error channels into a decoded
    /// [`CommandResult`]. Convenience wrapper around [`Session::run_command`]
    /// for commands with no interactive input.
    pub fn get_command_output(&self, argv: &[String]) -> Result<CommandResult, HgError> {
        self.get_command_output_with_input(argv, HashMap::new())
    }

    /// Like [`Session::get_command_output`], but additionally registers
    /// input providers for interactive channels.
    pub fn get_command_output_with_input(
        &self,
        argv: &[String],
        input_providers: HashMap<ChannelTag, InputProvider<'_>>,
    ) -> Result<CommandResult, HgError> {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let exit_code = {
            let mut sinks: HashMap<ChannelTag, OutputSink<'_>> = HashMap::new();
            sinks.insert(ChannelTag::Output, &mut stdout_buf);
            sinks.insert(ChannelTag::Error, &mut stderr_buf);
            self.run_command(argv, sinks, input_providers)?
        };

        Ok(CommandResult {
            stdout: self.encoding.decode(&stdout_buf),
            stderr: self.encoding.decode(&stderr_buf),
            exit_code,
        })
    }

    /// Terminates the child process and releases its handles. Safe to call
    /// more than once.
    pub fn close(&self) {
        let mut pipe = self.pipe.lock().expect("session pipe mutex poisoned");
        kill_child(&mut pipe.child);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(mut pipe) = self.pipe.lock() {
            kill_child(&mut pipe.child);
        }
    }
}

fn kill_child(child: &mut Option<Child>) {
    if let Some(child) = child.as_mut() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Reads and parses the handshake frame: a single `Output` frame of
/// `\n`-delimited `key: value` lines, requiring `encoding` and
/// `capabilities`.
fn negotiate_handshake<R: BufRead>(
    stdout: &mut R,
) -> Result<(TextEncoding, HashSet<String>), HgError> {
    let handshake = frame::read_handshake(stdout)?;
    let handshake_text = String::from_utf8_lossy(&handshake).into_owned();
    let fields = parsers::parse_kv(&handshake_text, &[": "]);

    let encoding_name = fields
        .get("encoding")
        .ok_or_else(|| HgError::HandshakeError("missing 'encoding' header".to_string()))?;
    let capabilities_line = fields
        .get("capabilities")
        .ok_or_else(|| HgError::HandshakeError("missing 'capabilities' header".to_string()))?;

    let encoding = TextEncoding::resolve(encoding_name)?;
    let capabilities = capabilities_line
        .split_whitespace()
        .map(str::to_string)
        .collect();

    log::debug!("handshake complete: encoding={encoding_name}");
    Ok((encoding, capabilities))
}

/// Applies a command's exit-code policy: fails with
/// [`HgError::CommandFailed`] unless `result.exit_code` is in `accepted`.
pub(crate) fn apply_exit_policy(result: &CommandResult, accepted: &[i32]) -> Result<(), HgError> {
    if accepted.contains(&result.exit_code) {
        Ok(())
    } else {
        Err(HgError::CommandFailed {
            result: result.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn frame_bytes(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![tag];
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn result_frame(code: i32) -> Vec<u8> {
        frame_bytes(b'r', &code.to_be_bytes())
    }

    #[test]
    fn negotiates_handshake_from_an_output_frame() {
        let mut stream = Cursor::new(frame_bytes(
            b'o',
            b"capabilities: runcommand getencoding\nencoding: UTF-8\n",
        ));
        let (encoding, capabilities) = negotiate_handshake(&mut stream).unwrap();

        assert_eq!(encoding.name(), "UTF-8");
        assert_eq!(
            capabilities,
            HashSet::from(["runcommand".to_string(), "getencoding".to_string()])
        );
    }

    #[test]
    fn handshake_requires_encoding_and_capabilities() {
        let mut stream = Cursor::new(frame_bytes(b'o', b"encoding: UTF-8\n"));
        let err = negotiate_handshake(&mut stream).unwrap_err();
        assert!(matches!(err, HgError::HandshakeError(_)));
    }

    #[test]
    fn status_happy_path_against_a_fixture() {
        let mut stdout = Vec::new();
        stdout.extend(frame_bytes(b'o', b"M file1.txt\n? file2.txt\n"));
        stdout.extend(result_frame(0));

        let session = Session::for_test(
            Vec::new(),
            Cursor::new(stdout),
            TextEncoding::resolve("UTF-8").unwrap(),
            HashSet::new(),
        );

        let result = session
            .get_command_output(&["status".to_string()])
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "M file1.txt\n? file2.txt\n");
    }

    #[test]
    fn poisons_after_an_invalid_channel_byte() {
        let mut stdout = Vec::new();
        stdout.extend(frame_bytes(b'X', b""));

        let session = Session::for_test(
            Vec::new(),
            Cursor::new(stdout),
            TextEncoding::resolve("UTF-8").unwrap(),
            HashSet::new(),
        );

        let err = session
            .get_command_output(&["status".to_string()])
            .unwrap_err();
        assert!(matches!(err, HgError::ProtocolError(_)));

        let err = session
            .get_command_output(&["status".to_string()])
            .unwrap_err();
        assert!(matches!(err, HgError::ServerClosed));
    }

    #[test]
    fn serializes_concurrent_commands_across_threads() {
        const THREADS: usize = 8;

        let mut stdout = Vec::new();
        for _ in 0..THREADS {
            stdout.extend(result_frame(0));
        }

        let session = Arc::new(Session::for_test(
            Vec::new(),
            Cursor::new(stdout),
            TextEncoding::resolve("UTF-8").unwrap(),
            HashSet::new(),
        ));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    session.get_command_output(&["version".to_string()])
                })
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            let result = handle.join().unwrap().unwrap();
            assert_eq!(result.exit_code, 0);
            completed += 1;
        }

        assert_eq!(completed, THREADS);
    }

    #[test]
    fn default_session_options_use_hg_on_path() {
        let options = SessionOptions::default();
        assert_eq!(options.hg_path, PathBuf::from("hg"));
        assert!(options.config.is_empty());
        assert!(options.encoding_override.is_none());
    }

    #[test]
    fn builder_methods_accumulate_config_pairs() {
        let options = SessionOptions::new()
            .hg_path("/opt/hg/bin/hg")
            .config("ui.username", "test")
            .config("extensions.rebase", "");

        assert_eq!(options.hg_path, PathBuf::from("/opt/hg/bin/hg"));
        assert_eq!(
            options.config,
            vec![
                ("ui.username".to_string(), "test".to_string()),
                ("extensions.rebase".to_string(), "".to_string()),
            ]
        );
    }

    #[test]
    fn apply_exit_policy_accepts_listed_codes() {
        let result = CommandResult {
            exit_code: 1,
            ..Default::default()
        };
        assert!(apply_exit_policy(&result, &[0, 1]).is_ok());
    }

    #[test]
    fn apply_exit_policy_rejects_unlisted_codes() {
        let result = CommandResult {
            exit_code: 2,
            ..Default::default()
        };
        let err = apply_exit_policy(&result, &[0, 1]).unwrap_err();
        assert!(matches!(err, HgError::CommandFailed { .. }));
    }
}
