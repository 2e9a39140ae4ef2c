//! In-memory [`RemoteShell`] for unit tests.
//!
//! Each mock is keyed by the configured host name so a test can inspect
//! what happened through [`state`] after handing the config to a session.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use super::{ExecOutput, ProcessExit, RemoteProcess, RemoteShell, SshConfig};
use crate::channel::{CommandStream, OutputBuffer};
use crate::error::{Result, TransportError};

/// Host name that makes `connect` fail authentication.
pub const REFUSING_HOST: &str = "refuse.invalid";

static HOSTS: LazyLock<Mutex<HashMap<String, Arc<MockState>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Recorded activity for one mocked host.
#[derive(Debug, Default)]
pub struct MockState {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub spawned: Mutex<Vec<String>>,
    pub execs: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, String)>>,
    /// Responses for non-`rm` exec calls, in order. Defaults to success.
    pub responses: Mutex<VecDeque<ExecOutput>>,
    /// Exit code the interactive process reports after Ctrl-C.
    pub exit_code: Mutex<Option<u32>>,
}

impl MockState {
    pub fn push_response(&self, output: ExecOutput) {
        self.responses.lock().unwrap().push_back(output);
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn execs(&self) -> Vec<String> {
        self.execs.lock().unwrap().clone()
    }
}

/// Shared state for `host`, created on first use.
pub fn state(host: &str) -> Arc<MockState> {
    HOSTS
        .lock()
        .unwrap()
        .entry(host.to_string())
        .or_default()
        .clone()
}

pub struct MockShell {
    state: Arc<MockState>,
}

impl RemoteShell for MockShell {
    async fn connect(config: &SshConfig) -> Result<Self> {
        if config.host == REFUSING_HOST {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }
        let state = state(&config.host);
        state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Self { state })
    }

    async fn spawn_interactive(
        &self,
        command: &str,
        input: Arc<CommandStream>,
        output: OutputBuffer,
    ) -> Result<RemoteProcess> {
        self.state.spawned.lock().unwrap().push(command.to_string());
        let exit_code = *self.state.exit_code.lock().unwrap();

        // Echo every line back like a PTY would, until Ctrl-C arrives.
        let task = tokio::spawn(async move {
            output.extend(b"RuntimeCmd: ");
            loop {
                input.readable().await;
                let chunk = input.read(None);
                output.extend(chunk.as_bytes());
                if input.is_finished() {
                    return Ok(ProcessExit {
                        code: exit_code,
                        signal: None,
                    });
                }
            }
        });
        Ok(RemoteProcess::new(command, task))
    }

    async fn exec(&self, command: &str, _timeout: Duration) -> Result<ExecOutput> {
        self.state.execs.lock().unwrap().push(command.to_string());
        if command.starts_with("rm ") {
            return Ok(ExecOutput {
                exit_status: Some(0),
                ..Default::default()
            });
        }
        let scripted = self.state.responses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or(ExecOutput {
            stdout: "bfrt_python done\n".to_string(),
            stderr: String::new(),
            exit_status: Some(0),
        }))
    }

    async fn upload(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.state.uploads.lock().unwrap().push((
            path.to_string(),
            String::from_utf8_lossy(contents).into_owned(),
        ));
        Ok(())
    }

    async fn disconnect(self) -> Result<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
