//! Tofino backend: one bfrt script per table update.
//!
//! Each update is rendered locally, uploaded under a unique name, run with
//! `run_bfshell.sh -b`, checked for error output and then removed.
//! Register access is not available through this backend.

pub mod script;

use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

pub use script::ScriptArtifact;

use super::Switch;
use super::entry::TableEntry;
use crate::error::{Result, SwitchError};
use crate::session::{Session, SessionState};
use crate::transport::{ExecOutput, RemoteShell, SshConfig, SshTransport, shell_quote};

const BACKEND: &str = "tofino";

/// Paths and limits for running bfrt scripts on the switch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TofinoConfig {
    /// SDE root on the switch.
    pub sde: String,

    /// SDE install directory; `<sde>/install` when unset.
    pub sde_install: Option<String>,

    /// Directory scripts are uploaded to.
    pub code_dir: String,

    /// bfrt namespace the tables live in, without the `bfrt.` prefix.
    pub pipeline: String,

    /// Limit for one script run, in seconds.
    pub timeout_secs: u64,

    /// Remove scripts after running them.
    pub delete_after_run: bool,
}

impl Default for TofinoConfig {
    fn default() -> Self {
        Self {
            sde: "/root/bf-sde-9.1.0".to_string(),
            sde_install: None,
            code_dir: "/root/bfrt_code_dir".to_string(),
            pipeline: "srv6.pipe.Ingress".to_string(),
            timeout_secs: 60,
            delete_after_run: true,
        }
    }
}

impl TofinoConfig {
    /// Resolved SDE install directory.
    pub fn sde_install(&self) -> String {
        self.sde_install
            .clone()
            .unwrap_or_else(|| format!("{}/install", self.sde.trim_end_matches('/')))
    }

    /// Timeout for one script run.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shell command running the script at `path` through bfshell.
    pub fn run_command(&self, path: &str) -> String {
        let sde = self.sde.trim_end_matches('/');
        format!(
            "export SDE={} SDE_INSTALL={} && bash {} -b {}",
            shell_quote(sde),
            shell_quote(&self.sde_install()),
            shell_quote(&format!("{}/run_bfshell.sh", sde)),
            shell_quote(path)
        )
    }
}

/// Handle to a Tofino hardware switch.
pub struct TofinoSwitch<S: RemoteShell = SshTransport> {
    session: Session<S>,
    config: TofinoConfig,
}

impl<S: RemoteShell> TofinoSwitch<S> {
    /// Create an unconnected handle.
    pub fn new(ssh_config: SshConfig, config: TofinoConfig) -> Self {
        Self {
            session: Session::new(ssh_config),
            config,
        }
    }

    /// Script settings.
    pub fn config(&self) -> &TofinoConfig {
        &self.config
    }

    /// Lifecycle state of the SSH session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Upload and run arbitrary bfrt python code.
    ///
    /// Anything on stderr fails the call with the captured stdout attached.
    /// When `delete` is set the script is removed afterwards, also after a
    /// failed run.
    pub async fn run_script(&self, code: &str, delete: bool) -> Result<ExecOutput> {
        let shell = self.session.shell()?;
        let artifact = ScriptArtifact::new(&self.config.code_dir, code);

        debug!("uploading bfrt script to {}", artifact.path());
        shell
            .upload(artifact.path(), artifact.body().as_bytes())
            .await?;

        let command = self.config.run_command(artifact.path());
        let output = shell.exec(&command, self.config.timeout()).await?;

        if !output.stderr.is_empty() {
            if delete {
                if let Err(e) = Self::remove(shell, artifact.path()).await {
                    warn!("failed to remove {}: {}", artifact.path(), e);
                }
            }
            return Err(SwitchError::RemoteExecution {
                command,
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into());
        }

        info!("{}", output.stdout);

        if delete {
            Self::remove(shell, artifact.path()).await?;
        }
        Ok(output)
    }

    async fn remove(shell: &S, path: &str) -> Result<()> {
        let command = format!("rm -f {}", shell_quote(path));
        let output = shell.exec(&command, Duration::from_secs(10)).await?;
        if !output.is_success() {
            return Err(SwitchError::RemoteExecution {
                command,
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into());
        }
        Ok(())
    }
}

impl<S: RemoteShell> Switch for TofinoSwitch<S> {
    async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    async fn close(&mut self) -> Result<()> {
        let result = self.session.close().await;
        info!("tofino session closed");
        result
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn reset_register(&mut self, _name: &str, _index: Option<u32>) -> Result<()> {
        Err(SwitchError::Unsupported {
            backend: BACKEND,
            operation: "reset_register",
        }
        .into())
    }

    async fn set_register(&mut self, _name: &str, _index: Option<u32>, _value: u64) -> Result<()> {
        Err(SwitchError::Unsupported {
            backend: BACKEND,
            operation: "set_register",
        }
        .into())
    }

    async fn update_table_entry(&mut self, entry: &TableEntry) -> Result<()> {
        let code =
            script::render_table_update(entry, &self.config.pipeline, chrono::Local::now())?;
        self.run_script(&code, self.config.delete_after_run).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::error::SessionError;
    use crate::switch::value::MacAddress;
    use crate::transport::mock::{self, MockShell};

    fn switch(host: &str) -> TofinoSwitch<MockShell> {
        TofinoSwitch::new(SshConfig::new(host, "root"), TofinoConfig::default())
    }

    fn entry() -> TableEntry {
        TableEntry::new("ipv4_host", "forward")
            .with_match("dst_addr", "10.0.0.2".parse::<std::net::IpAddr>().unwrap())
            .with_param("port", 4u16)
    }

    #[test]
    fn test_run_command() {
        let config = TofinoConfig::default();
        assert_eq!(
            config.run_command("/root/bfrt_code_dir/x.py"),
            "export SDE='/root/bf-sde-9.1.0' SDE_INSTALL='/root/bf-sde-9.1.0/install' \
             && bash '/root/bf-sde-9.1.0/run_bfshell.sh' -b '/root/bfrt_code_dir/x.py'"
        );
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_code_dir_with_spaces_is_quoted() {
        let host = "tofino-spaces";
        let mut sw = TofinoSwitch::<MockShell>::new(
            SshConfig::new(host, "root"),
            TofinoConfig {
                code_dir: "/root/bfrt code".to_string(),
                ..TofinoConfig::default()
            },
        );
        sw.connect().await.unwrap();
        sw.update_table_entry(&entry()).await.unwrap();

        let state = mock::state(host);
        let path = state.uploads()[0].0.clone();
        assert!(path.starts_with("/root/bfrt code/"));

        let execs = state.execs();
        assert!(execs[0].ends_with(&format!("-b '{}'", path)));
        assert_eq!(execs[1], format!("rm -f '{}'", path));
    }

    #[test]
    fn test_config_from_json() {
        let config: TofinoConfig =
            serde_json::from_str(r#"{"sde": "/opt/sde", "delete_after_run": false}"#).unwrap();
        assert_eq!(config.sde_install(), "/opt/sde/install");
        assert_eq!(config.code_dir, "/root/bfrt_code_dir");
        assert!(!config.delete_after_run);
    }

    #[tokio::test]
    async fn test_registers_are_unsupported() {
        let mut sw = switch("tofino-registers");
        let err = sw.set_register("r0", None, 5).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Switch(SwitchError::Unsupported {
                operation: "set_register",
                ..
            })
        ));
        let err = sw.reset_register("r0", Some(1)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Switch(SwitchError::Unsupported {
                operation: "reset_register",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_update_requires_connection() {
        let mut sw = switch("tofino-unconnected");
        let err = sw.update_table_entry(&entry()).await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_update_uploads_runs_and_removes() {
        let host = "tofino-update";
        let mut sw = switch(host);
        sw.connect().await.unwrap();
        sw.update_table_entry(&entry()).await.unwrap();

        let state = mock::state(host);
        let uploads = state.uploads();
        assert_eq!(uploads.len(), 1);
        let (path, body) = &uploads[0];
        assert!(body.contains("table=bfrt.srv6.pipe.Ingress.ipv4_host"));
        assert!(body.contains("table.add_with_forward(\n    dst_addr=0xa000002,\n    port=4\n)"));

        let execs = state.execs();
        assert_eq!(execs.len(), 2);
        assert!(execs[0].ends_with(&format!("run_bfshell.sh' -b '{}'", path)));
        assert_eq!(execs[1], format!("rm -f '{}'", path));
    }

    #[tokio::test]
    async fn test_invalid_value_fails_before_upload() {
        let host = "tofino-invalid";
        let mut sw = switch(host);
        sw.connect().await.unwrap();

        let bad = TableEntry::new("dmac", "set_port").with_match("dst", MacAddress::default());
        let err = sw.update_table_entry(&bad).await.unwrap_err();
        assert!(matches!(err, Error::Switch(SwitchError::InvalidValue { .. })));

        let state = mock::state(host);
        assert!(state.uploads().is_empty());
        assert!(state.execs().is_empty());
    }

    #[tokio::test]
    async fn test_stderr_fails_with_stdout_in_message() {
        let host = "tofino-stderr";
        let mut sw = switch(host);
        sw.connect().await.unwrap();
        mock::state(host).push_response(ExecOutput {
            stdout: "Error: table ipv4_host not found in Ingress".to_string(),
            stderr: "Traceback (most recent call last)".to_string(),
            exit_status: Some(0),
        });

        let err = sw.update_table_entry(&entry()).await.unwrap_err();
        assert!(
            err.to_string()
                .contains("Error: table ipv4_host not found in Ingress")
        );

        // The uploaded script is still cleaned up.
        let execs = mock::state(host).execs();
        assert!(execs.last().unwrap().starts_with("rm -f "));
    }

    #[tokio::test]
    async fn test_keep_script_when_delete_disabled() {
        let host = "tofino-keep";
        let mut sw = TofinoSwitch::<MockShell>::new(
            SshConfig::new(host, "root"),
            TofinoConfig {
                delete_after_run: false,
                ..TofinoConfig::default()
            },
        );
        sw.connect().await.unwrap();
        sw.update_table_entry(&entry()).await.unwrap();

        let execs = mock::state(host).execs();
        assert_eq!(execs.len(), 1);
        assert!(!execs[0].starts_with("rm "));
    }

    #[tokio::test]
    async fn test_consecutive_updates_use_distinct_files() {
        let host = "tofino-unique";
        let mut sw = switch(host);
        sw.connect().await.unwrap();
        sw.update_table_entry(&entry()).await.unwrap();
        sw.update_table_entry(&entry()).await.unwrap();

        let uploads = mock::state(host).uploads();
        assert_eq!(uploads.len(), 2);
        assert_ne!(uploads[0].0, uploads[1].0);
    }

    #[tokio::test]
    async fn test_run_script_returns_output() {
        let host = "tofino-raw";
        let mut sw = switch(host);
        sw.connect().await.unwrap();

        let output = sw.run_script("bfrt.srv6.pipe.Ingress.ipv4_host.dump()", false)
            .await
            .unwrap();
        assert_eq!(output.stdout, "bfrt_python done\n");
        assert_eq!(
            mock::state(host).uploads()[0].1,
            "bfrt.srv6.pipe.Ingress.ipv4_host.dump()"
        );
    }
}
