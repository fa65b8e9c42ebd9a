use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::model::{Folder, VaultItem};

pub const PASSWORD_ENV: &str = "BW_PASSWORD";
const NO_INTERACTION: &str = "--nointeraction";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to run {exec}: {source}")]
    Spawn {
        exec: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bw exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("unexpected bw output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bw returned no output for `{0}`")]
    EmptyOutput(String),
}

/// Runs the Bitwarden CLI with the given arguments and returns trimmed stdout.
pub trait VaultCli {
    fn run(&self, args: &[String]) -> Result<String, CliError>;
}

pub struct BwCli {
    exec: String,
}

impl BwCli {
    pub fn new(exec: &str) -> Self {
        Self {
            exec: exec.to_string(),
        }
    }
}

impl VaultCli for BwCli {
    fn run(&self, args: &[String]) -> Result<String, CliError> {
        let output = Command::new(&self.exec)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CliError::Spawn {
                exec: self.exec.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CliError::Failed {
                status: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl CliError {
    /// What to show the user: bw's own stderr when it has one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Failed { stderr, .. } if !stderr.is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Argument list as it may appear in logs, with the session key masked.
pub fn describe(args: &[String]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push("***");
            mask_next = false;
            continue;
        }
        mask_next = arg == "--session";
        out.push(arg.as_str());
    }
    out.join(" ")
}

fn invoke(cli: &dyn VaultCli, args: &[&str], session: Option<&str>) -> Result<String, CliError> {
    let mut full: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    if let Some(session) = session {
        full.push("--session".to_string());
        full.push(session.to_string());
    }
    full.push(NO_INTERACTION.to_string());
    crate::logging::debug(&format!("bw {}", describe(&full)));
    cli.run(&full)
}

fn non_empty(output: String, command: &str) -> Result<String, CliError> {
    if output.is_empty() {
        Err(CliError::EmptyOutput(command.to_string()))
    } else {
        Ok(output)
    }
}

/// Logs in with the master password read by bw from `BW_PASSWORD` and returns the session key.
pub fn login_password(
    cli: &dyn VaultCli,
    email: &str,
    two_factor: Option<(i32, &str)>,
) -> Result<String, CliError> {
    let method;
    let mut args = vec!["login", email, "--passwordenv", PASSWORD_ENV, "--raw"];
    if let Some((mode, code)) = two_factor {
        method = mode.to_string();
        args.extend(["--method", method.as_str(), "--code", code]);
    }
    let output = invoke(cli, &args, None)?;
    non_empty(output, "login")
}

/// API-key login reads BW_CLIENTID/BW_CLIENTSECRET and leaves the vault locked.
pub fn login_apikey(cli: &dyn VaultCli) -> Result<(), CliError> {
    invoke(cli, &["login", "--apikey"], None).map(|_| ())
}

pub fn unlock(cli: &dyn VaultCli) -> Result<String, CliError> {
    let output = invoke(cli, &["unlock", "--passwordenv", PASSWORD_ENV, "--raw"], None)?;
    non_empty(output, "unlock")
}

pub fn lock(cli: &dyn VaultCli) -> Result<(), CliError> {
    invoke(cli, &["lock"], None).map(|_| ())
}

pub fn logout(cli: &dyn VaultCli) -> Result<(), CliError> {
    invoke(cli, &["logout"], None).map(|_| ())
}

pub fn config_server(cli: &dyn VaultCli, url: &str) -> Result<(), CliError> {
    invoke(cli, &["config", "server", url], None).map(|_| ())
}

pub fn sync(cli: &dyn VaultCli, session: &str, force: bool) -> Result<(), CliError> {
    let args: &[&str] = if force { &["sync", "--force"] } else { &["sync"] };
    invoke(cli, args, Some(session)).map(|_| ())
}

/// ISO-8601 date of the last sync as reported by bw.
pub fn last_sync(cli: &dyn VaultCli) -> Result<String, CliError> {
    let output = invoke(cli, &["sync", "--last"], None)?;
    non_empty(output, "sync --last")
}

pub fn list_items(cli: &dyn VaultCli, session: &str) -> Result<Vec<VaultItem>, CliError> {
    let output = invoke(cli, &["list", "items"], Some(session))?;
    Ok(serde_json::from_str(&output)?)
}

pub fn list_folders(cli: &dyn VaultCli, session: &str) -> Result<Vec<Folder>, CliError> {
    let output = invoke(cli, &["list", "folders"], Some(session))?;
    Ok(serde_json::from_str(&output)?)
}

pub fn get_item(
    cli: &dyn VaultCli,
    session: &str,
    id: &str,
) -> Result<serde_json::Value, CliError> {
    let output = invoke(cli, &["get", "item", id], Some(session))?;
    Ok(serde_json::from_str(&output)?)
}

pub fn get_totp(cli: &dyn VaultCli, session: &str, id: &str) -> Result<String, CliError> {
    let output = invoke(cli, &["get", "totp", id], Some(session))?;
    non_empty(output, "get totp")
}

/// Downloads an attachment into `output_dir` and returns the written path.
pub fn get_attachment(
    cli: &dyn VaultCli,
    session: &str,
    item_id: &str,
    attachment_id: &str,
    output_dir: &Path,
) -> Result<String, CliError> {
    let mut dir = output_dir.to_string_lossy().into_owned();
    if !dir.ends_with('/') {
        dir.push('/');
    }
    let args = [
        "get",
        "attachment",
        attachment_id,
        "--itemid",
        item_id,
        "--output",
        dir.as_str(),
        "--raw",
    ];
    let output = invoke(cli, &args, Some(session))?;
    Ok(if output.is_empty() { dir } else { output })
}

#[cfg(test)]
mod tests {
    use super::describe;

    #[test]
    fn describe_masks_session_key() {
        let args: Vec<String> = ["list", "items", "--session", "secret", "--nointeraction"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(describe(&args), "list items --session *** --nointeraction");
    }
}
