use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("nothing to open")]
    EmptyTarget,
    #[error("{command} {target:?}: {source}")]
    Spawn {
        command: String,
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} {target:?}: exit status {status:?}")]
    Failed {
        command: String,
        target: String,
        status: Option<i32>,
    },
}

/// Hands a URL or file path to the OS open handler and waits for it.
pub fn open_target(command: &str, target: &str) -> Result<(), OpenError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(OpenError::EmptyTarget);
    }

    let status = Command::new(command)
        .arg(trimmed)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| OpenError::Spawn {
            command: command.to_string(),
            target: trimmed.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(OpenError::Failed {
            command: command.to_string(),
            target: trimmed.to_string(),
            status: status.code(),
        });
    }

    crate::logging::info(&format!("opened {trimmed}"));
    Ok(())
}
