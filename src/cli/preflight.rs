//! Pre-flight checks before starting a run.
//!
//! A missing binary or credential is reported before any status is written, so a
//! misconfigured host never leaves lectures marked `FAILED`.

use crate::config::{DescriberProvider, Settings};
use crate::error::{LecternError, Result};
use std::process::Command;

/// Check everything an ingest run needs.
pub fn check_ingest(settings: &Settings) -> Result<()> {
    check_tool(&settings.media.ffmpeg)?;
    check_tool(&settings.media.ffprobe)?;
    check_describer(settings)
}

/// Check the describer's configuration and credentials.
pub fn check_describer(settings: &Settings) -> Result<()> {
    let describer = &settings.describer;
    match describer.provider {
        DescriberProvider::Whisper => match std::env::var(&describer.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(()),
            _ => Err(LecternError::Config(format!(
                "{} not set. Set it with: export {}='sk-...'",
                describer.api_key_env, describer.api_key_env
            ))),
        },
        DescriberProvider::Http => {
            if describer.endpoint.is_none() {
                return Err(LecternError::Config(
                    "describer.endpoint is required for the http provider".to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(LecternError::ToolFailed(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LecternError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(LecternError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
