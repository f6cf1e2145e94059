//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{DescriberProvider, Settings};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Lectern Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tool_checks = vec![
        check_tool(&settings.media.ffmpeg),
        check_tool(&settings.media.ffprobe),
    ];
    for check in &tool_checks {
        check.print();
    }
    checks.extend(tool_checks);

    println!();

    println!("{}", style("Describer").bold());
    let describer_check = check_describer(settings);
    describer_check.print();
    checks.push(describer_check);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before ingesting lectures.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Lectern is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available and report its version line.
fn check_tool(name: &str) -> CheckResult {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", install_hint_ffmpeg()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", install_hint_ffmpeg())
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), install_hint_ffmpeg()),
    }
}

/// Check the configured describer and its credentials.
fn check_describer(settings: &Settings) -> CheckResult {
    let describer = &settings.describer;
    let name = format!("{} ({})", describer.provider, describer.model);

    match describer.provider {
        DescriberProvider::Whisper => match std::env::var(&describer.api_key_env) {
            Ok(key) if key.len() > 11 && key.is_ascii() => {
                let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
                CheckResult::ok(&name, &format!("{} configured ({})", describer.api_key_env, masked))
            }
            Ok(key) if key.is_empty() => CheckResult::error(
                &name,
                &format!("{} is empty", describer.api_key_env),
                &format!("Set with: export {}='sk-...'", describer.api_key_env),
            ),
            Ok(_) => CheckResult::warning(
                &name,
                &format!("{} is set but looks too short", describer.api_key_env),
                "Expected an OpenAI API key (sk-...)",
            ),
            Err(_) => CheckResult::error(
                &name,
                &format!("{} not set", describer.api_key_env),
                &format!("Set with: export {}='sk-...'", describer.api_key_env),
            ),
        },
        DescriberProvider::Http => match &describer.endpoint {
            Some(endpoint) => match url::Url::parse(endpoint) {
                Ok(_) if std::env::var(&describer.api_key_env).is_ok() => {
                    CheckResult::ok(&name, &format!("{} (token from {})", endpoint, describer.api_key_env))
                }
                Ok(_) => CheckResult::warning(
                    &name,
                    &format!("{} (no token)", endpoint),
                    &format!("Requests are sent without auth unless {} is set", describer.api_key_env),
                ),
                Err(e) => CheckResult::error(
                    &name,
                    &format!("invalid endpoint: {}", e),
                    "Fix describer.endpoint in the config file",
                ),
            },
            None => CheckResult::error(
                &name,
                "no endpoint configured",
                "Set describer.endpoint in the config file",
            ),
        },
    }
}

/// Check data, working and database locations.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &format!("{}", data_dir.display())));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let work_dir = settings.work_dir();
    let leftovers = std::fs::read_dir(&work_dir).map(|d| d.count()).unwrap_or(0);
    if leftovers > 0 {
        results.push(CheckResult::warning(
            "Working directory",
            &format!("{} ({} leftover run directories)", work_dir.display(), leftovers),
            "Left by interrupted runs; safe to delete when no run is active",
        ));
    } else {
        results.push(CheckResult::ok("Working directory", &format!("{}", work_dir.display())));
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first ingest",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: lectern config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}
