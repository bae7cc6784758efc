//! Settings infrastructure for sclsp.
//!
//! This module provides support for loading and parsing settings.toml files
//! to configure how the sclang interpreter subprocess is launched.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Interpreter configuration.
    pub interpreter: Option<InterpreterSettings>,
}

/// Settings for the sclang interpreter subprocess.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct InterpreterSettings {
    /// Path to the sclang executable. Defaults to "sclang" on PATH.
    pub command: Option<PathBuf>,

    /// Arguments passed to sclang, replacing the default `["-i", "sclsp"]`.
    pub args: Option<Vec<String>>,

    /// Path to a sclang_conf.yaml language configuration file (`-l`).
    pub config_file: Option<PathBuf>,

    /// Runtime directory for sclang (`-d`).
    pub runtime_dir: Option<PathBuf>,

    /// Echo evaluated code to the client log. Defaults to true.
    pub echo: Option<bool>,
}

impl InterpreterSettings {
    /// The sclang executable to launch.
    pub fn command(&self) -> PathBuf {
        self.command
            .clone()
            .unwrap_or_else(|| PathBuf::from("sclang"))
    }

    /// Whether evaluated code should be echoed to the client log.
    pub fn echo(&self) -> bool {
        self.echo.unwrap_or(true)
    }

    /// Resolve relative paths against the directory the settings were
    /// discovered in.
    pub fn resolved(&self, settings_dir: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                settings_dir.join(p)
            }
        };
        Self {
            command: self.command.as_ref().map(&resolve),
            args: self.args.clone(),
            config_file: self.config_file.as_ref().map(&resolve),
            runtime_dir: self.runtime_dir.as_ref().map(&resolve),
            echo: self.echo,
        }
    }
}

/// Load settings from a settings.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("failed to parse settings.toml: {}", e);
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover settings.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found settings.toml (used for resolving relative paths).
/// If not found, returns `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    // Phase 1: Walk up from start_dir
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join("settings.toml");
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    // Phase 2: Check immediate child directories
    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join("settings.toml");
                if candidate.is_file() {
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
