//! Command-line interface for dock-peek
//!
//! `run` starts the preview service; the remaining commands are one-shot
//! diagnostics over the same providers the service uses.

use crate::config::{
    DispatchConfig, RegistryConfig, SettingsProvider, SettingsStore, SettingsValidator,
    ValidationSeverity,
};
use crate::macos::{SystemDisplayProvider, SystemDockAccessibility, SystemProcesses, DisplayProvider};
use crate::models::{Pid, Point};
use crate::permissions::{PermissionChecker, PermissionType, SystemPermissions};
use crate::services::{in_icon_strip, IconHitTester, WindowRegistry};
use crate::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// dock-peek command-line interface
#[derive(Parser)]
#[command(name = "dock-peek")]
#[command(about = "Window previews for Dock icons on macOS")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct DockPeekCli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable JSON output for machine-readable results
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand; `run` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl DockPeekCli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}

/// Available CLI commands
#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Commands {
    /// Intercept Dock clicks and show previews until interrupted
    Run,

    /// List the windows a preview would show for a process
    Windows(WindowsArgs),

    /// Resolve the Dock icon under a screen point
    HitTest(HitTestArgs),

    /// Permission management commands
    Permissions(PermissionCommands),

    /// Settings management commands
    Config(ConfigCommands),
}

#[derive(Args, Clone, Debug, PartialEq)]
pub struct WindowsArgs {
    /// Process identifier of the application
    #[arg(long)]
    pub pid: Pid,

    /// Include off-screen and minimized windows
    #[arg(long)]
    pub include_minimized: bool,
}

#[derive(Args, Clone, Debug, PartialEq)]
pub struct HitTestArgs {
    /// Horizontal screen coordinate (top-left origin)
    #[arg(long, allow_negative_numbers = true)]
    pub x: f64,

    /// Vertical screen coordinate (top-left origin)
    #[arg(long, allow_negative_numbers = true)]
    pub y: f64,
}

#[derive(Args, Clone, Debug, PartialEq)]
pub struct PermissionCommands {
    #[command(subcommand)]
    pub action: PermissionActions,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum PermissionActions {
    /// Check permission status
    Status,

    /// Prompt for missing permissions
    Request {
        /// Specific permission (accessibility, screen-recording)
        #[arg(short, long)]
        permission: Option<String>,
    },

    /// Show permission instructions
    Instructions,
}

#[derive(Args, Clone, Debug, PartialEq)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub action: ConfigActions,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum ConfigActions {
    /// Show the effective settings
    Show,

    /// Validate settings
    Validate {
        /// Settings file to validate instead of the active one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print the settings file location
    Path,

    /// Write a default settings file if none exists
    Init,
}

fn parse_permission(name: &str) -> Option<PermissionType> {
    match name.to_lowercase().replace('_', "-").as_str() {
        "accessibility" => Some(PermissionType::Accessibility),
        "screen-recording" | "screen" => Some(PermissionType::ScreenRecording),
        _ => None,
    }
}

/// Executes one-shot commands. `run` is handled by the binary.
pub struct DockPeekCliExecutor {
    config_path: Option<PathBuf>,
    json_output: bool,
}

impl DockPeekCliExecutor {
    pub fn new(config_path: Option<PathBuf>, json_output: bool) -> Self {
        Self {
            config_path,
            json_output,
        }
    }

    pub fn open_settings(&self) -> Result<SettingsStore> {
        let store = match &self.config_path {
            Some(path) => SettingsStore::open(path.clone())?,
            None => SettingsStore::open_default()?,
        };
        Ok(store)
    }

    pub fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run => Err(crate::DockPeekError::ConfigurationError(
                "`run` must be started by the dock-peek binary".into(),
            )
            .into()),
            Commands::Windows(args) => self.execute_windows(args),
            Commands::HitTest(args) => self.execute_hit_test(args),
            Commands::Permissions(cmd) => self.execute_permission_command(cmd),
            Commands::Config(cmd) => self.execute_config_command(cmd),
        }
    }

    fn execute_windows(&self, args: WindowsArgs) -> Result<()> {
        info!(pid = args.pid, include_minimized = args.include_minimized, "listing windows");
        let mut registry = WindowRegistry::with_system_providers(RegistryConfig::default());
        let windows = registry.windows_for_app(args.pid, args.include_minimized);

        if self.json_output {
            let output = serde_json::json!({
                "pid": args.pid,
                "generated_at": Utc::now(),
                "windows": windows,
                "previewable": windows.len() >= 2,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if windows.is_empty() {
            println!("No windows found for pid {}.", args.pid);
        } else {
            println!("Windows for pid {}:", args.pid);
            for window in &windows {
                println!(
                    "  {:>6}  {:<40}  {:>5.0}x{:<5.0} {}",
                    window.id,
                    window.title,
                    window.bounds.size.width,
                    window.bounds.size.height,
                    if window.is_minimized() { "(minimized)" } else { "" }
                );
            }
        }
        Ok(())
    }

    fn execute_hit_test(&self, args: HitTestArgs) -> Result<()> {
        let point = Point::new(args.x, args.y);
        let displays = SystemDisplayProvider::new().displays();
        let in_strip = in_icon_strip(&displays, point, DispatchConfig::default().hidden_strip_band);
        let hit_tester = IconHitTester::new(
            Box::new(SystemDockAccessibility::new()),
            Arc::new(SystemProcesses::new()),
            DispatchConfig::default().max_ancestor_hops,
        );
        let app = hit_tester.resolve(point);
        debug!(x = args.x, y = args.y, in_strip, found = app.is_some(), "hit test complete");

        if self.json_output {
            let output = serde_json::json!({
                "point": point,
                "in_icon_strip": in_strip,
                "app": app,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Point ({}, {}): {}", args.x, args.y, if in_strip { "inside icon strip" } else { "outside icon strip" });
            match app {
                Some(app) => {
                    println!("  Application: {}", app.name);
                    println!("  Bundle id:   {}", app.bundle_id.as_deref().unwrap_or("-"));
                    println!(
                        "  Process:     {}",
                        app.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string())
                    );
                    println!("  Running:     {}", app.is_running);
                }
                None => println!("  No application icon at this point"),
            }
        }
        Ok(())
    }

    fn execute_permission_command(&self, cmd: PermissionCommands) -> Result<()> {
        let checker = PermissionChecker::new(Arc::new(SystemPermissions));
        match cmd.action {
            PermissionActions::Status => {
                let summary = checker.summary();
                if self.json_output {
                    let output = serde_json::json!({
                        "statuses": summary.statuses,
                        "can_function": summary.can_function(),
                        "description": summary.description(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("Permission Status:");
                    for (permission, status) in &summary.statuses {
                        println!("  {permission}: {status:?}");
                    }
                    println!("  {}", summary.description());
                }
            }
            PermissionActions::Request { permission } => {
                let requested = match permission {
                    Some(name) => vec![parse_permission(&name).ok_or_else(|| {
                        crate::DockPeekError::ValidationError(format!("Unknown permission: {name}"))
                    })?],
                    None => checker.summary().missing(),
                };
                if requested.is_empty() {
                    println!("All permissions are granted");
                }
                for permission in requested {
                    let granted = checker.request(permission);
                    println!(
                        "{permission}: {}",
                        if granted { "granted" } else { "not granted, see System Settings" }
                    );
                }
            }
            PermissionActions::Instructions => {
                let missing = checker.summary().missing();
                if missing.is_empty() {
                    println!("All permissions are granted!");
                }
                for (i, permission) in missing.iter().enumerate() {
                    println!("\n{}. {}", i + 1, PermissionChecker::instructions(*permission));
                }
            }
        }
        Ok(())
    }

    fn execute_config_command(&self, cmd: ConfigCommands) -> Result<()> {
        match cmd.action {
            ConfigActions::Show => {
                let store = self.open_settings()?;
                let settings = store.settings();
                if self.json_output {
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                } else {
                    println!("# {}", store.path().display());
                    print!("{}", settings.to_toml()?);
                }
            }
            ConfigActions::Validate { file } => {
                let store = match file {
                    Some(path) => SettingsStore::open(path)?,
                    None => self.open_settings()?,
                };
                let findings = SettingsValidator::new()?.validate(&store.settings());
                let errors = findings.iter().filter(|f| f.is_error()).count();

                if self.json_output {
                    let output = serde_json::json!({
                        "path": store.path(),
                        "valid": errors == 0,
                        "findings": findings,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else if findings.is_empty() {
                    println!("{}: valid", store.path().display());
                } else {
                    println!("{}:", store.path().display());
                    for finding in &findings {
                        let label = match finding.rule.severity {
                            ValidationSeverity::Error => "error",
                            ValidationSeverity::Warning => "warning",
                            ValidationSeverity::Info => "info",
                        };
                        println!("  {label}: {} ({})", finding.message, finding.field);
                    }
                }
                if errors > 0 {
                    return Err(crate::DockPeekError::ValidationError(format!(
                        "{errors} settings error(s)"
                    ))
                    .into());
                }
            }
            ConfigActions::Path => {
                let path = match &self.config_path {
                    Some(path) => path.clone(),
                    None => SettingsStore::default_path()?,
                };
                println!("{}", path.display());
            }
            ConfigActions::Init => {
                let store = self.open_settings()?;
                if store.initialize()? {
                    println!("Wrote default settings to {}", store.path().display());
                } else {
                    println!("Settings already exist at {}", store.path().display());
                }
            }
        }
        Ok(())
    }
}

/// Run a one-shot command and exit non-zero on failure
pub fn run_cli(cli: &DockPeekCli) -> Result<()> {
    if cli.verbose {
        debug!("Verbose output enabled");
    }

    let executor = DockPeekCliExecutor::new(cli.config.clone(), cli.json);
    if let Err(e) = executor.execute(cli.command()) {
        if cli.json {
            let error_json = serde_json::json!({
                "error": true,
                "message": e.to_string()
            });
            println!("{}", serde_json::to_string_pretty(&error_json)?);
        } else {
            error!("Command failed: {:#}", e);
        }
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn no_subcommand_means_run() {
        let cli = DockPeekCli::try_parse_from(["dock-peek"]).unwrap();
        assert_eq!(cli.command(), Commands::Run);
    }

    #[test]
    fn windows_command_parses_flags() {
        let cli = DockPeekCli::try_parse_from([
            "dock-peek",
            "--json",
            "windows",
            "--pid",
            "512",
            "--include-minimized",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(
            cli.command(),
            Commands::Windows(WindowsArgs {
                pid: 512,
                include_minimized: true
            })
        );
    }

    #[test]
    fn hit_test_accepts_negative_coordinates() {
        let cli =
            DockPeekCli::try_parse_from(["dock-peek", "hit-test", "--x", "-1200", "--y", "880"])
                .unwrap();
        assert_eq!(
            cli.command(),
            Commands::HitTest(HitTestArgs { x: -1200.0, y: 880.0 })
        );
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli =
            DockPeekCli::try_parse_from(["dock-peek", "config", "show", "--config", "/tmp/s.toml"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
    }

    #[test]
    fn permission_names() {
        assert_eq!(parse_permission("Accessibility"), Some(PermissionType::Accessibility));
        assert_eq!(parse_permission("screen_recording"), Some(PermissionType::ScreenRecording));
        assert_eq!(parse_permission("camera"), None);
    }

    #[test]
    fn config_init_then_validate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let executor = DockPeekCliExecutor::new(Some(path.clone()), true);

        executor
            .execute(Commands::Config(ConfigCommands { action: ConfigActions::Init }))
            .unwrap();
        assert!(path.exists());
        executor
            .execute(Commands::Config(ConfigCommands {
                action: ConfigActions::Validate { file: None },
            }))
            .unwrap();
    }

    #[test]
    fn invalid_settings_fail_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "thumbnail_max_size = 8\n").unwrap();
        let executor = DockPeekCliExecutor::new(None, true);

        let result = executor.execute(Commands::Config(ConfigCommands {
            action: ConfigActions::Validate { file: Some(path) },
        }));
        assert!(result.is_err());
    }
}
