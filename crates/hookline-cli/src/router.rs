// Command routing and dispatch

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hookline_hooks::{
    cli::{format_dispatch_json, format_dispatch_table, format_validation_json, format_validation_table},
    Event, EventType, HookCli, HookCommand, HookManager,
};
use hookline_permissions::{ApprovalPort, StaticApprover, TerminalPrompt};
use serde_json::Value;
use tracing::debug;

use crate::output::{Mark, Summary};

/// Hookline - run project hooks around lifecycle events
#[derive(Parser, Debug)]
#[command(name = "hookline")]
#[command(bin_name = "hookline")]
#[command(about = "Run project hooks around lifecycle events")]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project root (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Dispatch an event to its hooks
    #[command(about = "Dispatch an event and run the hooks subscribed to it")]
    Dispatch {
        /// Event tag (pre-commit, post-commit, pre-push, session-start, session-end, or custom)
        #[arg(value_name = "EVENT")]
        event: String,

        /// JSON payload handed to the hooks
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,

        /// Approve every permission prompt
        #[arg(short, long)]
        yes: bool,

        /// Output format (table or json)
        #[arg(long)]
        format: Option<String>,
    },

    /// List declared hooks
    List {
        /// Output format (table or json)
        #[arg(long)]
        format: Option<String>,
    },

    /// Show one hook's configuration
    Inspect {
        /// Hook name
        #[arg(value_name = "NAME")]
        name: String,

        /// Output format (table or json)
        #[arg(long)]
        format: Option<String>,
    },

    /// Check every hook's configuration and script
    Validate {
        /// Output format (table or json)
        #[arg(long)]
        format: Option<String>,
    },
}

/// Parse a `--payload` argument; no payload is an empty object
pub fn parse_payload(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => serde_json::from_str(raw).context("--payload must be valid JSON"),
    }
}

/// Run a parsed command and return the process exit code
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    debug!(root = %root.display(), command = ?cli.command, "Running command");

    match cli.command {
        Commands::Dispatch {
            event,
            payload,
            yes,
            format,
        } => {
            let approver: Arc<dyn ApprovalPort> = if yes {
                Arc::new(StaticApprover::approve_all())
            } else {
                Arc::new(TerminalPrompt::new())
            };
            let manager = HookManager::builder(&root).with_approver(approver).build();
            let passed =
                dispatch(&manager, &event, payload.as_deref(), format.as_deref(), cli.quiet).await?;
            Ok(if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::List { format } => {
            let manager = HookManager::builder(&root).build();
            println!("{}", HookCli::new(&manager).execute(HookCommand::List { format })?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect { name, format } => {
            let manager = HookManager::builder(&root).build();
            println!(
                "{}",
                HookCli::new(&manager).execute(HookCommand::Inspect { name, format })?
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { format } => {
            let manager = HookManager::builder(&root).build();
            let report = manager.validate()?;
            match format.as_deref() {
                Some("json") => println!("{}", format_validation_json(&report)?),
                _ => print!("{}", format_validation_table(&report)),
            }
            Ok(if report.iter().any(|(_, outcome)| outcome.is_err()) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// Dispatch one event; `false` when the event was blocked
async fn dispatch(
    manager: &HookManager,
    event: &str,
    payload: Option<&str>,
    format: Option<&str>,
    quiet: bool,
) -> Result<bool> {
    let event = Event::new(EventType::from(event)).with_payload(parse_payload(payload)?);
    let event_type = event.event_type.clone();

    let result = manager
        .dispatch(event)
        .await
        .with_context(|| format!("cannot dispatch {}", event_type))?;

    match format {
        Some("json") => println!("{}", format_dispatch_json(&result)?),
        _ if quiet && !result.blocked => {}
        _ => print!("{}", format_dispatch_table(&result)),
    }

    let background = manager.drain_background().await?;
    let verbose_summary = !quiet && format.is_none();
    for (mark, line) in Summary::default().dispatch(&result, &background) {
        if mark != Mark::Passed || verbose_summary {
            eprintln!("{}", line);
        }
    }

    Ok(!result.blocked)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_dispatch() {
        let cli = Cli::try_parse_from([
            "hookline",
            "dispatch",
            "pre-commit",
            "--payload",
            r#"{"files": ["a.rs"]}"#,
            "--yes",
            "--root",
            "/tmp/project",
        ])
        .unwrap();

        assert_eq!(cli.root, Some(PathBuf::from("/tmp/project")));
        assert_eq!(
            cli.command,
            Commands::Dispatch {
                event: "pre-commit".to_string(),
                payload: Some(r#"{"files": ["a.rs"]}"#.to_string()),
                yes: true,
                format: None,
            }
        );
    }

    #[test]
    fn test_parse_inspect_with_format() {
        let cli = Cli::try_parse_from(["hookline", "-v", "inspect", "lint", "--format", "json"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Inspect {
                name: "lint".to_string(),
                format: Some("json".to_string()),
            }
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["hookline"]).is_err());
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(None).unwrap(), serde_json::json!({}));
        assert_eq!(
            parse_payload(Some(r#"{"branch": "main"}"#)).unwrap()["branch"],
            "main"
        );
        assert!(parse_payload(Some("{not json")).is_err());
    }

    fn project(yaml: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".hookline")).unwrap();
        fs::write(dir.path().join(".hookline/hooks.yaml"), yaml).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_dispatch_exit_codes() {
        let dir = project(
            r#"
hooks:
  gate:
    script: gate.sh
    events: [pre-commit, post-commit]
"#,
        );
        fs::write(dir.path().join("gate.sh"), "cat > /dev/null\nexit 1\n").unwrap();
        let manager = HookManager::builder(dir.path())
            .with_global_path(None)
            .with_approver(Arc::new(StaticApprover::deny_all()))
            .build();

        let passed = dispatch(&manager, "pre-commit", None, Some("json"), true).await.unwrap();
        assert!(!passed);

        let passed = dispatch(&manager, "post-commit", None, Some("json"), true).await.unwrap();
        assert!(passed);
    }
}
