//! Output formatting for hook commands

use serde_json::{json, Value};

use crate::{
    config::HookDeclaration,
    dispatcher::DispatchResult,
    error::{HooksError, Result},
    script::ScriptSpec,
};

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn events_of(declaration: &HookDeclaration) -> String {
    declaration
        .events
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn declaration_json(declaration: &HookDeclaration) -> Result<Value> {
    Ok(match &declaration.config {
        Ok(config) => serde_json::to_value(config)?,
        Err(error) => json!({
            "name": declaration.name,
            "events": declaration.events,
            "error": error,
        }),
    })
}

/// Format a single hook as a table
pub fn format_hook_table(declaration: &HookDeclaration) -> String {
    let mut output = String::new();
    output.push_str(&format!("Name:        {}\n", declaration.name));
    output.push_str(&format!("Events:      {}\n", events_of(declaration)));

    let config = match &declaration.config {
        Ok(config) => config,
        Err(error) => {
            output.push_str("Status:      ✗ Invalid\n");
            output.push_str(&format!("Error:       {}\n", error));
            return output;
        }
    };

    if let Some(description) = &config.description {
        output.push_str(&format!("Description: {}\n", description));
    }
    output.push_str(&format!("Script:      {}\n", config.script));
    if let Some(language) = &config.language {
        output.push_str(&format!("Language:    {}\n", language));
    }
    let status = if config.enabled {
        "✓ Enabled"
    } else {
        "✗ Disabled"
    };
    output.push_str(&format!("Status:      {}\n", status));
    output.push_str(&format!("Priority:    {}\n", config.priority));
    if let Some(timeout_ms) = config.timeout_ms {
        output.push_str(&format!("Timeout:     {}ms\n", timeout_ms));
    }
    if config.retries > 0 {
        output.push_str(&format!(
            "Retries:     {} ({:?} backoff)\n",
            config.retries, config.backoff
        ));
    }
    if config.run_async {
        output.push_str("Mode:        async\n");
    }
    if let Some(group) = &config.group {
        output.push_str(&format!("Group:       {}\n", group));
    }
    if config.continue_on_error {
        output.push_str("On error:    continue\n");
    }
    if let Some(remediation) = &config.remediation {
        output.push_str(&format!("Remediation: {}\n", remediation));
    }

    output
}

/// Format multiple hooks as a table
pub fn format_hooks_table(declarations: &[HookDeclaration]) -> String {
    if declarations.is_empty() {
        return "No hooks found".to_string();
    }

    let mut output = String::new();
    output.push_str("Name                     | Events                   | Status   | Priority | Script\n");
    output.push_str("-------------------------|--------------------------|----------|----------|-----------------\n");

    for declaration in declarations {
        let (status, priority, script) = match &declaration.config {
            Ok(config) => (
                if config.enabled { "Enabled" } else { "Disabled" },
                config.priority.to_string(),
                config.script.clone(),
            ),
            Err(_) => ("Invalid", "-".to_string(), "-".to_string()),
        };

        output.push_str(&format!(
            "{:<24} | {:<24} | {:<8} | {:<8} | {}\n",
            truncate(&declaration.name, 24),
            truncate(&events_of(declaration), 24),
            status,
            priority,
            script
        ));
    }

    output
}

/// Format a single hook as JSON
pub fn format_hook_json(declaration: &HookDeclaration) -> Result<String> {
    serde_json::to_string_pretty(&declaration_json(declaration)?)
        .map_err(|e| HooksError::Config(format!("Failed to serialize hook: {}", e)))
}

/// Format multiple hooks as JSON
pub fn format_hooks_json(declarations: &[HookDeclaration]) -> Result<String> {
    let values = declarations
        .iter()
        .map(declaration_json)
        .collect::<Result<Vec<_>>>()?;
    serde_json::to_string_pretty(&values)
        .map_err(|e| HooksError::Config(format!("Failed to serialize hooks: {}", e)))
}

/// Format a validation report as a table
pub fn format_validation_table(report: &[(String, Result<ScriptSpec>)]) -> String {
    if report.is_empty() {
        return "No hooks found".to_string();
    }

    let mut output = String::new();
    let mut invalid = 0;
    for (name, outcome) in report {
        match outcome {
            Ok(script) => output.push_str(&format!("✓ {:<24} {}\n", truncate(name, 24), script)),
            Err(e) => {
                invalid += 1;
                output.push_str(&format!("✗ {:<24} {}\n", truncate(name, 24), e));
            }
        }
    }
    output.push_str(&format!(
        "\n{} hook(s) checked, {} invalid\n",
        report.len(),
        invalid
    ));
    output
}

/// Format a validation report as JSON
pub fn format_validation_json(report: &[(String, Result<ScriptSpec>)]) -> Result<String> {
    let entries: Vec<Value> = report
        .iter()
        .map(|(name, outcome)| match outcome {
            Ok(script) => json!({ "name": name, "valid": true, "script": script.to_string() }),
            Err(e) => json!({
                "name": name,
                "valid": false,
                "kind": e.kind(),
                "error": e.to_string(),
            }),
        })
        .collect();
    serde_json::to_string_pretty(&entries)
        .map_err(|e| HooksError::Config(format!("Failed to serialize report: {}", e)))
}

/// Format a dispatch result as a table
pub fn format_dispatch_table(result: &DispatchResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("Event: {}\n", result.event_type));

    if result.records.is_empty() && result.detached.is_empty() {
        output.push_str("No hooks ran\n");
    } else {
        output.push_str("Hook                     | Outcome  | Attempts | Duration | Details\n");
        output.push_str("-------------------------|----------|----------|----------|-----------------\n");
        for record in &result.records {
            let details = record
                .result
                .error
                .as_deref()
                .or(record.result.message.as_deref())
                .unwrap_or("");
            output.push_str(&format!(
                "{:<24} | {:<8} | {:<8} | {:>6}ms | {}\n",
                truncate(&record.hook_name, 24),
                record.outcome.to_string(),
                record.attempts,
                record.duration_ms,
                truncate(details.lines().next().unwrap_or(""), 60)
            ));
        }
        for name in &result.detached {
            output.push_str(&format!(
                "{:<24} | {:<8} | {:<8} | {:>8} | running in background\n",
                truncate(name, 24),
                "async",
                "-",
                "-"
            ));
        }
    }

    if result.blocked {
        output.push('\n');
        output.push_str(&result.failure_report());
    }
    output
}

/// Format a dispatch result as JSON
pub fn format_dispatch_json(result: &DispatchResult) -> Result<String> {
    serde_json::to_string_pretty(result)
        .map_err(|e| HooksError::Config(format!("Failed to serialize dispatch result: {}", e)))
}
