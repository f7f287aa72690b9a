// Terminal summaries of dispatch outcomes

use colored::Colorize;
use hookline_hooks::{DispatchResult, ExecutionRecord};

/// How a summary line is marked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Passed,
    Failed,
    Warning,
}

impl Mark {
    fn symbol(self) -> &'static str {
        match self {
            Mark::Passed => "✓",
            Mark::Failed => "✗",
            Mark::Warning => "⚠",
        }
    }
}

/// Renders the closing lines of a command on stderr
pub struct Summary {
    pub use_colors: bool,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
        }
    }
}

impl Summary {
    /// One marked line
    pub fn line(&self, mark: Mark, msg: &str) -> String {
        if !self.use_colors {
            return format!("{} {}", mark.symbol(), msg);
        }
        let symbol = match mark {
            Mark::Passed => mark.symbol().green().bold(),
            Mark::Failed => mark.symbol().red().bold(),
            Mark::Warning => mark.symbol().yellow(),
        };
        format!("{} {}", symbol, msg)
    }

    /// Async hook failures followed by the verdict for the event
    pub fn dispatch(
        &self,
        result: &DispatchResult,
        background: &[ExecutionRecord],
    ) -> Vec<(Mark, String)> {
        let mut lines: Vec<(Mark, String)> = background
            .iter()
            .filter(|record| record.is_failure())
            .map(|record| {
                let msg = format!(
                    "async hook '{}' {}: {}",
                    record.hook_name,
                    record.outcome,
                    record.result.error.as_deref().unwrap_or("no details")
                );
                (Mark::Warning, self.line(Mark::Warning, &msg))
            })
            .collect();

        let event = &result.event_type;
        let failures = result.failures().count();
        let (mark, msg) = if result.blocked {
            (
                Mark::Failed,
                format!("{} blocked by {} failing hook(s)", event, failures),
            )
        } else if failures > 0 {
            (
                Mark::Warning,
                format!("{} passed with {} non-blocking failure(s)", event, failures),
            )
        } else {
            (Mark::Passed, format!("{} hooks passed", event))
        };
        lines.push((mark, self.line(mark, &msg)));
        lines
    }
}

/// Print an error line on stderr
pub fn print_error(msg: &str) {
    eprintln!("{}", Summary::default().line(Mark::Failed, msg));
}
