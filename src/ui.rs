use colored::Colorize;
use reconcile::{Action, Phase, PhaseObserver, Report};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Report Rendering
// ============================================================================

/// Status word shown in front of the message
pub fn status_label(report: &Report) -> &'static str {
    if report.failed {
        "failed"
    } else if report.dry_run && report.action.is_some_and(|a| a != Action::Noop) {
        "would change"
    } else if report.changed {
        "changed"
    } else {
        "ok"
    }
}

/// Render a report for humans
pub fn report(report: &Report, verbose: u8) {
    let line = format!("[{}] {}", status_label(report), report.msg);
    if report.failed {
        error(&line);
    } else if report.changed {
        success(&line);
    } else if report.dry_run {
        warn(&line);
    } else {
        info(&line);
    }

    if let Some(rc) = report.rc
        && (report.failed || verbose > 0)
    {
        kv("exit status", &rc.to_string());
    }
    for (key, value) in &report.facts {
        kv(key, value);
    }
    for warning in &report.warnings {
        warn(warning);
    }

    // Tool output is noise on success unless asked for
    if report.failed || verbose > 0 {
        stream("stdout", &report.stdout);
        stream("stderr", &report.stderr);
    }
    if let Some(advice) = report.advice {
        dim(advice);
    }
}

fn stream(name: &str, text: &str) {
    let text = text.trim_end();
    if text.is_empty() {
        return;
    }
    println!("  {}", format!("{name}:").dimmed());
    for line in text.lines() {
        println!("    {}", line.dimmed());
    }
}

/// Prints the command about to run
pub struct ProgressObserver {
    pub quiet: bool,
}

impl PhaseObserver for ProgressObserver {
    fn on_phase(&mut self, phase: Phase) {
        log::trace!("phase: {phase}");
    }

    fn on_execute(&mut self, command: &str) {
        if !self.quiet {
            println!("{} {}", "→".cyan(), command.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn report(changed: bool, failed: bool, dry_run: bool, action: Action) -> Report {
        Report {
            changed,
            failed,
            msg: String::new(),
            action: Some(action),
            dry_run,
            stdout: String::new(),
            stderr: String::new(),
            rc: None,
            facts: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
            advice: None,
        }
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label(&report(false, true, false, Action::Create)), "failed");
        assert_eq!(status_label(&report(true, false, false, Action::Create)), "changed");
        assert_eq!(status_label(&report(false, false, true, Action::Destroy)), "would change");
        assert_eq!(status_label(&report(false, false, true, Action::Noop)), "ok");
        assert_eq!(status_label(&report(false, false, false, Action::Create)), "ok");
    }
}
