use anyhow::Result;
use colored::Colorize;
use imkit::DriverKind;
use std::path::PathBuf;

use crate::Context;
use crate::ui;

/// Tool entry point checked for each kind, relative to its root
fn entry_point(kind: DriverKind) -> (&'static str, &'static str) {
    match kind {
        DriverKind::Package => (imkit::package::DEFAULT_ROOT, "eclipse/tools/imcl"),
        DriverKind::Installer => (imkit::package::DEFAULT_ROOT, "eclipse/tools/imcl"),
        DriverKind::Profile => (imkit::profile::DEFAULT_ROOT, "bin/manageprofiles.sh"),
        DriverKind::LibertyServer | DriverKind::Server => (imkit::liberty::DEFAULT_ROOT, "bin/server"),
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Tool Check");

    let mut missing = 0;
    for kind in DriverKind::ALL {
        let (default_root, entry) = entry_point(kind);
        let root = ctx
            .config
            .tool_root(kind)
            .unwrap_or_else(|| PathBuf::from(default_root));
        let path = root.join(entry);
        if path.exists() {
            println!("  {} {:<16} {}", "✓".green(), kind.as_str(), path.display());
        } else {
            missing += 1;
            println!("  {} {:<16} {}", "✗".red(), kind.as_str(), path.display().to_string().dimmed());
        }
    }

    println!();
    if missing == 0 {
        ui::success("All tools found");
    } else {
        ui::warn(&format!("{missing} tool(s) not found"));
        ui::dim("Set tool_root per kind in the config file or pass --tool-root.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points_are_relative() {
        for kind in DriverKind::ALL {
            let (root, entry) = entry_point(kind);
            assert!(root.starts_with('/'));
            assert!(!entry.starts_with('/'));
        }
    }
}
