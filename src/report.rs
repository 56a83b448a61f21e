//! Build report — the ordered record of what a run did.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::permissions::EntryKind;

/// What happened to one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    AlreadyExisted,
    PermissionSet,
    PermissionFailed,
    CreateFailed,
}

impl Action {
    pub fn is_warning(self) -> bool {
        matches!(self, Action::PermissionFailed | Action::CreateFailed)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Created => "created",
            Action::AlreadyExisted => "already-existed",
            Action::PermissionSet => "permission-set",
            Action::PermissionFailed => "permission-failed",
            Action::CreateFailed => "create-failed",
        };
        f.write_str(s)
    }
}

/// One `(path, action)` record, in run order.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    /// Destination-root-relative path.
    pub path: PathBuf,
    pub kind: EntryKind,
    pub action: Action,
    /// Mode string for permission records, error text for failures.
    pub detail: Option<String>,
}

/// Ordered log of a full run, plus counters for the summary.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub entries: Vec<ReportEntry>,
}

impl BuildReport {
    pub fn record(&mut self, path: &Path, kind: EntryKind, action: Action) {
        self.entries.push(ReportEntry {
            path: path.to_path_buf(),
            kind,
            action,
            detail: None,
        });
    }

    pub fn record_detail(
        &mut self,
        path: &Path,
        kind: EntryKind,
        action: Action,
        detail: impl Into<String>,
    ) {
        self.entries.push(ReportEntry {
            path: path.to_path_buf(),
            kind,
            action,
            detail: Some(detail.into()),
        });
    }

    /// Entries created or confirmed present — the artifact count the
    /// zero-artifact abort rule looks at.
    pub fn confirmed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.action, Action::Created | Action::AlreadyExisted))
            .count()
    }

    pub fn created_dirs(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.action == Action::Created && e.kind == EntryKind::Dir)
    }

    pub fn created_files(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.action == Action::Created && e.kind == EntryKind::File)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.action.is_warning())
    }

    pub fn actions_for(&self, path: &Path) -> Vec<Action> {
        self.entries
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.action)
            .collect()
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the run summary to stdout. With `quiet`, only the counts and
/// warnings are shown, not the per-path listing.
pub fn print_summary(report: &BuildReport, quiet: bool) {
    let dirs: Vec<_> = report.created_dirs().collect();
    let files: Vec<_> = report.created_files().collect();

    println!("{BOLD}Creation complete.{RESET}");
    println!("- Directories created: {}", dirs.len());
    println!("- Files created: {}", files.len());

    if !quiet {
        if !dirs.is_empty() {
            println!("Directories:");
            for e in &dirs {
                println!("  - {}", e.path.display());
            }
        }
        if !files.is_empty() {
            println!("Files:");
            for e in &files {
                println!("  - {}", e.path.display());
            }
        }
    }

    let warnings: Vec<_> = report.warnings().collect();
    if !warnings.is_empty() {
        println!("{YELLOW}{} warning(s):{RESET}", warnings.len());
        for w in &warnings {
            println!(
                "  {YELLOW}!{RESET} {} {} ({})",
                w.path.display(),
                w.action,
                w.detail.as_deref().unwrap_or("unknown cause")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_counts_created_and_existing() {
        let mut r = BuildReport::default();
        r.record(Path::new("src"), EntryKind::Dir, Action::Created);
        r.record(Path::new("README.md"), EntryKind::File, Action::AlreadyExisted);
        r.record_detail(
            Path::new("src"),
            EntryKind::Dir,
            Action::PermissionSet,
            "0o755",
        );
        assert_eq!(r.confirmed(), 2);
    }

    #[test]
    fn warnings_are_failure_actions_only() {
        let mut r = BuildReport::default();
        r.record(Path::new("a"), EntryKind::File, Action::Created);
        r.record_detail(
            Path::new("a"),
            EntryKind::File,
            Action::PermissionFailed,
            "read-only file system",
        );
        assert_eq!(r.warnings().count(), 1);
    }

    #[test]
    fn action_display_matches_report_vocabulary() {
        assert_eq!(Action::Created.to_string(), "created");
        assert_eq!(Action::AlreadyExisted.to_string(), "already-existed");
        assert_eq!(Action::PermissionSet.to_string(), "permission-set");
    }
}
