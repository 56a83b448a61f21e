//! Pre-flight diagnostic checks for `mkproj doctor`.
//!
//! Runs before any build, so it can catch a missing or broken structure
//! file and an unwritable destination before they cause confusing
//! mid-run failures.

use std::path::Path;

use crate::config::ScaffoldConfig;
use crate::spec::TreeSpec;

/// The result of a single diagnostic check.
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Run all diagnostic checks and return a list of results.
pub fn run_doctor(config: &ScaffoldConfig) -> Vec<CheckResult> {
    vec![
        check_structure_file(&config.structure_file),
        check_structure_parses(&config.structure_file),
        check_dest_writable(&config.dest),
        check_disk_space(&config.dest),
    ]
}

// ─── Individual checks ────────────────────────────────────────────────────────

/// Check 1: the structure file exists.
fn check_structure_file(path: &Path) -> CheckResult {
    let passed = path.is_file();
    CheckResult {
        name: "Structure file present",
        passed,
        detail: if passed {
            format!("{} exists", path.display())
        } else {
            format!("{} not found", path.display())
        },
    }
}

/// Check 2: the structure file parses and validates.
fn check_structure_parses(path: &Path) -> CheckResult {
    match TreeSpec::load(path) {
        Ok(spec) => CheckResult {
            name: "Structure file valid",
            passed: true,
            detail: format!(
                "{} directories, {} files, {} permission rules",
                spec.dir_count(),
                spec.file_count(),
                spec.project.permissions.len()
            ),
        },
        Err(e) => CheckResult {
            name: "Structure file valid",
            passed: false,
            detail: e.to_string(),
        },
    }
}

/// Check 3: the destination root is writable.
fn check_dest_writable(dest: &Path) -> CheckResult {
    if !dest.exists() {
        // A missing destination is fine — build creates it. Probe the
        // nearest existing ancestor instead.
        let probe_base = dest
            .ancestors()
            .find(|a| a.exists())
            .unwrap_or_else(|| Path::new("."));
        return probe_writable(probe_base, "Destination creatable");
    }
    if !dest.is_dir() {
        return CheckResult {
            name: "Destination writable",
            passed: false,
            detail: format!("{} exists but is not a directory", dest.display()),
        };
    }
    probe_writable(dest, "Destination writable")
}

fn probe_writable(dir: &Path, name: &'static str) -> CheckResult {
    let test_path = dir.join(".mkproj_write_test");
    match std::fs::write(&test_path, b"ok") {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_path);
            CheckResult {
                name,
                passed: true,
                detail: format!("{} is writable", dir.display()),
            }
        }
        Err(e) => CheckResult {
            name,
            passed: false,
            detail: format!("cannot write to {}: {e}", dir.display()),
        },
    }
}

/// Check 4: sufficient disk space is available (> 10 MB).
fn check_disk_space(dest: &Path) -> CheckResult {
    let base = dest
        .ancestors()
        .find(|a| a.exists())
        .unwrap_or_else(|| Path::new("."));
    match available_disk_bytes(base) {
        Some(bytes) => {
            const WARN_THRESHOLD: u64 = 10 * 1024 * 1024;
            let passed = bytes > WARN_THRESHOLD;
            let detail = if bytes >= 1024 * 1024 * 1024 {
                format!("{:.1} GB free", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
            } else {
                format!("{:.0} MB free", bytes as f64 / (1024.0 * 1024.0))
            };
            CheckResult {
                name: "Disk space",
                passed,
                detail: if passed {
                    detail
                } else {
                    format!("low disk space: only {detail}")
                },
            }
        }
        None => CheckResult {
            name: "Disk space",
            passed: true, // assume ok if we cannot check
            detail: "could not determine disk space".to_string(),
        },
    }
}

/// Return available bytes on the filesystem containing `path`.
fn available_disk_bytes(path: &Path) -> Option<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        let path_cstr = CString::new(path.to_str().unwrap_or("/").as_bytes()).ok()?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::statvfs(path_cstr.as_ptr(), &mut stat) };
        if ret == 0 {
            Some(stat.f_bavail as u64 * stat.f_frsize as u64)
        } else {
            None
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print a formatted table of check results to stdout.
pub fn print_doctor_results(results: &[CheckResult]) {
    println!();
    println!("{BOLD}mkproj doctor — pre-flight checks{RESET}");
    println!("{}", "─".repeat(60));

    for r in results {
        let (symbol, color) = if r.passed { ("✓", GREEN) } else { ("✗", RED) };
        println!("  {color}{symbol}{RESET}  {:<26}  {}", r.name, r.detail);
    }

    println!("{}", "─".repeat(60));

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed == 0 {
        println!("{GREEN}All checks passed.{RESET}");
    } else {
        println!("{RED}{failed} check(s) failed. See above for details.{RESET}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> ScaffoldConfig {
        ScaffoldConfig {
            structure_file: dir.join("project_structure.yaml"),
            dest: dir.to_path_buf(),
            log: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }

    #[test]
    fn missing_structure_file_fails_checks() {
        let dir = TempDir::new().unwrap();
        let results = run_doctor(&config_in(dir.path()));
        assert!(!results[0].passed, "presence check should fail");
        assert!(!results[1].passed, "parse check should fail");
    }

    #[test]
    fn valid_structure_file_passes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("project_structure.yaml"),
            "project:\n  files:\n    - README.md\n",
        )
        .unwrap();
        let results = run_doctor(&config_in(dir.path()));
        assert!(results[0].passed);
        assert!(results[1].passed);
        assert!(results[2].passed, "tempdir should be writable");
    }

    #[test]
    fn missing_destination_probes_nearest_ancestor() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.dest = dir.path().join("not/yet/created");
        std::fs::write(
            dir.path().join("project_structure.yaml"),
            "project:\n  files:\n    - README.md\n",
        )
        .unwrap();
        let results = run_doctor(&cfg);
        assert!(results[2].passed, "creatable destination should pass");
    }

    #[test]
    fn file_destination_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.dest = dir.path().join("occupied");
        std::fs::write(&cfg.dest, b"not a dir").unwrap();
        let results = run_doctor(&cfg);
        assert!(!results[2].passed);
    }
}
