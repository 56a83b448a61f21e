//! Permission rule evaluation — compiled glob rules with extension defaults.
//!
//! Rules match destination-root-relative paths. The rule list is evaluated in
//! document order and the last match wins; when nothing matches, the mode
//! falls back to a fixed per-kind default table.

use std::path::Path;

use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::spec::{PermissionRule, SpecError};

/// rwxr-xr-x
pub const DIR_MODE_DEFAULT: u32 = 0o755;
/// rw-r--r--
pub const FILE_MODE_DEFAULT: u32 = 0o644;
/// rwxr-xr-x
pub const FILE_MODE_EXECUTABLE: u32 = 0o755;

/// Extensions that default to an executable mode.
pub const EXECUTABLE_EXTS: &[&str] = &["py", "sh"];
/// Known text extensions; same mode as the fallback, kept as the documented
/// default set.
pub const TEXT_EXTS: &[&str] = &["yaml", "yml", "md", "txt", "json", "csv", "ini", "cfg"];

/// What kind of filesystem entry a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

struct CompiledRule {
    pattern: String,
    matcher: GlobMatcher,
    mode: u32,
}

/// The permission rules of one spec, compiled once per run.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: &[PermissionRule]) -> Result<RuleSet, SpecError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let matcher = Glob::new(&rule.pattern)
                    .map_err(|source| SpecError::BadPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    })?
                    .compile_matcher();
                Ok(CompiledRule {
                    pattern: rule.pattern.clone(),
                    matcher,
                    mode: rule.mode.bits(),
                })
            })
            .collect::<Result<Vec<_>, SpecError>>()?;
        Ok(RuleSet { rules })
    }

    /// Select the mode for a root-relative path. Last matching rule wins;
    /// otherwise the default table applies.
    pub fn mode_for(&self, rel: &Path, kind: EntryKind) -> u32 {
        let mut selected = None;
        for rule in &self.rules {
            if rule.matcher.is_match(rel) {
                selected = Some((rule.pattern.as_str(), rule.mode));
            }
        }
        match selected {
            Some((pattern, mode)) => {
                let mode_str = format!("0o{mode:o}");
                debug!(path = %rel.display(), pattern, mode = %mode_str, "rule match");
                mode
            }
            None => default_mode(rel, kind),
        }
    }
}

fn default_mode(rel: &Path, kind: EntryKind) -> u32 {
    if kind == EntryKind::Dir {
        return DIR_MODE_DEFAULT;
    }
    let ext = rel
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some(e) if EXECUTABLE_EXTS.contains(&e) => {
            debug!(path = %rel.display(), "executable by extension");
            FILE_MODE_EXECUTABLE
        }
        Some(e) if TEXT_EXTS.contains(&e) => FILE_MODE_DEFAULT,
        _ => FILE_MODE_DEFAULT,
    }
}

/// Apply a mode to a path. On non-Unix targets this is a no-op — the mode
/// model still validates, but there is nothing to set.
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn apply_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
