//! Scaffold builder — idempotent creation of the declared tree, then a
//! permission pass over everything created or confirmed present.
//!
//! Safe to re-run: existing directories are kept, existing files are never
//! truncated. The only fatal filesystem condition mid-run is a type conflict
//! (a file where a directory belongs, or the reverse).

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::permissions::{self, EntryKind, RuleSet};
use crate::report::{Action, BuildReport};
use crate::spec::{DirNode, SpecError, TreeNode, TreeSpec};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("existing entry at {path} is a {found}, expected a {expected}")]
    Conflict {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot create destination root {path}")]
    DestRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no artifacts could be created under {dest}")]
    Aborted { dest: PathBuf },
    #[error(transparent)]
    InvalidRules(#[from] SpecError),
}

/// Create every directory and file the spec describes under `dest_root`,
/// then apply permission rules. Returns the ordered report of the run.
pub fn build(spec: &TreeSpec, dest_root: &Path) -> Result<BuildReport, BuildError> {
    let rules = RuleSet::compile(&spec.project.permissions)?;

    std::fs::create_dir_all(dest_root).map_err(|source| BuildError::DestRoot {
        path: dest_root.to_path_buf(),
        source,
    })?;

    let mut cx = BuildCx {
        dest_root,
        report: BuildReport::default(),
        targets: Vec::new(),
    };

    // Depth-first, pre-order, in document order.
    for dir in spec.project.directories.as_deref().unwrap_or_default() {
        cx.ensure_dir_node(Path::new(""), dir)?;
    }
    for file in spec.project.files.as_deref().unwrap_or_default() {
        cx.ensure_file(&PathBuf::from(file))?;
    }

    if cx.report.confirmed() == 0 {
        return Err(BuildError::Aborted {
            dest: dest_root.to_path_buf(),
        });
    }

    cx.apply_permissions(&rules);
    info!(
        confirmed = cx.report.confirmed(),
        warnings = cx.report.warnings().count(),
        "build complete"
    );
    Ok(cx.report)
}

struct BuildCx<'a> {
    dest_root: &'a Path,
    report: BuildReport,
    /// Created-or-confirmed paths, in run order, for the permission pass.
    targets: Vec<(PathBuf, EntryKind)>,
}

impl BuildCx<'_> {
    fn ensure_dir_node(&mut self, parent: &Path, node: &DirNode) -> Result<(), BuildError> {
        let rel = parent.join(&node.name);
        if !self.ensure_dir(&rel)? {
            // Could not create the directory; its subtree is unreachable.
            return Ok(());
        }
        for child in &node.children {
            match child {
                TreeNode::File(name) => self.ensure_file(&rel.join(name))?,
                TreeNode::Dir(dir) => self.ensure_dir_node(&rel, dir)?,
            }
        }
        Ok(())
    }

    fn ensure_dir(&mut self, rel: &Path) -> Result<bool, BuildError> {
        let abs = self.dest_root.join(rel);
        if abs.is_dir() {
            debug!(path = %rel.display(), "dir exists");
            self.confirm(rel, EntryKind::Dir, Action::AlreadyExisted);
            return Ok(true);
        }
        if abs.exists() {
            return Err(BuildError::Conflict {
                path: abs,
                expected: "directory",
                found: "file",
            });
        }
        match std::fs::create_dir(&abs) {
            Ok(()) => {
                debug!(path = %rel.display(), "dir created");
                self.confirm(rel, EntryKind::Dir, Action::Created);
                Ok(true)
            }
            // Benign race with a concurrent creator — tolerated if the
            // winner made a directory.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if abs.is_dir() {
                    self.confirm(rel, EntryKind::Dir, Action::AlreadyExisted);
                    Ok(true)
                } else {
                    Err(BuildError::Conflict {
                        path: abs,
                        expected: "directory",
                        found: "file",
                    })
                }
            }
            Err(e) => {
                warn!(path = %rel.display(), err = %e, "dir create failed");
                self.report
                    .record_detail(rel, EntryKind::Dir, Action::CreateFailed, e.to_string());
                Ok(false)
            }
        }
    }

    fn ensure_file(&mut self, rel: &Path) -> Result<(), BuildError> {
        let abs = self.dest_root.join(rel);
        if abs.is_file() {
            debug!(path = %rel.display(), "file exists");
            self.confirm(rel, EntryKind::File, Action::AlreadyExisted);
            return Ok(());
        }
        if abs.exists() {
            return Err(BuildError::Conflict {
                path: abs,
                expected: "file",
                found: "directory",
            });
        }
        // create_new: never truncate something that appeared since the check.
        match OpenOptions::new().write(true).create_new(true).open(&abs) {
            Ok(_) => {
                debug!(path = %rel.display(), "file created");
                self.confirm(rel, EntryKind::File, Action::Created);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if abs.is_file() {
                    self.confirm(rel, EntryKind::File, Action::AlreadyExisted);
                    Ok(())
                } else {
                    Err(BuildError::Conflict {
                        path: abs,
                        expected: "file",
                        found: "directory",
                    })
                }
            }
            Err(e) => {
                warn!(path = %rel.display(), err = %e, "file create failed");
                self.report
                    .record_detail(rel, EntryKind::File, Action::CreateFailed, e.to_string());
                Ok(())
            }
        }
    }

    fn confirm(&mut self, rel: &Path, kind: EntryKind, action: Action) {
        self.report.record(rel, kind, action);
        self.targets.push((rel.to_path_buf(), kind));
    }

    /// Second pass: resolve and apply a mode for every confirmed path.
    fn apply_permissions(&mut self, rules: &RuleSet) {
        for (rel, kind) in std::mem::take(&mut self.targets) {
            let mode = rules.mode_for(&rel, kind);
            let abs = self.dest_root.join(&rel);
            match permissions::apply_mode(&abs, mode) {
                Ok(()) => {
                    self.report.record_detail(
                        &rel,
                        kind,
                        Action::PermissionSet,
                        format!("0o{mode:o}"),
                    );
                }
                Err(e) => {
                    warn!(path = %rel.display(), err = %e, "set permissions failed");
                    self.report.record_detail(
                        &rel,
                        kind,
                        Action::PermissionFailed,
                        e.to_string(),
                    );
                }
            }
        }
    }
}
