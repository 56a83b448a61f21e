//! `project_structure.yaml` schema — the declarative tree description.
//!
//! The document is parsed into explicit tagged variants (a string child is a
//! file, a mapping child is a nested directory) and validated before any
//! filesystem mutation happens.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Conventional structure file name, read from the working directory.
pub const STRUCTURE_FILE: &str = "project_structure.yaml";

/// Top-level document.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    pub project: Project,
}

/// The `project:` mapping.
///
/// `directories` and `files` are each optional, but at least one of the two
/// must be present in the document (an entirely empty project is rejected).
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    /// Directory tree, in document order.
    pub directories: Option<Vec<DirNode>>,
    /// File names created directly under the destination root.
    pub files: Option<Vec<String>>,
    /// Permission rules, evaluated in document order; the last match wins.
    #[serde(default)]
    pub permissions: Vec<PermissionRule>,
}

/// One directory to create, with an arbitrarily nested child list.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// A child entry: a plain string names an empty file, a mapping is a nested
/// directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    File(String),
    Dir(DirNode),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File(name) => name,
            TreeNode::Dir(dir) => &dir.name,
        }
    }
}

/// Maps a glob pattern to a permission mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionRule {
    /// Matched against destination-root-relative paths.
    pub pattern: String,
    pub mode: Mode,
}

/// POSIX permission bits, normalized from the YAML value.
///
/// Accepted forms:
/// - an integer whose decimal digits are read as octal (`755` → `0o755`)
/// - a digit string, leading zeros ignored (`"755"`, `"0644"`)
/// - an explicit `0o`-prefixed octal string (`"0o755"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(pub u32);

impl Mode {
    /// Parse decimal digits as octal digits: `"755"` → `0o755`.
    fn from_octal_digits(s: &str) -> Result<Mode, String> {
        if s.is_empty() {
            return Err("empty mode".to_string());
        }
        let mut acc: u32 = 0;
        for ch in s.chars() {
            let d = match ch.to_digit(8) {
                Some(d) => d,
                None => return Err(format!("invalid octal digit {ch:?} in mode {s:?}")),
            };
            acc = (acc << 3) | d;
        }
        Mode::bounded(acc, s)
    }

    fn from_str_value(raw: &str) -> Result<Mode, String> {
        let s = raw.trim().to_ascii_lowercase();
        if let Some(rest) = s.strip_prefix("0o") {
            let v = u32::from_str_radix(rest, 8)
                .map_err(|_| format!("invalid octal mode {raw:?}"))?;
            return Mode::bounded(v, raw);
        }
        let trimmed = s.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Mode::from_octal_digits(digits)
    }

    fn bounded(v: u32, raw: &str) -> Result<Mode, String> {
        if v > 0o7777 {
            Err(format!("mode {raw:?} out of range (max 0o7777)"))
        } else {
            Ok(Mode(v))
        }
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0o{:o}", self.0)
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Int(v) if v < 0 => Err(format!("negative mode {v}")),
            Raw::Int(v) => Mode::from_octal_digits(&v.to_string()),
            Raw::Str(s) => Mode::from_str_value(&s),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

/// Validation and parse failures — all raised before any filesystem mutation.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("structure file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid structure file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("`project` must declare at least one of `directories` or `files`")]
    EmptyProject,
    #[error("invalid node name {name:?}: {reason}")]
    BadName { name: String, reason: &'static str },
    #[error("duplicate sibling name {name:?} under {parent:?}")]
    DuplicateSibling { name: String, parent: String },
    #[error("invalid glob pattern {pattern:?}")]
    BadPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl TreeSpec {
    /// Load and validate a structure file.
    pub fn load(path: &Path) -> Result<TreeSpec, SpecError> {
        if !path.exists() {
            return Err(SpecError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: TreeSpec =
            serde_yaml::from_str(&contents).map_err(|source| SpecError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Structural validation: presence, name safety, sibling uniqueness,
    /// pattern compilability.
    pub fn validate(&self) -> Result<(), SpecError> {
        let project = &self.project;
        if project.directories.is_none() && project.files.is_none() {
            return Err(SpecError::EmptyProject);
        }

        // Top-level directories and root files share one sibling namespace.
        let mut seen = HashSet::new();
        for dir in project.directories.as_deref().unwrap_or_default() {
            check_name(&dir.name)?;
            if !seen.insert(dir.name.clone()) {
                return Err(SpecError::DuplicateSibling {
                    name: dir.name.clone(),
                    parent: ".".to_string(),
                });
            }
            validate_children(&dir.name, &dir.children)?;
        }
        for file in project.files.as_deref().unwrap_or_default() {
            check_name(file)?;
            if !seen.insert(file.clone()) {
                return Err(SpecError::DuplicateSibling {
                    name: file.clone(),
                    parent: ".".to_string(),
                });
            }
        }

        for rule in &project.permissions {
            globset::Glob::new(&rule.pattern).map_err(|source| SpecError::BadPattern {
                pattern: rule.pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Count of directory nodes in the tree.
    pub fn dir_count(&self) -> usize {
        fn walk(nodes: &[TreeNode]) -> usize {
            nodes
                .iter()
                .map(|n| match n {
                    TreeNode::File(_) => 0,
                    TreeNode::Dir(d) => 1 + walk(&d.children),
                })
                .sum()
        }
        self.project
            .directories
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|d| 1 + walk(&d.children))
            .sum()
    }

    /// Count of file entries, nested children and root files combined.
    pub fn file_count(&self) -> usize {
        fn walk(nodes: &[TreeNode]) -> usize {
            nodes
                .iter()
                .map(|n| match n {
                    TreeNode::File(_) => 1,
                    TreeNode::Dir(d) => walk(&d.children),
                })
                .sum()
        }
        let nested: usize = self
            .project
            .directories
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|d| walk(&d.children))
            .sum();
        nested + self.project.files.as_deref().unwrap_or_default().len()
    }
}

fn validate_children(parent: &str, children: &[TreeNode]) -> Result<(), SpecError> {
    let mut seen = HashSet::new();
    for child in children {
        check_name(child.name())?;
        if !seen.insert(child.name().to_string()) {
            return Err(SpecError::DuplicateSibling {
                name: child.name().to_string(),
                parent: parent.to_string(),
            });
        }
        if let TreeNode::Dir(dir) = child {
            validate_children(&dir.name, &dir.children)?;
        }
    }
    Ok(())
}

/// A node name must stay a single, safe path segment.
fn check_name(name: &str) -> Result<(), SpecError> {
    let bad = |reason| SpecError::BadName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(bad("empty name"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(bad("contains a path separator"));
    }
    if name == "." || name == ".." {
        return Err(bad("path traversal segment"));
    }
    if Path::new(name).is_absolute() {
        return Err(bad("absolute path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> TreeSpec {
        let spec: TreeSpec = serde_yaml::from_str(yaml).unwrap();
        spec.validate().unwrap();
        spec
    }

    #[test]
    fn parses_nested_directories_and_files() {
        let spec = parse(
            r#"
project:
  directories:
    - name: src
      children:
        - name: config
        - main.py
  files:
    - README.md
"#,
        );
        assert_eq!(spec.dir_count(), 2);
        assert_eq!(spec.file_count(), 2);
    }

    #[test]
    fn string_child_is_a_file_mapping_child_is_a_directory() {
        let spec = parse(
            r#"
project:
  directories:
    - name: conf
      children:
        - config.yaml
        - name: model
"#,
        );
        let dirs = spec.project.directories.as_deref().unwrap();
        assert!(matches!(&dirs[0].children[0], TreeNode::File(f) if f == "config.yaml"));
        assert!(matches!(&dirs[0].children[1], TreeNode::Dir(d) if d.name == "model"));
    }

    #[test]
    fn rejects_missing_project_sections() {
        let spec: TreeSpec = serde_yaml::from_str("project: {}\n").unwrap();
        assert!(matches!(spec.validate(), Err(SpecError::EmptyProject)));
    }

    #[test]
    fn rejects_traversal_names() {
        for name in ["..", ".", "a/b", "/etc", ""] {
            let yaml = format!(
                "project:\n  directories:\n    - name: \"{name}\"\n"
            );
            let spec: TreeSpec = serde_yaml::from_str(&yaml).unwrap();
            assert!(
                matches!(spec.validate(), Err(SpecError::BadName { .. })),
                "name {name:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_duplicate_siblings() {
        let spec: TreeSpec = serde_yaml::from_str(
            r#"
project:
  directories:
    - name: src
      children:
        - util.py
        - util.py
"#,
        )
        .unwrap();
        assert!(matches!(
            spec.validate(),
            Err(SpecError::DuplicateSibling { .. })
        ));
    }

    #[test]
    fn rejects_bad_glob_pattern() {
        let spec: TreeSpec = serde_yaml::from_str(
            r#"
project:
  files: [a.txt]
  permissions:
    - pattern: "a["
      mode: 644
"#,
        )
        .unwrap();
        assert!(matches!(spec.validate(), Err(SpecError::BadPattern { .. })));
    }

    #[test]
    fn mode_accepts_int_and_string_forms() {
        assert_eq!(Mode::from_octal_digits("755").unwrap().bits(), 0o755);
        assert_eq!(Mode::from_str_value("755").unwrap().bits(), 0o755);
        assert_eq!(Mode::from_str_value("0644").unwrap().bits(), 0o644);
        assert_eq!(Mode::from_str_value("0o755").unwrap().bits(), 0o755);
        assert_eq!(Mode::from_str_value("0").unwrap().bits(), 0);
    }

    #[test]
    fn mode_rejects_non_octal_and_out_of_range() {
        assert!(Mode::from_octal_digits("798").is_err());
        assert!(Mode::from_str_value("rwx").is_err());
        assert!(Mode::from_str_value("0o99").is_err());
        assert!(Mode::from_str_value("77777").is_err());
    }

    #[test]
    fn unparseable_mode_fails_the_document() {
        let result: Result<TreeSpec, _> = serde_yaml::from_str(
            r#"
project:
  files: [a.py]
  permissions:
    - pattern: "*.py"
      mode: "rwxr-xr-x"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn mode_displays_as_octal() {
        assert_eq!(Mode(0o755).to_string(), "0o755");
    }
}
