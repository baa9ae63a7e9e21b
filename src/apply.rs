use crate::types::{ApplyResult, FixCandidate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum snippet prefix length (in chars) compared by the stale guard
const SNIPPET_GUARD_CHARS: usize = 40;

/// Per-candidate apply failure. Isolated: recorded in the apply log,
/// never aborts the rest of the batch.
#[derive(Debug)]
pub enum ApplyError {
    /// Target file does not exist under the project root
    FileNotFound(String),
    /// The target line no longer matches the snippet recorded at audit time
    StaleViolation { file: String, line: u32 },
    /// Reading or writing the target (or an extra file) failed
    WriteFailure(String),
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::FileNotFound(path) => write!(f, "file not found: {}", path),
            ApplyError::StaleViolation { file, line } => write!(
                f,
                "stale violation: {}:{} changed since the audit ran",
                file, line
            ),
            ApplyError::WriteFailure(detail) => write!(f, "write failure: {}", detail),
        }
    }
}

impl std::error::Error for ApplyError {}

/// Applies admitted fix candidates to files under a project root
pub struct Applier {
    root: PathBuf,
}

impl Applier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Apply one candidate: replace the violating line and write any extra
    /// generated files. Failures are captured in the returned ApplyResult.
    pub fn apply(&self, candidate: &FixCandidate) -> ApplyResult {
        let outcome = self.try_apply(candidate);
        if let Err(e) = &outcome {
            warn!("Failed to apply {}: {}", candidate.describe(), e);
        } else {
            debug!("Applied {}", candidate.describe());
        }
        ApplyResult {
            file: candidate.violation.file.clone(),
            line: candidate.violation.line,
            rule: candidate.violation.rule.clone(),
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    fn try_apply(&self, candidate: &FixCandidate) -> Result<(), ApplyError> {
        let violation = &candidate.violation;
        let path = self.root.join(&violation.file);
        if !path.is_file() {
            return Err(ApplyError::FileNotFound(violation.file.clone()));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| ApplyError::WriteFailure(format!("{}: {}", violation.file, e)))?;

        // Line numbers are 1-indexed; 0 and past-end are both stale, as is
        // a body that no longer matches. The guard is optimistic concurrency:
        // the line must still start with the recorded snippet (bounded
        // prefix), otherwise the file was edited since the audit ran and
        // this candidate must not touch it.
        let stale = || ApplyError::StaleViolation {
            file: violation.file.clone(),
            line: violation.line,
        };
        let (offset, body, terminator) =
            line_at(&content, violation.line).ok_or_else(stale)?;
        if !line_matches_snippet(body, &violation.snippet) {
            return Err(stale());
        }

        // Splice only the target line, keeping every line's own terminator
        // so CRLF files stay CRLF and a missing final newline stays missing
        let mut updated =
            String::with_capacity(content.len() + candidate.replacement.len());
        updated.push_str(&content[..offset]);
        updated.push_str(&candidate.replacement);
        updated.push_str(terminator);
        updated.push_str(&content[offset + body.len() + terminator.len()..]);
        write_atomic(&path, &updated)
            .map_err(|e| ApplyError::WriteFailure(format!("{}: {}", violation.file, e)))?;

        for extra in &candidate.extra_files {
            let extra_path = self.root.join(&extra.path);
            if let Some(parent) = extra_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ApplyError::WriteFailure(format!("{}: {}", extra.path, e)))?;
            }
            write_atomic(&extra_path, &extra.content)
                .map_err(|e| ApplyError::WriteFailure(format!("{}: {}", extra.path, e)))?;
        }

        Ok(())
    }
}

/// Locate a 1-indexed line in `content`, returning its byte offset, body
/// (without terminator) and terminator ("\r\n", "\n" or "" on the last line)
fn line_at(content: &str, line: u32) -> Option<(usize, &str, &str)> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for (i, segment) in content.split_inclusive('\n').enumerate() {
        if i + 1 == line as usize {
            let (body, terminator) = if let Some(body) = segment.strip_suffix("\r\n") {
                (body, "\r\n")
            } else if let Some(body) = segment.strip_suffix('\n') {
                (body, "\n")
            } else {
                (segment, "")
            };
            return Some((offset, body, terminator));
        }
        offset += segment.len();
    }
    None
}

fn line_matches_snippet(line: &str, snippet: &str) -> bool {
    let expected: String = snippet
        .trim_start()
        .chars()
        .take(SNIPPET_GUARD_CHARS)
        .collect();
    if expected.is_empty() {
        // Blank snippet: only a blank line matches
        return line.trim().is_empty();
    }
    line.trim_start().starts_with(&expected)
}

/// Write content to a temp file in the target's directory, then rename over
/// the target. Rename is atomic on the same filesystem, so readers never see
/// a partially written file.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let tmp = path.with_file_name(format!(".{}.fixpoint-tmp", file_name));
    fs::write(&tmp, content)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeneratedFile, Priority, SecurityRating, Verdict, Violation};

    fn candidate(file: &str, line: u32, snippet: &str, replacement: &str) -> FixCandidate {
        FixCandidate {
            violation: Violation {
                file: file.into(),
                line,
                rule: "no-todo".into(),
                snippet: snippet.into(),
                priority: Priority::Medium,
            },
            replacement: replacement.into(),
            extra_files: vec![],
            confidence: 0.9,
            verdict: Verdict::Approve,
            validation_score: 90.0,
            security_rating: SecurityRating::Secure,
            vulnerabilities: vec![],
        }
    }

    #[test]
    fn test_apply_replaces_target_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        fs::write(&path, "fn main() {\n    let x = y.unwrap();\n}\n").unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate(
            "main.rs",
            2,
            "let x = y.unwrap();",
            "    let x = y?;",
        ));

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "fn main() {\n    let x = y?;\n}\n"
        );
    }

    #[test]
    fn test_stale_line_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        let original = "fn main() {\n    let x = already_fixed();\n}\n";
        fs::write(&path, original).unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate(
            "main.rs",
            2,
            "let x = y.unwrap();",
            "    let x = y?;",
        ));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("stale violation"));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_line_past_end_of_file_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.rs");
        fs::write(&path, "one line\n").unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate("short.rs", 7, "one line", "changed"));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("stale violation"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "one line\n");
    }

    #[test]
    fn test_line_zero_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        let original = "first line\nsecond line\n";
        fs::write(&path, original).unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate("main.rs", 0, "first line", "changed"));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("stale violation"));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_crlf_endings_survive_the_splice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("win.rs");
        fs::write(&path, "fn main() {\r\n    let x = y.unwrap();\r\n}\r\n").unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate(
            "win.rs",
            2,
            "let x = y.unwrap();",
            "    let x = y?;",
        ));

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "fn main() {\r\n    let x = y?;\r\n}\r\n"
        );
    }

    #[test]
    fn test_missing_final_newline_stays_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.rs");
        fs::write(&path, "keep\nold last").unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate("tail.rs", 2, "old last", "new last"));

        assert!(result.success, "{:?}", result.error);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\nnew last");
    }

    #[test]
    fn test_missing_file_reports_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate("gone.rs", 1, "anything", "x"));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("file not found"));
    }

    #[test]
    fn test_extra_files_created_with_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lib.rs"), "old\n").unwrap();

        let mut c = candidate("lib.rs", 1, "old", "new");
        c.extra_files.push(GeneratedFile {
            path: "helpers/util.rs".into(),
            content: "pub fn helper() {}\n".into(),
        });

        let applier = Applier::new(dir.path());
        let result = applier.apply(&c);

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            fs::read_to_string(dir.path().join("helpers/util.rs")).unwrap(),
            "pub fn helper() {}\n"
        );
    }

    #[test]
    fn test_indented_snippet_matches_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        fs::write(&path, "        deep.unwrap();\n").unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate("a.rs", 1, "deep.unwrap();", "deep?;"));
        assert!(result.success, "{:?}", result.error);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "old\n").unwrap();

        let applier = Applier::new(dir.path());
        let result = applier.apply(&candidate("a.rs", 1, "old", "new"));
        assert!(result.success);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("fixpoint-tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
