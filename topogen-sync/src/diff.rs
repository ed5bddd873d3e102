//! Dry-run unified diffs and per-template status for `topogen diff` / `topogen status`.

use std::io::ErrorKind;
use std::path::Path;

use similar::TextDiff;

use topogen_core::{TemplateConfig, TemplateKind};
use topogen_renderer::TemplateEngine;

use crate::error::{io_err, SyncError};
use crate::writer::is_unchanged;

/// Unified diff from the current content of `dest` to `rendered`.
///
/// Empty when the two are identical.
pub fn unified_diff(dest: &Path, current: &str, rendered: &str) -> String {
    if current == rendered {
        return String::new();
    }
    let old_header = format!("a{}", absolute_display(dest));
    let new_header = format!("b{}", absolute_display(dest));
    TextDiff::from_lines(current, rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string()
}

fn absolute_display(path: &Path) -> String {
    let shown = path.display().to_string();
    if shown.starts_with('/') {
        shown
    } else {
        format!("/{shown}")
    }
}

/// Current text of `path`; a missing file reads as empty.
pub fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Where a template's destination stands relative to the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStatus {
    /// Destination holds exactly what would be rendered.
    UpToDate,
    /// Destination exists but differs.
    Stale,
    /// Destination does not exist yet.
    Missing,
    /// Print or command-only template; nothing on disk to compare.
    NoDestination,
}

impl TemplateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateStatus::UpToDate => "up to date",
            TemplateStatus::Stale => "stale",
            TemplateStatus::Missing => "missing",
            TemplateStatus::NoDestination => "-",
        }
    }
}

/// Render `template` and compare it with its destination. Nothing is written.
pub fn template_status(
    template: &TemplateConfig,
    engine: &TemplateEngine,
) -> Result<TemplateStatus, SyncError> {
    let TemplateKind::Render { source, dest } = template.kind() else {
        return Ok(TemplateStatus::NoDestination);
    };
    let rendered = engine.render_file(source)?;
    if !dest.exists() {
        return Ok(TemplateStatus::Missing);
    }
    if is_unchanged(dest, &rendered)? {
        Ok(TemplateStatus::UpToDate)
    } else {
        Ok(TemplateStatus::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use topogen_renderer::TemplateContext;

    #[test]
    fn identical_content_has_no_diff() {
        assert!(unified_diff(Path::new("/etc/a.cfg"), "x\n", "x\n").is_empty());
    }

    #[test]
    fn diff_has_headers_and_hunks() {
        let diff = unified_diff(
            Path::new("/etc/haproxy/haproxy.cfg"),
            "backend api\n  server a 10.0.0.1:80\n",
            "backend api\n  server a 10.0.0.1:80\n  server b 10.0.0.2:80\n",
        );
        assert!(diff.contains("--- a/etc/haproxy/haproxy.cfg"), "{diff}");
        assert!(diff.contains("+++ b/etc/haproxy/haproxy.cfg"), "{diff}");
        assert!(diff.contains("@@"));
        assert!(diff.contains("+  server b 10.0.0.2:80"));
    }

    #[test]
    fn missing_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_existing_or_empty(&tmp.path().join("nope")).unwrap(), "");
    }

    #[test]
    fn status_tracks_destination() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("app.tera");
        let dest = tmp.path().join("app.cfg");
        fs::write(&source, "static\n").unwrap();
        let template = TemplateConfig {
            source: Some(source.clone()),
            dest: Some(dest.clone()),
            ..Default::default()
        };
        let engine = TemplateEngine::new(Arc::new(TemplateContext::default()));

        assert_eq!(template_status(&template, &engine).unwrap(), TemplateStatus::Missing);
        fs::write(&dest, "other\n").unwrap();
        assert_eq!(template_status(&template, &engine).unwrap(), TemplateStatus::Stale);
        fs::write(&dest, "static\n").unwrap();
        assert_eq!(template_status(&template, &engine).unwrap(), TemplateStatus::UpToDate);

        let print_only = TemplateConfig {
            source: Some(source),
            ..Default::default()
        };
        assert_eq!(
            template_status(&print_only, &engine).unwrap(),
            TemplateStatus::NoDestination
        );
    }
}
