//! Append-only error log (~/.local/share/Cadence/logs/error.log).

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::paths::logs_dir;

const LOG_FILE: &str = "error.log";
const RULE: &str = "====================";

/// Persist `err` to the default log. Failures are reported, never raised.
pub fn record(tag: &str, err: &anyhow::Error) {
    let path = logs_dir().join(LOG_FILE);
    if let Err(e) = append_to(&path, tag, err) {
        tracing::warn!("⚠️ [errlog] could not write {}: {e}", path.display());
    }
}

pub fn append_to(path: &Path, tag: &str, err: &anyhow::Error) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(f, "{RULE}")?;
    writeln!(f, "Timestamp: {timestamp}")?;
    writeln!(f, "Tag: {tag}")?;
    writeln!(f, "Error:")?;
    for (depth, cause) in err.chain().enumerate() {
        if depth == 0 {
            writeln!(f, "{cause}")?;
        } else {
            writeln!(f, "  caused by: {cause}")?;
        }
    }
    writeln!(f, "{RULE}\n")?;
    f.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn appends_entries_with_cause_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join(LOG_FILE);

        let err = Err::<(), _>(io::Error::other("disk on fire"))
            .context("loading vocabulary")
            .unwrap_err();
        append_to(&path, "startup", &err).unwrap();
        append_to(&path, "generate", &anyhow::anyhow!("second")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Timestamp: ").count(), 2);
        assert!(text.contains("Tag: startup"));
        assert!(text.contains("loading vocabulary\n  caused by: disk on fire"));
        assert!(text.contains("Tag: generate"));
    }
}
