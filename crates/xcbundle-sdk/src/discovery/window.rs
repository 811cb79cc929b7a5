//! Modification time filtering of build artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::types::{BuildError, CandidateArtifact, TimeInterval};

/// Admits only files modified while the build was running.
///
/// This separates the artifacts of this build from leftovers of a previous
/// build that shared the same output directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModificationTimeWindowFilter;

impl ModificationTimeWindowFilter {
    /// Returns `true` if the file at `path` was last modified within `interval`.
    ///
    /// A file that cannot be stat'ed is an error, not "outside the window".
    pub fn in_window(&self, path: &Path, interval: &TimeInterval) -> Result<bool, BuildError> {
        let modified = modification_time(path)?;
        Ok(self.admit_time(path, modified, interval))
    }

    /// Stats every path and keeps those modified within `interval`, in order.
    pub fn admit(
        &self,
        paths: Vec<PathBuf>,
        interval: &TimeInterval,
    ) -> Result<Vec<CandidateArtifact>, BuildError> {
        let mut admitted = Vec::with_capacity(paths.len());
        for path in paths {
            let modified = modification_time(&path)?;
            if self.admit_time(&path, modified, interval) {
                admitted.push(CandidateArtifact { path, modified });
            }
        }
        Ok(admitted)
    }

    fn admit_time(&self, path: &Path, modified: SystemTime, interval: &TimeInterval) -> bool {
        if interval.contains(modified) {
            return true;
        }
        info!(
            "{} was modified at {}, which is outside of the build window {} - {}",
            path.display(),
            format_time(modified),
            format_time(interval.start),
            format_time(interval.end)
        );
        false
    }
}

fn modification_time(path: &Path) -> Result<SystemTime, BuildError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| {
            BuildError::Io(io::Error::new(
                e.kind(),
                format!("failed to check {} modtime: {}", path.display(), e),
            ))
        })
}

fn format_time(instant: SystemTime) -> String {
    OffsetDateTime::from(instant)
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{:?}", instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use std::time::Duration;
    use tempfile::TempDir;

    fn file_modified_at(dir: &Path, name: &str, at: SystemTime) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "<plist/>").unwrap();
        set_file_mtime(&path, FileTime::from_system_time(at)).unwrap();
        path
    }

    fn window() -> TimeInterval {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        TimeInterval::new(start, start + Duration::from_secs(60))
    }

    #[test]
    fn boundaries_are_inclusive() {
        let dir = TempDir::new().unwrap();
        let interval = window();
        let filter = ModificationTimeWindowFilter;

        let at_start = file_modified_at(dir.path(), "start.xctestrun", interval.start);
        let at_end = file_modified_at(dir.path(), "end.xctestrun", interval.end);
        assert!(filter.in_window(&at_start, &interval).unwrap());
        assert!(filter.in_window(&at_end, &interval).unwrap());
    }

    #[test]
    fn times_outside_window_are_rejected() {
        let dir = TempDir::new().unwrap();
        let interval = window();
        let filter = ModificationTimeWindowFilter;

        let before = file_modified_at(dir.path(), "before.xctestrun", interval.start - Duration::from_secs(1));
        let after = file_modified_at(dir.path(), "after.xctestrun", interval.end + Duration::from_secs(1));
        assert!(!filter.in_window(&before, &interval).unwrap());
        assert!(!filter.in_window(&after, &interval).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = ModificationTimeWindowFilter.in_window(&dir.path().join("gone.xctestrun"), &window());
        assert!(matches!(result, Err(BuildError::Io(_))));
    }

    #[test]
    fn admit_keeps_order_and_drops_stale_files() {
        let dir = TempDir::new().unwrap();
        let interval = window();
        let inside = interval.start + Duration::from_secs(5);
        let b = file_modified_at(dir.path(), "B.xctestrun", inside);
        let stale = file_modified_at(dir.path(), "C.xctestrun", interval.start - Duration::from_secs(3600));
        let a = file_modified_at(dir.path(), "A.xctestrun", inside);

        let admitted = ModificationTimeWindowFilter
            .admit(vec![b.clone(), stale, a.clone()], &interval)
            .unwrap();
        let paths: Vec<&PathBuf> = admitted.iter().map(|c| &c.path).collect();
        assert_eq!(paths, vec![&b, &a]);
        assert!(admitted.iter().all(|c| c.modified == inside));
    }
}
