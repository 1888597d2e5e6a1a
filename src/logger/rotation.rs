//! Size based rotation with numbered backups

use crate::logger::config::RotationConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Shifts `app.log` to `app.log.1`, `app.log.1` to `app.log.2` and so on,
/// keeping at most `max_files` backups.
pub struct RotationManager {
    config: RotationConfig,
}

impl RotationManager {
    pub fn new(config: RotationConfig) -> Self {
        Self { config }
    }

    pub fn should_rotate(&self, current_file_size: u64) -> bool {
        current_file_size >= self.config.max_size
    }

    /// Rotate `current_path`. The caller reopens the active file afterwards.
    pub fn rotate(&self, current_path: &Path) -> io::Result<()> {
        let oldest = backup_path(current_path, self.config.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for index in (1..self.config.max_files).rev() {
            let from = backup_path(current_path, index);
            if from.exists() {
                fs::rename(&from, backup_path(current_path, index + 1))?;
            }
        }

        if current_path.exists() {
            fs::rename(current_path, backup_path(current_path, 1))?;
        }

        Ok(())
    }
}

pub(crate) fn backup_path(base_path: &Path, index: usize) -> PathBuf {
    let mut name = base_path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager(max_size: u64, max_files: usize) -> RotationManager {
        RotationManager::new(RotationConfig {
            max_size,
            max_files,
        })
    }

    #[test]
    fn test_should_rotate_at_threshold() {
        let manager = manager(100, 3);
        assert!(!manager.should_rotate(99));
        assert!(manager.should_rotate(100));
        assert!(manager.should_rotate(101));
    }

    #[test]
    fn test_rotate_shifts_backups() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("app.log");
        let manager = manager(10, 3);

        fs::write(&log, "first").unwrap();
        manager.rotate(&log).unwrap();
        fs::write(&log, "second").unwrap();
        manager.rotate(&log).unwrap();

        assert!(!log.exists());
        assert_eq!(fs::read_to_string(backup_path(&log, 1)).unwrap(), "second");
        assert_eq!(fs::read_to_string(backup_path(&log, 2)).unwrap(), "first");
    }

    #[test]
    fn test_rotate_drops_oldest_backup() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("app.log");
        let manager = manager(10, 2);

        for content in ["one", "two", "three"] {
            fs::write(&log, content).unwrap();
            manager.rotate(&log).unwrap();
        }

        assert_eq!(fs::read_to_string(backup_path(&log, 1)).unwrap(), "three");
        assert_eq!(fs::read_to_string(backup_path(&log, 2)).unwrap(), "two");
        assert!(!backup_path(&log, 3).exists());
    }

    #[test]
    fn test_rotate_without_active_file() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("missing.log");
        assert!(manager(10, 2).rotate(&log).is_ok());
    }
}
