use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Scratch directory for one processing attempt of one job.
///
/// The directory name carries the job id and a millisecond timestamp so
/// retried or concurrently redelivered jobs with the same id never collide on
/// disk. Everything under it is removed when the guard drops, which bounds
/// local disk usage regardless of which pipeline step failed.
#[derive(Debug)]
pub struct JobStaging {
    dir: PathBuf,
}

impl JobStaging {
    pub fn create(root: &Path, job_id: &str) -> io::Result<Self> {
        let dir = root.join(format!("{}_{}", job_id, Utc::now().timestamp_millis()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path the source image is downloaded to.
    pub fn source_path(&self) -> PathBuf {
        self.dir.join("source.jpg")
    }

    /// Path a logo crop is written to before upload.
    pub fn crop_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("logo_{index}.png"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for JobStaging {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}
