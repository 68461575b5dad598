//! Per-run working area.
//!
//! Every run gets its own freshly created directory, so the fixed file names used
//! by the compiler and converter never collide between concurrent runs. Isolation
//! comes from allocation; there is no locking.
//!
//! Dropping a `WorkingArea` deletes the directory and everything in it. `persist`
//! is the only way to keep it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    /// Creates an empty directory named `cvgen-<run_id>-XXXXXX` under `root`,
    /// or under the system temp dir when `root` is `None`.
    pub fn allocate(root: Option<&Path>, run_id: Uuid) -> io::Result<Self> {
        let prefix = format!("cvgen-{run_id}-");
        let mut builder = Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("Allocated working area {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Deletes every entry whose file name is not in `keep`. Returns how many were removed.
    pub fn retain_only(&self, keep: &[&str]) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(self.path())? {
            let entry = entry?;
            let name = entry.file_name();
            if keep.iter().any(|k| name.as_os_str() == *k) {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            debug!("Removed intermediate {}", path.display());
            removed += 1;
        }
        Ok(removed)
    }

    /// Hands the directory over to the caller; it is no longer deleted on drop.
    pub fn persist(self) -> PathBuf {
        self.dir.keep()
    }
}
