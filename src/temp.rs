use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// Process-local scratch files, uniquely named by a monotonic counter.
///
/// Files are deleted on drop on a best-effort basis; deletion failures are silently
/// ignored. A crash mid-pipeline may leak them, which is acceptable for this tool.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh uniquely-named path in the system temp directory. The file is
    /// not created; the path is tracked for cleanup either way.
    pub fn reserve(&mut self, label: &str, ext: &str) -> PathBuf {
        let id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("cardreel_{}_{id}_{label}.{ext}", std::process::id());
        let path = std::env::temp_dir().join(name);
        self.paths.push(path.clone());
        path
    }

    /// Stage `bytes` into a fresh tracked temp file.
    pub fn stage_bytes(
        &mut self,
        label: &str,
        ext: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = self.reserve(label, ext);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Delete all tracked files now (also happens on drop).
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            let _ = std::fs::remove_file(&path);
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}
