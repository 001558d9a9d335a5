//! First-activation boot flag.
//!
//! The supervising process watches for this file to learn that the runtime
//! reached its first app activation, so it only needs to exist; content is
//! a timestamp purely for debugging reboots by hand.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::VoiceResult;

/// File name written into the runtime state directory once the first app
/// activation completes.
pub const STARTUP_FLAG_FILE: &str = ".vesper.activation.boot";

/// Write the boot flag under `dir`, replacing any previous one.
pub async fn write_startup_flag(dir: &Path) -> VoiceResult<PathBuf> {
    let path = dir.join(STARTUP_FLAG_FILE);
    let stamp = chrono::Utc::now().to_rfc3339();
    tokio::fs::write(&path, stamp.as_bytes()).await?;
    info!(path = %path.display(), "wrote startup flag");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_flag_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_startup_flag(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), STARTUP_FLAG_FILE);
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!content.is_empty());
    }

    #[tokio::test]
    async fn rewrites_existing_flag() {
        let dir = tempfile::tempdir().unwrap();
        write_startup_flag(dir.path()).await.unwrap();
        let path = write_startup_flag(dir.path()).await.unwrap();
        assert!(path.exists());
    }
}
