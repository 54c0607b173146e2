use std::path::{Path, PathBuf};

/// Looks for an already downloaded wallpaper named `<id>.<ext>` in `dir`.
///
/// Only non-empty regular files count. A zero-byte file is what an interrupted download leaves
/// behind, and it must not stop the ID from being fetched again.
pub async fn existing_artifact(dir: &Path, id: u64, extensions: &[String]) -> Option<PathBuf> {
    for ext in extensions {
        let candidate = dir.join(format!("{id}.{}", ext.trim_start_matches('.')));
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => return Some(candidate),
            _ => continue,
        }
    }
    None
}
