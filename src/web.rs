//! Static asset lookup and the index page.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve a single requested file name under `root`.
///
/// Returns `Ok(None)` when the name is not a plain file name (traversal,
/// separators, hidden paths) or nothing servable exists there. Other I/O
/// failures are returned so the caller can answer 500.
pub async fn lookup(root: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    let mut components = Path::new(name).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || name.starts_with('.') {
        return Ok(None);
    }

    let path = root.join(name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(Some(path)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Render the index template. It has no data bindings, so rendering is
/// reading it.
pub async fn render_index(path: &Path) -> io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// `NAME=value` lines for every environment variable starting with `prefix`.
///
/// Names and values that are not UTF-8 are rendered lossily.
pub fn env_listing(prefix: &str) -> String {
    let mut vars: Vec<(String, String)> = std::env::vars_os()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .filter(|(name, _)| name.starts_with(prefix))
        .collect();
    vars.sort();

    vars.into_iter()
        .map(|(name, value)| format!("{}={}\n", name, value))
        .collect()
}
