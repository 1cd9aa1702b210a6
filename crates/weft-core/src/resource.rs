//! Static content served when no page or listener is addressed.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Result, WeftError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResource {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Finds static content for a request path.
pub trait ResourceLocator: Send + Sync {
    /// The resource at `path`, or `None` when there is none.
    ///
    /// # Errors
    ///
    /// Only for I/O failures on a resource that does exist.
    fn locate(&self, path: &str) -> Result<Option<StaticResource>>;
}

/// Serves files below a root directory. Paths that would leave the root
/// (`..`, absolute segments) never match.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }
}

impl ResourceLocator for DirectoryLocator {
    fn locate(&self, path: &str) -> Result<Option<StaticResource>> {
        let Some(file) = self.resolve(path) else {
            debug!(path, "refusing static path outside the root");
            return Ok(None);
        };
        if !file.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&file).map_err(|source| WeftError::Resource {
            path: path.to_string(),
            source,
        })?;
        Ok(Some(StaticResource {
            content_type: content_type_for(&file),
            bytes,
        }))
    }
}

/// Content type by file extension (case-insensitive).
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn serves_files_below_the_root_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "no").unwrap();
        let locator = DirectoryLocator::new(dir.path().join("css"));

        let found = locator.locate("/site.css").unwrap().unwrap();
        assert_eq!(found.content_type, "text/css; charset=utf-8");
        assert_eq!(found.bytes, b"body {}");

        assert_eq!(locator.locate("/../secret.txt").unwrap(), None);
        assert_eq!(locator.locate("/missing.css").unwrap(), None);
        assert_eq!(locator.locate("/").unwrap(), None);
    }
}
