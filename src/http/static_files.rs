//! Static asset serving for the browser frontend

use std::path::{Path, PathBuf};

use super::response::{Response, Status};

const INDEX_FILE: &str = "index.html";

/// Serves files below a public directory
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `explicit` if given, else `./public` if it is a directory.
    /// Returns `None` when neither exists.
    pub fn discover(explicit: Option<&Path>) -> Option<Self> {
        let candidate = match explicit {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir().ok()?.join("public"),
        };

        if candidate.is_dir() {
            Some(Self::new(candidate))
        } else {
            tracing::debug!(path = %candidate.display(), "No public directory");
            None
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a request path to a file response.
    ///
    /// `/` maps to `index.html`, directories to their `index.html`, and
    /// unknown extension-less paths fall back to the root `index.html` so
    /// client-side routes load the app. Paths containing `..` are refused.
    pub async fn serve(&self, request_path: &str) -> Response {
        let path = request_path.split(['?', '#']).next().unwrap_or_default();
        let path = if path == "/" { "/index.html" } else { path };

        if path.contains("..") {
            return Response::not_found();
        }

        let relative = path.trim_start_matches('/');
        let candidate = self.root.join(relative);

        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_dir() => {
                let index = candidate.join(INDEX_FILE);
                if is_file(&index).await {
                    return self.send_file(&index).await;
                }
            }
            Ok(_) => return self.send_file(&candidate).await,
            Err(_) => {}
        }

        if !relative.contains('.') {
            let index = self.root.join(INDEX_FILE);
            if is_file(&index).await {
                return self.send_file(&index).await;
            }
        }

        Response::not_found()
    }

    async fn send_file(&self, path: &Path) -> Response {
        match tokio::fs::read(path).await {
            Ok(data) => Response::new(Status::Ok, mime_type(path), data),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read static file");
                Response::not_found()
            }
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Content type by file extension
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>root</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "<html>docs</html>").unwrap();
        dir
    }

    fn content_type(response: &Response) -> &str {
        response
            .headers
            .iter()
            .find(|(name, _)| *name == "Content-Type")
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let dir = public_dir();
        let files = StaticFiles::new(dir.path());

        let response = files.serve("/").await;
        assert_eq!(response.status, Status::Ok);
        assert_eq!(&response.body[..], b"<html>root</html>");
        assert_eq!(content_type(&response), "text/html");
    }

    #[tokio::test]
    async fn test_file_with_mime() {
        let dir = public_dir();
        let files = StaticFiles::new(dir.path());

        let response = files.serve("/app.js?v=3").await;
        assert_eq!(response.status, Status::Ok);
        assert_eq!(content_type(&response), "application/javascript");
    }

    #[tokio::test]
    async fn test_directory_index() {
        let dir = public_dir();
        let files = StaticFiles::new(dir.path());

        let response = files.serve("/docs").await;
        assert_eq!(&response.body[..], b"<html>docs</html>");
    }

    #[tokio::test]
    async fn test_spa_fallback_only_without_extension() {
        let dir = public_dir();
        let files = StaticFiles::new(dir.path());

        let route = files.serve("/settings/display").await;
        assert_eq!(&route.body[..], b"<html>root</html>");

        let missing = files.serve("/missing.css").await;
        assert_eq!(missing.status, Status::NotFound);
    }

    #[tokio::test]
    async fn test_traversal_refused() {
        let dir = public_dir();
        let files = StaticFiles::new(dir.path().join("docs"));

        let response = files.serve("/../app.js").await;
        assert_eq!(response.status, Status::NotFound);
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StaticFiles::discover(Some(&dir.path().join("nope"))).is_none());
        assert!(StaticFiles::discover(Some(dir.path())).is_some());
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(mime_type(Path::new("blob")), "application/octet-stream");
    }
}
