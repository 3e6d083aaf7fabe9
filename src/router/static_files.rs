use std::io;
use std::path::{Component, Path, PathBuf};

use crate::http::content_type::ContentType;
use crate::http::handler::ConnectionInfo;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::router::Route;

/// Serves files below a root directory. Meant for prefix routes: the
/// remainder of the path names the file.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request remainder to a path under the root. Only plain
    /// components are allowed.
    pub fn resolve(&self, remainder: &str) -> Option<PathBuf> {
        let relative = Path::new(remainder);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl Route for StaticFiles {
    fn call(
        &self,
        _conn: &ConnectionInfo,
        request: &Request,
        response: &mut Response,
        remainder: Option<&str>,
    ) -> anyhow::Result<()> {
        if !matches!(request.method(), Method::GET | Method::HEAD) {
            response
                .set_status(StatusCode::MethodNotAllowed)
                .set_header("Allow", "GET, HEAD")
                .write_text(ContentType::TextPlain, "405 Method Not Allowed");
            return Ok(());
        }

        let path = remainder
            .and_then(|r| self.resolve(r))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;

        response.set_status(StatusCode::Ok);
        response.send_file(&path, request.method())?;
        Ok(())
    }
}
