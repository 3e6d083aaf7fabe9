//! Path router.
//!
//! Routes bind one path segment to a handler or to a nested router and are
//! matched in registration order. A route registered with
//! [`Router::route_prefix`] also matches longer paths and receives the
//! unmatched remainder.

pub mod static_files;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use crate::http::content_type::ContentType;
use crate::http::handler::{ConnectionInfo, Handler};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};

pub use static_files::StaticFiles;

/// A routed callback. `remainder` is the rest of the path after the
/// matched segment, for prefix routes.
pub trait Route: Send + Sync {
    fn call(
        &self,
        conn: &ConnectionInfo,
        request: &Request,
        response: &mut Response,
        remainder: Option<&str>,
    ) -> anyhow::Result<()>;
}

impl<F> Route for F
where
    F: Fn(&ConnectionInfo, &Request, &mut Response, Option<&str>) -> anyhow::Result<()>
        + Send
        + Sync,
{
    fn call(
        &self,
        conn: &ConnectionInfo,
        request: &Request,
        response: &mut Response,
        remainder: Option<&str>,
    ) -> anyhow::Result<()> {
        self(conn, request, response, remainder)
    }
}

enum Target {
    Route(Arc<dyn Route>),
    Nested(Router),
}

struct Entry {
    segment: String,
    target: Target,
    match_remainder: bool,
}

#[derive(Default)]
pub struct Router {
    entries: Vec<Entry>,
    not_found_page: Option<PathBuf>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page sent with every 404 this router (and its nested routers) renders.
    pub fn with_not_found_page(mut self, page: Option<PathBuf>) -> Self {
        self.not_found_page = page;
        self
    }

    /// Matches `segment` exactly, with nothing after it.
    pub fn route(&mut self, segment: &str, route: impl Route + 'static) -> &mut Self {
        self.push(segment, Target::Route(Arc::new(route)), false);
        self
    }

    /// Matches `segment` and anything below it.
    pub fn route_prefix(&mut self, segment: &str, route: impl Route + 'static) -> &mut Self {
        self.push(segment, Target::Route(Arc::new(route)), true);
        self
    }

    /// Routes everything below `segment` through `router`.
    pub fn nest(&mut self, segment: &str, router: Router) -> &mut Self {
        self.push(segment, Target::Nested(router), false);
        self
    }

    fn push(&mut self, segment: &str, target: Target, match_remainder: bool) {
        self.entries.push(Entry {
            segment: segment.trim_matches('/').to_owned(),
            target,
            match_remainder,
        });
    }

    /// Finds the route for `path` and the remainder it should receive.
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<(&'a dyn Route, Option<&'a str>)> {
        let mut router = self;
        let mut rest = path.trim_start_matches('/');

        loop {
            let (segment, tail) = match rest.split_once('/') {
                Some((s, t)) => (s, t.trim_start_matches('/')),
                None => (rest, ""),
            };

            let entry = router.entries.iter().find(|e| {
                e.segment == segment
                    && match e.target {
                        Target::Route(_) => tail.is_empty() || e.match_remainder,
                        Target::Nested(_) => true,
                    }
            })?;

            match &entry.target {
                Target::Route(route) => {
                    let remainder = (!tail.is_empty()).then_some(tail);
                    return Some((route.as_ref(), remainder));
                }
                Target::Nested(nested) => {
                    router = nested;
                    rest = tail;
                }
            }
        }
    }

    /// Answers `404`, with the configured page when it can be sent.
    pub fn render_not_found(&self, request: &Request, response: &mut Response) {
        response.set_status(StatusCode::NotFound);
        if let Some(page) = &self.not_found_page {
            match response.send_file(page, request.method()) {
                Ok(_) => return,
                Err(e) => error!(page = %page.display(), error = %e, "Cannot send 404 page"),
            }
        }
        response.write_text(ContentType::TextPlain, "404 Not Found");
    }
}

impl Handler for Router {
    fn handle(
        &self,
        conn: &ConnectionInfo,
        request: &Request,
        response: &mut Response,
    ) -> anyhow::Result<()> {
        let Some((route, remainder)) = self.resolve(request.path()) else {
            debug!(path = %request.path(), "No route matched");
            self.render_not_found(request, response);
            return Ok(());
        };

        match route.call(conn, request, response, remainder) {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {
                debug!(path = %request.path(), error = %e, "Route reported not found");
                *response = Response::new(StatusCode::NotFound);
                self.render_not_found(request, response);
            }
            Err(e) => {
                error!(path = %request.path(), error = %e, "Route failed");
                *response = Response::new(StatusCode::InternalServerError);
                response.write_text(ContentType::TextPlain, "500 Internal Server Error");
            }
        }
        Ok(())
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    })
}
