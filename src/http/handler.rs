use crate::http::request::Request;
use crate::http::response::Response;
use std::net::SocketAddr;
use std::time::SystemTime;

/// What a handler may know about the connection a request came from.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: u64,
    pub peer: SocketAddr,
    pub created_at: SystemTime,
}

/// Application entry point for completed requests.
///
/// A handler sets the status and body on `response`. Returning an error
/// closes the connection without sending anything. Handlers must not keep
/// references to the request or connection past the call.
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        conn: &ConnectionInfo,
        request: &Request,
        response: &mut Response,
    ) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&ConnectionInfo, &Request, &mut Response) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(
        &self,
        conn: &ConnectionInfo,
        request: &Request,
        response: &mut Response,
    ) -> anyhow::Result<()> {
        self(conn, request, response)
    }
}
