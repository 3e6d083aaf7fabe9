use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strand::config::Config;
use strand::http::content_type::ContentType;
use strand::http::handler::ConnectionInfo;
use strand::http::request::Request;
use strand::http::response::Response;
use strand::router::{Router, StaticFiles};
use strand::server::Server;

struct Reply {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

fn test_page(
    _: &ConnectionInfo,
    _: &Request,
    resp: &mut Response,
    _: Option<&str>,
) -> anyhow::Result<()> {
    resp.write_text(ContentType::TextPlain, "test!");
    Ok(())
}

fn echo(
    _: &ConnectionInfo,
    req: &Request,
    resp: &mut Response,
    _: Option<&str>,
) -> anyhow::Result<()> {
    let content_type = req.content_type().unwrap_or(ContentType::OctetStream);
    resp.write_text(content_type, req.body().to_bytes());
    Ok(())
}

fn failing(
    _: &ConnectionInfo,
    _: &Request,
    _: &mut Response,
    _: Option<&str>,
) -> anyhow::Result<()> {
    anyhow::bail!("backend unavailable")
}

fn panicking(
    _: &ConnectionInfo,
    _: &Request,
    _: &mut Response,
    _: Option<&str>,
) -> anyhow::Result<()> {
    panic!("route bug")
}

fn bind_server(root: &Path, pools: usize) -> Server {
    let yaml = format!(
        "server:\n  listen_addr: \"127.0.0.1:0\"\n  pools: {}\n  poll_timeout_ms: 10\n\
         static_files:\n  root: \"{}\"\n  not_found_page: \"{}\"\n",
        pools,
        root.display(),
        root.join("404.html").display()
    );
    let cfg = Config::from_yaml(&yaml).unwrap();

    let mut router = Router::new().with_not_found_page(cfg.static_files.not_found_page.clone());
    router.route("test", test_page);
    router.route("echo", echo);
    router.route("fail", failing);
    router.route("panic", panicking);
    router.route_prefix(&cfg.static_files.mount, StaticFiles::new(&cfg.static_files.root));

    Server::bind(&cfg, Arc::new(router)).unwrap()
}

fn start_server(root: &Path) -> Server {
    let server = bind_server(root, 2);
    server.start().unwrap();
    server
}

/// Asserts the server closed the socket without sending anything more.
/// Unread input on the server side turns the close into a reset.
fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    match stream.read_to_end(&mut rest) {
        Ok(_) => assert!(rest.is_empty(), "unexpected bytes: {:?}", rest),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("404.html"), "<h1>gone</h1>").unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
    dir
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

fn read_reply(stream: &mut TcpStream, expect_body: bool) -> Reply {
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];
    while !raw.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).unwrap();
        assert_eq!(n, 1, "connection closed inside the response head");
        raw.push(byte[0]);
    }

    let head = String::from_utf8(raw).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap().to_string();
    let headers: Vec<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .map(|l| {
            let (k, v) = l.split_once(':').unwrap();
            (k.trim().to_string(), v.trim().to_string())
        })
        .collect();

    let mut reply = Reply {
        status_line,
        headers,
        body: Vec::new(),
    };
    if expect_body {
        let len: usize = reply.header("Content-Length").unwrap().parse().unwrap();
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).unwrap();
        reply.body = body;
    }
    reply
}

fn request(addr: SocketAddr, raw: &str) -> Reply {
    let mut stream = connect(addr);
    stream.write_all(raw.as_bytes()).unwrap();
    read_reply(&mut stream, !raw.starts_with("HEAD "))
}

#[test]
fn test_get_test_route() {
    let dir = site();
    let server = start_server(dir.path());

    let reply = request(server.local_addr(), "GET /test HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("text/plain"));
    assert_eq!(reply.header("Content-Length"), Some("5"));
    assert!(reply.header("Server").is_some_and(|s| s.contains("Strand/")));
    assert!(reply.header("Date").is_some());
    assert_eq!(reply.body, b"test!");
}

#[test]
fn test_missing_static_file_gets_not_found_page() {
    let dir = site();
    let server = start_server(dir.path());

    let reply = request(server.local_addr(), "GET /static/missing.file HTTP/1.1\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(reply.header("Content-Type"), Some("text/html"));
    assert_eq!(reply.body, b"<h1>gone</h1>");
}

#[test]
fn test_unknown_route_gets_not_found_page() {
    let dir = site();
    let server = start_server(dir.path());

    let reply = request(server.local_addr(), "GET /nowhere HTTP/1.1\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(reply.body, b"<h1>gone</h1>");
}

#[test]
fn test_path_traversal_is_refused() {
    let dir = site();
    let server = start_server(dir.path());

    let reply = request(server.local_addr(), "GET /static/../404.html HTTP/1.1\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 404 Not Found");
}

#[test]
fn test_body_split_across_writes_is_reassembled() {
    let dir = site();
    let server = start_server(dir.path());

    let body = r#"{"a":1,"b":2}"#;
    let (first, second) = body.split_at(6);

    let mut stream = connect(server.local_addr());
    write!(
        stream,
        "POST /echo HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        first
    )
    .unwrap();
    stream.flush().unwrap();
    thread::sleep(Duration::from_millis(100));
    stream.write_all(second.as_bytes()).unwrap();

    let reply = read_reply(&mut stream, true);
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("application/json"));
    assert_eq!(reply.body, body.as_bytes());
}

#[test]
fn test_head_on_file_advertises_length_only() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream
        .write_all(b"HEAD /static/index.html HTTP/1.1\r\n\r\nGET /test HTTP/1.1\r\n\r\n")
        .unwrap();

    let head = read_reply(&mut stream, false);
    assert_eq!(head.status_line, "HTTP/1.1 200 OK");
    assert_eq!(head.header("Content-Length"), Some("14"));
    assert_eq!(head.header("Accept-Ranges"), Some("bytes"));

    // The next bytes on the wire belong to the second response.
    let next = read_reply(&mut stream, true);
    assert_eq!(next.status_line, "HTTP/1.1 200 OK");
    assert_eq!(next.body, b"test!");
}

#[test]
fn test_get_static_file() {
    let dir = site();
    let server = start_server(dir.path());

    let reply = request(server.local_addr(), "GET /static/index.html HTTP/1.1\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.header("Content-Type"), Some("text/html"));
    assert_eq!(reply.body, b"<h1>hello</h1>");
}

#[test]
fn test_keep_alive_serves_several_requests() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    for _ in 0..3 {
        stream.write_all(b"GET /test HTTP/1.1\r\n\r\n").unwrap();
        let reply = read_reply(&mut stream, true);
        assert_eq!(reply.body, b"test!");
    }
}

#[test]
fn test_connection_close_is_honoured() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream
        .write_all(b"GET /test HTTP/1.1\r\nConnection: close\r\n\r\n")
        .unwrap();
    let reply = read_reply(&mut stream, true);
    assert_eq!(reply.body, b"test!");

    assert_closed(&mut stream);
}

#[test]
fn test_http10_closes_by_default() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"GET /test HTTP/1.0\r\n\r\n").unwrap();
    let reply = read_reply(&mut stream, true);
    assert_eq!(reply.status_line, "HTTP/1.0 200 OK");

    assert_closed(&mut stream);
}

#[test]
fn test_invalid_method_gets_bad_request() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"BREW /pot HTTP/1.1\r\n\r\n").unwrap();
    let reply = read_reply(&mut stream, true);
    assert_eq!(reply.status_line, "HTTP/1.1 400 Bad Request");

    assert_closed(&mut stream);
}

#[test]
fn test_route_error_becomes_server_error() {
    let dir = site();
    let server = start_server(dir.path());

    let reply = request(server.local_addr(), "GET /fail HTTP/1.1\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 500 Internal Server Error");
}

#[test]
fn test_shutdown_closes_connections() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"GET /test HTTP/1.1\r\n\r\n").unwrap();
    read_reply(&mut stream, true);
    assert_eq!(server.connection_count(), 1);

    server.shutdown();
    server.shutdown();
    assert_eq!(server.connection_count(), 0);

    assert_closed(&mut stream);
}

#[test]
fn test_handler_panic_keeps_pool_alive() {
    let dir = site();
    let server = bind_server(dir.path(), 1);
    server.start().unwrap();

    let mut first = connect(server.local_addr());
    first.write_all(b"GET /panic HTTP/1.1\r\n\r\n").unwrap();
    assert_closed(&mut first);

    let reply = request(server.local_addr(), "GET /test HTTP/1.1\r\n\r\n");
    assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
    assert_eq!(reply.body, b"test!");
}

#[test]
fn test_serve_until_shutdown_handle_fires() {
    let dir = site();
    let server = Arc::new(bind_server(dir.path(), 2));
    let handle = server.shutdown_handle();

    let serving = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.serve())
    };

    let mut stream = connect(server.local_addr());
    stream.write_all(b"GET /test HTTP/1.1\r\n\r\n").unwrap();
    let reply = read_reply(&mut stream, true);
    assert_eq!(reply.body, b"test!");
    assert!(!handle.is_shutdown());

    handle.shutdown();
    serving.join().unwrap().unwrap();

    assert!(handle.is_shutdown());
    assert_eq!(server.connection_count(), 0);
    assert_closed(&mut stream);
}

#[test]
fn test_malformed_header_closes_connection() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream
        .write_all(b"GET / HTTP/1.1\r\nBroken header\r\n\r\n")
        .unwrap();
    assert_closed(&mut stream);
}

#[test]
fn test_malformed_start_line_closes_connection() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"GET /only-two-tokens\r\n\r\n").unwrap();
    assert_closed(&mut stream);
}

#[test]
fn test_line_longer_than_receive_buffer_closes_connection() {
    let dir = site();
    let server = start_server(dir.path());

    // The default receive buffer holds 1024 bytes.
    let line = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(2048));
    let mut stream = connect(server.local_addr());
    stream.write_all(line.as_bytes()).unwrap();
    assert_closed(&mut stream);
}

#[test]
fn test_half_closed_peer_still_gets_response() {
    let dir = site();
    let server = start_server(dir.path());

    let mut stream = connect(server.local_addr());
    stream.write_all(b"GET /test HTTP/1.0\r\n\r\n").unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let reply = read_reply(&mut stream, true);
    assert_eq!(reply.status_line, "HTTP/1.0 200 OK");
    assert_eq!(reply.body, b"test!");
    assert_closed(&mut stream);
}
