use strand::http::content_type::ContentType;
use strand::http::request::{Method, Request, RequestBuilder, RequestState, Version};

#[test]
fn test_request_header_retrieval() {
    let req = RequestBuilder::new(Method::GET, "/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
    assert_eq!(req.content_type(), Some(ContentType::ApplicationJson));
}

#[test]
fn test_built_request_is_done() {
    let req = RequestBuilder::new(Method::POST, "/api")
        .header("Content-Type", "text/plain")
        .body("hello")
        .build()
        .unwrap();

    assert!(req.is_done());
    assert_eq!(req.state(), RequestState::Done);
    assert_eq!(req.expected_body_size(), 5);
    assert_eq!(req.received_body_size(), 5);
    assert_eq!(&req.body().to_bytes()[..], b"hello");
}

#[test]
fn test_builder_keeps_every_body_chunk() {
    let req = RequestBuilder::new(Method::POST, "/api")
        .header("Content-Type", "application/json")
        .body(r#"{"a":1,"#)
        .body(r#""b":2}"#)
        .build()
        .unwrap();

    assert_eq!(req.body().len(), 2);
    assert_eq!(req.expected_body_size(), 13);
    assert_eq!(&req.body().to_bytes()[..], br#"{"a":1,"b":2}"#);
}

#[test]
fn test_new_request_waits_for_start_line() {
    let req = Request::new();
    assert_eq!(req.state(), RequestState::ReceivingStartLine);
    assert!(req.headers().is_empty());
    assert!(req.body().is_empty());
}

#[test]
fn test_keep_alive_http11_default() {
    let req = RequestBuilder::new(Method::GET, "/").build().unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_keep_alive_http11_close() {
    let req = RequestBuilder::new(Method::GET, "/")
        .header("Connection", "close")
        .build()
        .unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_keep_alive_http10_default() {
    let req = RequestBuilder::new(Method::GET, "/")
        .version(Version::Http10)
        .build()
        .unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_keep_alive_http10_explicit() {
    let req = RequestBuilder::new(Method::GET, "/")
        .version(Version::Http10)
        .header("Connection", "Keep-Alive")
        .build()
        .unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_path_and_query() {
    let req = RequestBuilder::new(Method::GET, "/search?q=rust+lang&page=2").build().unwrap();
    assert_eq!(req.path(), "/search");
    assert_eq!(req.url().query_param("q").as_deref(), Some("rust lang"));
    assert_eq!(req.url().query_param("page").as_deref(), Some("2"));
    assert!(!req.url().is_ambiguous());
}

#[test]
fn test_split_at_last_question_mark() {
    let req = RequestBuilder::new(Method::GET, "/a?b?c=1").build().unwrap();
    assert_eq!(req.path(), "/a?b");
    assert_eq!(req.url().query(), Some("c=1"));
    assert!(req.url().is_ambiguous());
}
