//! HTTP protocol implementation.
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: one accepted client; drives the parser from its receive buffer
//! - **`parser`**: the incremental request state machine
//! - **`request`**: request representation plus the method/version tables
//! - **`response`**: response representation, status table and default headers
//! - **`writer`**: the per-connection write-operation queue and response serialization
//! - **`header`**: ordered, case-insensitive header multimap
//! - **`segmented`**: chunked byte buffer holding request bodies
//! - **`url`**: request target split into path and query
//! - **`content_type`**: content type table and extension-based guessing
//! - **`handler`**: the application callback contract
//!
//! # Request State Machine
//!
//! Each request on a connection moves through:
//!
//! ```text
//!        ┌────────────────────┐
//!        │ ReceivingStartLine │ ← "METHOD SP PATH SP VERSION"
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐
//!        │  ReceivingHeaders  │ ← "Key: Value" lines until an empty line
//!        └─────────┬──────────┘
//!                  │ known Content-Type and Content-Length > 0
//!                  ▼
//!        ┌────────────────────┐
//!        │   ReceivingBody    │ ← raw bytes until Content-Length is reached
//!        └─────────┬──────────┘
//!                  ▼
//!        ┌────────────────────┐
//!        │        Done        │ → handler → response queued → fresh request
//!        └────────────────────┘
//! ```

pub mod connection;
pub mod content_type;
pub mod handler;
pub mod header;
pub mod parser;
pub mod request;
pub mod response;
pub mod segmented;
pub mod url;
pub mod writer;
