//! Client core for table-oriented HTTP/JSON resource APIs.
//!
//! # Overview
//! Maps CRUD operations on named tables onto requests of the form
//! `{base}/{version}/{table}/{field}{op}{value}...`, sends them through a
//! pluggable [`Transport`], and classifies the JSON envelope that comes back
//! into a payload or a typed [`ApiError`].
//!
//! # Design
//! - `TableClient` carries the session token, session metadata, pagination
//!   totals, the last request (for page replay) and pending sort directives.
//! - Request composition and response classification are pure; only
//!   `Transport::send` touches the network, so tests script the server with a
//!   closure.
//! - Action names like `getWidgets` or `getWidgetById` are resolved by
//!   [`router::resolve`] into an explicit [`Operation`].
//! - Logging goes through `tracing`; nothing is printed without a subscriber.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod filter;
pub mod http;
pub mod ordering;
pub mod pagination;
pub mod response;
pub mod router;
pub mod transport;

pub use client::{LoginAudit, RequestDescriptor, TableClient};
pub use config::ClientConfig;
pub use credential::Credential;
pub use error::ApiError;
pub use filter::{Filters, Operator};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use pagination::PaginationState;
pub use response::{classify, Envelope, Pagination};
pub use router::Operation;
pub use transport::{Transport, TransportError, UreqTransport};
