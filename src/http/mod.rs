//! HTTP transport: client, request/response types and the payload
//! [`Responder`] seam.

pub mod client;
pub mod probe;
pub mod request;
pub mod responder;
pub mod response;

pub use client::{ClientOptions, HttpClient};
pub use probe::TokenProbe;
pub use request::HttpRequest;
pub use responder::{HttpResponder, InjectionPoint, RequestTemplate, Responder};
pub use response::HttpResponse;
