//! Minimal HTTP/1.1 surface
//!
//! Just enough HTTP for one request per connection: request framing,
//! routing, fixed-format responses, and static asset serving.

pub mod request;
pub mod response;
pub mod router;
pub mod static_files;

pub use request::{read_request, Request};
pub use response::{stream_headers, Response, Status};
pub use router::Route;
pub use static_files::StaticFiles;
