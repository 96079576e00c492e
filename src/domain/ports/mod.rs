mod http_port;
mod render_port;

pub use http_port::HttpTransport;
pub use render_port::{DocumentKind, DocumentRenderer, RenderContext};
