//! HTTP transport adapters.

mod reqwest_transport;

pub use reqwest_transport::{DEFAULT_TIMEOUT, ReqwestTransport, USER_AGENT};
