//! MangaDex API access: the cache-fronted gateway and typed endpoints.

mod client;
mod dto;
mod gateway;

pub use client::MangaDexClient;
pub use dto::{AtHomeChapter, AtHomeResponse, Envelope};
pub use gateway::{API_URL, Admission, ApiGateway, DEV_API_URL, GatewayOptions, UPLOADS_URL};
