//! Domain layer with core entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{Chapter, FetchResult, ImageRef, Manga, PackageFormat};
pub use errors::{MdexError, MdexResult};
pub use ports::{DocumentKind, DocumentRenderer, HttpTransport, RenderContext};
