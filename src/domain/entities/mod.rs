//! Domain entity definitions.

mod chapter;
mod image;
mod manga;
mod package;
mod relationship;

pub use chapter::{Chapter, ChapterAttributes};
pub use image::{FetchResult, ImageRef, basename, media_type_of};
pub use manga::{Manga, MangaAttributes};
pub use package::PackageFormat;
pub use relationship::{LocalizedString, Relationship, names_of, pick_localized};
