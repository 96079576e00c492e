//! Use case implementations.

mod export_chapter_use_case;

pub use export_chapter_use_case::ExportChapterUseCase;
