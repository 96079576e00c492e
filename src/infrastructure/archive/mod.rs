//! Package archive assembly.

pub mod assembler;
pub mod layout;
pub mod sink;

pub use assembler::{ArchiveAssembler, AssemblerState, assemble};
pub use layout::{EPUB_MIMETYPE, PrologueEntry, prologue};
pub use sink::{SealableSink, SinkSeal};
