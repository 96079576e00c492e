//! Domain error types.

mod mdex_error;

pub use mdex_error::{MdexError, MdexResult};
