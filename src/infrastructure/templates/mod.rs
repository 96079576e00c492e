//! Document rendering for package prologues.

mod renderer;

pub use renderer::BuiltinRenderer;
