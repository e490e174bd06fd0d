//! Shared types for the weft middle-end.
//!
//! Nodes in the AST only remember the source line they came from; the file
//! is a property of the enclosing module. [`SourceLoc`] pairs the two for
//! diagnostics, and [`LineIndex`] maps a line back to a byte range when the
//! module still carries its source text.

pub mod span;

pub use span::{LineIndex, SourceLoc};
