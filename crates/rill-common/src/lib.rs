//! Shared types for the Rill toolchain.
//!
//! Everything here is plain data used by more than one crate: byte spans,
//! the token vocabulary, lexer errors, and the [`LineIndex`] that converts
//! between the canonical byte offsets and editor line/column positions.

pub mod error;
pub mod line_index;
pub mod span;
pub mod token;

pub use line_index::{LineCol, LineIndex, PositionEncoding};
pub use span::Span;
