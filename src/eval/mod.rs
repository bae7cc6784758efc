//! Evaluation-block scanning.
//!
//! This module provides:
//! - `mask` for blanking comments and string/symbol literals
//! - `find_region` and `evaluation_selection` for locating the enclosing
//!   evaluable `( ... )` block at a cursor offset
//!
//! Both are pure functions over the source text; they allocate only
//! call-scoped working memory and are safe to call concurrently.

mod block;
mod mask;

pub use block::{evaluation_selection, find_region, Selection};
pub use mask::mask;
