//! Mongo-style filter expressions: typed tree, document rendering,
//! parsing and in-process evaluation.
//!
//! The anchor predicate for keyset pagination is built as a [`FilterExpr`]
//! and rendered with [`FilterExpr::to_document`] before it reaches the
//! store. [`FilterExpr::from_document`] and [`FilterExpr::matches`] let the
//! in-memory store run the same documents a real store would.

mod eval;
mod parse;
mod types;
mod value;

pub use parse::ParseError;
pub use types::{
    CompoundFilter, Document, Filter, FilterExpr, LogicalOp, Operator, and, not, or, simple,
};
pub use value::{compare_values, lookup, values_equal};
