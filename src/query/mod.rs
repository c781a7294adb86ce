//! Query expressions.
//!
//! Declarative selection by measurement, tag equality, field name and time
//! range. Expressions are validated locally, whether built with
//! [`Query::builder`] or parsed from text, so malformed queries never reach
//! the store.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{FieldSelection, ParseError, Query, QueryBuilder, TagPredicate, TimeRange};
pub use lexer::{LexError, Lexer, Token};
pub use parser::Parser;
