//! Measures how much project context from introspection tools improves
//! model-generated Symfony code.

pub mod compress;
pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod generation;
pub mod mcp;
pub mod output;
pub mod prompt;
pub mod scenario;

pub use error::{EvalError, EvalResult};
