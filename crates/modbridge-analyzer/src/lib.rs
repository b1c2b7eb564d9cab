//! Modbridge Analyzer
//!
//! Build-time static checks for extension source code. Shares the rule
//! registry's field guidance with the load-time rewriter, so the patterns
//! the rewriter would have to intercept at load time get flagged while the
//! mod author is still compiling. Pure: one compilation unit in, a list of
//! diagnostics out.

pub mod analyzer;
pub mod source;

pub use analyzer::SourceAnalyzer;
pub use source::{split_statements, Statement};
