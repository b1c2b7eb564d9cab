//! Modbridge Engine
//!
//! The load-time rewriting pipeline: scan a module's external references,
//! match them against the rule registry, rewrite the metadata image, and
//! validate the result. One module in, one verdict out; a batch of modules
//! never aborts because one of them fails.

pub mod pipeline;
pub mod rewriter;
pub mod scanner;
pub mod validator;

pub use pipeline::{ModuleVerdict, Pipeline};
pub use rewriter::{AppliedRewrite, Rewriter, RewrittenModule};
pub use scanner::{RefSite, RefStatus, ScanResult, ScannedReference, Scanner};
