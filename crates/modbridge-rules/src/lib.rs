//! Modbridge Rules
//!
//! The versioned rewrite-rule registry, the facade provider, and the host
//! API surface table, plus the loader that builds all three from a single
//! ruleset document. Everything here is constructed once at startup and
//! read-only afterwards; lookups never lock.

pub mod facade;
pub mod host_api;
pub mod registry;
pub mod ruleset;

pub use facade::{FacadeDescriptor, FacadeError, FacadeId, FacadeProvider, FacadeShim, ForwardingEntry, HostBinding};
pub use host_api::{ApiMember, HostApiTable};
pub use registry::{FieldGuidance, GuidanceKind, RewriteAction, RewriteRule, RuleRegistry, SymbolPattern};
pub use ruleset::{ApiTypeEntry, CompiledRuleset, HostInfo, Ruleset, RulesetError};
