//! Per-module pipeline and batch driver
//!
//! One module goes through scan -> match -> rewrite -> validate with no
//! interleaving of phases. The shared lookup structures are immutable, so
//! callers may process different modules from different threads; a module's
//! scan result and intermediate image are exclusively owned here and
//! discarded once the verdict is produced. There is no retry path.

use crate::rewriter::{Rewriter, RewrittenModule};
use crate::scanner::Scanner;
use modbridge_core::report::{ModuleOutcome, ModuleRejection, RejectionKind};
use modbridge_image::{fingerprint, read_image};
use modbridge_rules::CompiledRuleset;

/// Outcome for one module: load it, or show the user why not
#[derive(Debug)]
pub enum ModuleVerdict {
    /// Rewritten and validated; hand the bytes to the loader
    Ready(RewrittenModule),

    /// Not loadable; the rejection is directly displayable
    Rejected(ModuleRejection),
}

impl ModuleVerdict {
    /// Whether the module is load-ready
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The rejection, if any
    pub fn rejection(&self) -> Option<&ModuleRejection> {
        match self {
            Self::Ready(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }

    /// Per-module report entry
    pub fn outcome(&self) -> ModuleOutcome {
        match self {
            Self::Ready(module) => ModuleOutcome {
                module: module.image.name.clone(),
                fingerprint: Some(module.fingerprint.clone()),
                rewrites_applied: module.applied.len(),
                rejection: None,
            },
            Self::Rejected(rejection) => ModuleOutcome {
                module: rejection.module.clone(),
                fingerprint: rejection.fingerprint.clone(),
                rewrites_applied: 0,
                rejection: Some(rejection.clone()),
            },
        }
    }
}

/// The per-run pipeline over one compiled ruleset
pub struct Pipeline<'a> {
    ruleset: &'a CompiledRuleset,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline over a compiled ruleset
    pub fn new(ruleset: &'a CompiledRuleset) -> Self {
        Self { ruleset }
    }

    /// Process one module from raw bytes.
    ///
    /// `label` names the module in rejections when the image is too broken
    /// to carry its own name (typically the file path).
    pub fn process(&self, label: &str, bytes: &[u8]) -> ModuleVerdict {
        let fp = fingerprint(bytes);
        let host_version = self.ruleset.host.version;

        let image = match read_image(bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!(module = label, error = %e, "module image failed to decode");
                return ModuleVerdict::Rejected(
                    ModuleRejection::new(label, RejectionKind::Malformed)
                        .with_detail(e.to_string())
                        .with_fingerprint(fp),
                );
            }
        };

        if !image.host_range.contains(&host_version) {
            tracing::debug!(
                module = %image.name,
                declared = %image.host_range,
                host = %host_version,
                "module declares a different host range; rewriting anyway"
            );
        }

        let scanner = Scanner::new(
            &self.ruleset.registry,
            &self.ruleset.facades,
            &self.ruleset.api,
            host_version,
        );
        let scan = match scanner.scan(&image) {
            Ok(scan) => scan,
            Err(e) => {
                // Parsed framing but dangling internals: still corruption.
                return ModuleVerdict::Rejected(
                    ModuleRejection::new(&image.name, RejectionKind::Malformed)
                        .with_detail(e.to_string())
                        .with_fingerprint(fp),
                );
            }
        };

        let rewriter = Rewriter::new(
            &self.ruleset.registry,
            &self.ruleset.facades,
            &self.ruleset.api,
            host_version,
        );
        match rewriter.rewrite(image, &scan, fp) {
            Ok(module) => {
                tracing::debug!(
                    module = %module.image.name,
                    rewrites = module.applied.len(),
                    "module is load-ready"
                );
                ModuleVerdict::Ready(module)
            }
            Err(rejection) => ModuleVerdict::Rejected(rejection),
        }
    }

    /// Process a batch of modules. A rejection never aborts the batch.
    pub fn process_batch<'b>(
        &self,
        modules: impl IntoIterator<Item = (&'b str, &'b [u8])>,
    ) -> Vec<ModuleVerdict> {
        modules
            .into_iter()
            .map(|(label, bytes)| self.process(label, bytes))
            .collect()
    }
}
