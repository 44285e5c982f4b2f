//! Module finalization hook.
//!
//! Emitted module text passes through a [`ModuleFinalizer`] before hitting
//! disk. The built-in implementation is the identity; deployments may load a
//! post-processor that rewrites the text deterministically given the seed
//! and the current element id. The contract is strict: the function must be
//! pure in its inputs.

/// Kind of module being finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    ObjectModule,
    FormModule,
}

/// Deterministic post-processor applied to each emitted module.
pub trait ModuleFinalizer {
    /// Rewrite `body`. `seed` is the processor name (plus the form name for
    /// form modules); `current_id` is the allocator position after the form
    /// body. Must be a pure function of its inputs.
    fn finalize(&self, body: &str, seed: &str, current_id: u32, kind: ModuleKind) -> String;
}

/// The built-in finalizer: returns the body unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFinalizer;

impl ModuleFinalizer for IdentityFinalizer {
    fn finalize(&self, body: &str, _seed: &str, _current_id: u32, _kind: ModuleKind) -> String {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_finalizer_is_the_identity() {
        let body = "Procedure P()\nEndProcedure\n";
        let out = IdentityFinalizer.finalize(body, "Proc.Form", 42, ModuleKind::FormModule);
        assert_eq!(out, body);
    }
}
