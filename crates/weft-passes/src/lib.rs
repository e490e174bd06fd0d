//! weft middle-end passes: the generic traversal engine and the fixup pass.
//!
//! Every pass shares one walking algorithm and declares only the hooks it
//! needs. Fixup is the first pass to ride on it: it normalizes the tree
//! into the shape later stages expect and verifies the structural
//! invariants those stages rely on.
//!
//! # Architecture
//!
//! - [`traverse`]: the [`Visitor`] hook set and the [`Traversal`] walker
//! - [`fixup`]: the enclosing-statement context, [`Normalizer`] and [`Verifier`]
//! - [`diagnostics`]: user-level violations and their ariadne/JSON rendering
//! - [`error`]: fatal internal errors (cycles, stack imbalance, ...)

pub mod diagnostics;
pub mod error;
pub mod fixup;
pub mod traverse;

pub use diagnostics::{render_diagnostic, Diagnostic, DiagnosticKind, DiagnosticOptions};
pub use error::{InternalError, InternalErrorKind, TraversalStep};
pub use fixup::{
    normalize, run, verify, EnclosingStack, FixupContext, FixupReport, NormalizeReport,
    NormalizeRules, Normalizer, VerifyChecks, VerifyReport, Verifier,
};
pub use traverse::{HookResult, Traversal, TraversalStats, Visitor};
