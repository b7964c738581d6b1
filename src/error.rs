//! # Error Module
//!
//! Error taxonomy for the identification pipeline. Validation failures are
//! rejected before any store interaction; store failures abort the
//! submission with whatever already committed left in place.

use thiserror::Error;

/// Errors surfaced by [`crate::Revisit::identify`].
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The submission carried no non-behavioral signal groups at all.
    #[error("submission carries no usable signal groups")]
    NoUsableSignals,

    /// None of the core signal groups (canvas, audio) were present.
    #[error("submission is missing a core signal group (canvas or audio)")]
    MissingRequiredGroup,

    /// A store operation failed. The fingerprint upsert is always issued
    /// before the association write, so a failure here can leave an
    /// orphaned fingerprint record; it is valid, inert, and picked up by a
    /// later submission.
    #[error("store operation failed")]
    Store(#[source] anyhow::Error),
}
