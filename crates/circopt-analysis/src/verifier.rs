//! The verification oracle consumed by every analysis.
//!
//! A [`Verifier`] turns a parameter set into a pass/fail answer, usually by
//! running a full transient simulation and comparing it against reference
//! data. Verifiers are expensive and hold simulator state that cannot be
//! shared between workers, so analyses never receive a live verifier for
//! parallel work. They receive a [`VerifierFactory`] instead, which carries
//! only configuration, and every worker builds its own verifier from it.

use std::fmt;

use crate::parameters::ParameterSet;

/// Opaque failure raised by a verifier.
///
/// Analyses never interpret this error, they only propagate it.
pub struct VerifierError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl VerifierError {
    /// Wrap any error raised by a verifier implementation.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// Create an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }

    /// Attempt to recover the concrete error type raised by the verifier.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for VerifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Boolean pass/fail oracle over a parameter set.
///
/// Implementations must behave deterministically: the same parameters always
/// yield the same answer.
pub trait Verifier: Send {
    /// Returns `Ok(true)` when the circuit passes with these parameters.
    fn verify(&mut self, parameters: &ParameterSet) -> Result<bool, VerifierError>;
}

/// Builds verifiers from configuration, once per worker.
pub trait VerifierFactory: Sync {
    type Verifier: Verifier;

    /// Construct a fresh, independent verifier.
    fn create(&self) -> Result<Self::Verifier, VerifierError>;
}
