//! Error taxonomy for the testbed resource model CORE.
//!
//! `SingleTestbedError` enumerates the policy-level error kinds from the
//! design (invalid typed-value kinds, malformed delegation annotations,
//! pool invariant violations, derivation preconditions, query misses, and
//! store-adapter failures). `TestbedModelError` wraps either a single
//! error or, for catalog's accumulate-and-continue mode, every error
//! found while walking a full ARM in one pass.

use std::fmt;

/// Create an internal error for a condition that validated input should
/// make unreachable.
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::TestbedModelError::internal(format!( $( $arg )+ ))
    }
}

/// Return an internal error from the current function.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ))
    }
}

/// Assert an invariant that should never fail once inputs are validated:
/// panics in debug builds, returns an internal error otherwise.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        if !$expr {
            #[cfg(debug_assertions)]
            panic!( $( $arg )+ );
            #[cfg(not(debug_assertions))]
            $crate::bail!( $( $arg )+ );
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SingleTestbedError {
    #[error("kind '{kind}' is not a recognized {category} kind")]
    InvalidKind { category: &'static str, kind: String },

    #[error("malformed typed value '{value}': expected '<kind>:<value>'")]
    Malformed { value: String },

    #[error("malformed delegation annotation on node '{node_id}': {reason}")]
    MalformedDelegation { node_id: String, reason: String },

    #[error(
        "pool '{pool_id}' is defined on both '{first_node}' and '{second_node}'"
    )]
    DuplicatePoolDefinition {
        pool_id: String,
        first_node: String,
        second_node: String,
    },

    #[error("pool '{pool_id}' is mentioned but never defined")]
    OrphanMention { pool_id: String },

    #[error("pool '{pool_id}' is malformed: {reason}")]
    MalformedPool { pool_id: String, reason: String },

    #[error("ARM graph '{graph_id}' has no vertices")]
    EmptyArm { graph_id: String },

    #[error("ARM graph '{graph_id}' has no delegations")]
    NoDelegations { graph_id: String },

    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error(
        "merging ADM '{adm_graph_id}' into the CBM conflicts on node '{node_id}' property '{property}': '{existing}' vs '{incoming}'"
    )]
    ConflictingMerge {
        adm_graph_id: String,
        node_id: String,
        property: String,
        existing: String,
        incoming: String,
    },

    #[error("graph store error: {message}")]
    Store { message: String },

    #[error("an internal error has occurred, please file a bug report.\n\nDetails: {message}")]
    Internal { message: String },
}

/// Top-level error type returned by every CORE operation.
///
/// Most operations abort on the first error via `Single`. `ArmCatalog::catalog`
/// uses `Many` to report every invariant violation found while walking one
/// ARM, so a caller can surface all issues from a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestbedModelError {
    Single(SingleTestbedError),
    Many(Vec<SingleTestbedError>),
}

impl TestbedModelError {
    pub(crate) fn internal(message: String) -> Self {
        Self::Single(SingleTestbedError::Internal { message })
    }

    /// All leaf errors carried by this value, in order.
    pub fn errors(&self) -> &[SingleTestbedError] {
        match self {
            Self::Single(e) => std::slice::from_ref(e),
            Self::Many(es) => es,
        }
    }
}

impl fmt::Display for TestbedModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(e) => write!(f, "{e}"),
            Self::Many(es) => {
                writeln!(f, "{} errors found while cataloguing the ARM:", es.len())?;
                for e in es {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for TestbedModelError {}

impl From<SingleTestbedError> for TestbedModelError {
    fn from(e: SingleTestbedError) -> Self {
        Self::Single(e)
    }
}

pub type Result<T> = std::result::Result<T, TestbedModelError>;
