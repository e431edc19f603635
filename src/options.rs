//! Call-site configuration for the two CORE operations that have a real
//! choice to make about malformed input: how a GraphML loader spells
//! "this property is absent", and whether cataloguing an ARM aborts on
//! the first malformed pool or carries on without it.
//!
//! The CORE is a library, not a daemon, so there is no config file to
//! load — these are plain option structs passed by the caller, the way
//! the teacher passes a `SupergraphConfig` into composition rather than
//! reading one off disk itself.

/// Options for [`crate::graphml::read_graphml_with_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphMlLoadOptions {
    /// A `<data>` value equal to this string is treated as an absent
    /// property and dropped rather than stored. Defaults to
    /// [`crate::model::ABSENT_SENTINEL`], the same sentinel the store
    /// itself uses for "present but unset".
    pub sentinel: String,
}

impl Default for GraphMlLoadOptions {
    fn default() -> Self {
        Self {
            sentinel: crate::model::ABSENT_SENTINEL.to_owned(),
        }
    }
}

/// Options for [`crate::catalog::catalog_with_options`] and
/// [`crate::adm::generate_adms_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmGenerationOptions {
    /// `true` (the default): a malformed pool or delegation annotation
    /// anywhere in the ARM fails the whole catalog. `false`: the
    /// offending pool is dropped and cataloguing continues with a
    /// `tracing::warn!` recording what was dropped and why.
    pub strict: bool,
}

impl Default for AdmGenerationOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}
