//! Rich diagnostic error types for the noesis substrate.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so callers know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the noesis substrate.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum NoesisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ecan(#[from] EcanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pln(#[from] PlnError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scheduler(#[from] SchedulerError),
}

// ---------------------------------------------------------------------------
// Atom errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomError {
    #[error("unknown atom type tag: \"{tag}\"")]
    #[diagnostic(
        code(noesis::atom::unknown_type),
        help(
            "Atom types form a closed enumeration; the tag must match one of \
             the canonical node or link type strings, e.g. \"ConceptNode\" or \
             \"InheritanceLink\"."
        )
    )]
    UnknownType { tag: String },

    #[error("atom id allocator exhausted")]
    #[diagnostic(
        code(noesis::atom::exhausted),
        help(
            "The id space is exhausted. This requires 2^64 allocations and \
             should never happen in practice — check for an allocation loop."
        )
    )]
    AllocatorExhausted,
}

// ---------------------------------------------------------------------------
// Space errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SpaceError {
    #[error("\"{tag}\" is a link type, but a node was requested")]
    #[diagnostic(
        code(noesis::space::not_a_node_type),
        help("Use `add_link` for link types; `add_node` accepts node types only.")
    )]
    NotANodeType { tag: String },

    #[error("\"{tag}\" is a node type, but a link was requested")]
    #[diagnostic(
        code(noesis::space::not_a_link_type),
        help("Use `add_node` for node types; `add_link` accepts link types only.")
    )]
    NotALinkType { tag: String },

    #[error("link of type \"{tag}\" has an empty outgoing sequence")]
    #[diagnostic(
        code(noesis::space::empty_outgoing),
        help("Every link must reference at least one atom (arity >= 1).")
    )]
    EmptyOutgoing { tag: String },

    #[error("outgoing sequence references unknown atom id {id}")]
    #[diagnostic(
        code(noesis::space::unknown_reference),
        help(
            "Every atom referenced by a link's outgoing sequence must already \
             be in the space. Add the referenced atom first."
        )
    )]
    UnknownReference { id: u64 },

    #[error("atom not found: id {id}")]
    #[diagnostic(
        code(noesis::space::not_found),
        help("No atom exists with this id. It may have been removed or forgotten.")
    )]
    NotFound { id: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),
}

// ---------------------------------------------------------------------------
// ECAN errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EcanError {
    #[error("stimulate target not found: id {id}")]
    #[diagnostic(
        code(noesis::ecan::target_not_found),
        help("The atom may have been forgotten by a previous cycle; re-add it first.")
    )]
    TargetNotFound { id: u64 },

    #[error("hebbian endpoint not found: id {id}")]
    #[diagnostic(
        code(noesis::ecan::endpoint_not_found),
        help("Both endpoints of a hebbian link must be live atoms in the space.")
    )]
    EndpointNotFound { id: u64 },

    #[error("invalid ECAN configuration: {message}")]
    #[diagnostic(
        code(noesis::ecan::invalid_config),
        help("Rates must lie in [0, 1] and max_sti must exceed min_sti.")
    )]
    InvalidConfig { message: String },
}

// ---------------------------------------------------------------------------
// PLN errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PlnError {
    #[error("revision target not found: id {id}")]
    #[diagnostic(
        code(noesis::pln::target_not_found),
        help("Revision merges a truth value into an existing atom; the id must be live.")
    )]
    TargetNotFound { id: u64 },

    #[error("invalid PLN configuration: {message}")]
    #[diagnostic(
        code(noesis::pln::invalid_config),
        help("Thresholds and default truth components must lie in [0, 1].")
    )]
    InvalidConfig { message: String },
}

// ---------------------------------------------------------------------------
// Scheduler errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error("plugin not found: \"{plugin_id}\"")]
    #[diagnostic(
        code(noesis::scheduler::plugin_not_found),
        help("Register the plugin before enqueueing jobs against it.")
    )]
    PluginNotFound { plugin_id: String },

    #[error("plugin \"{plugin_id}\" is disabled")]
    #[diagnostic(
        code(noesis::scheduler::plugin_disabled),
        help("Re-enable the plugin with `set_plugin_enabled` before scheduling it.")
    )]
    PluginDisabled { plugin_id: String },

    #[error("job queue is full ({capacity} jobs)")]
    #[diagnostic(
        code(noesis::scheduler::queue_full),
        help(
            "The bounded queue is at capacity. Wait for running jobs to drain, \
             or raise `max_queue_size` in the scheduler configuration."
        )
    )]
    QueueFull { capacity: usize },

    #[error("job not found: id {job_id}")]
    #[diagnostic(
        code(noesis::scheduler::job_not_found),
        help("No job with this id was ever enqueued on this scheduler instance.")
    )]
    JobNotFound { job_id: u64 },
}

/// Error raised inside a plugin body; captured into the job record.
#[derive(Debug, Error, Diagnostic)]
pub enum PluginError {
    #[error("missing required parameter: \"{name}\"")]
    #[diagnostic(
        code(noesis::plugin::missing_parameter),
        help("Supply the parameter in the job's `parameters` object.")
    )]
    MissingParameter { name: String },

    #[error("invalid parameter \"{name}\": {message}")]
    #[diagnostic(
        code(noesis::plugin::invalid_parameter),
        help("Check the parameter's type and range against the plugin's contract.")
    )]
    InvalidParameter { name: String, message: String },

    #[error("plugin internal error: {message}")]
    #[diagnostic(code(noesis::plugin::internal))]
    Internal { message: String },
}

impl From<NoesisError> for PluginError {
    fn from(err: NoesisError) -> Self {
        PluginError::Internal {
            message: err.to_string(),
        }
    }
}

/// Convenience alias for functions returning noesis results.
pub type NoesisResult<T> = std::result::Result<T, NoesisError>;

/// Result type for space operations.
pub type SpaceResult<T> = std::result::Result<T, SpaceError>;

/// Result type for plugin bodies.
pub type PluginResult<T> = std::result::Result<T, PluginError>;
