//! Rich diagnostic error types for the cinegraph engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. Domain outcomes such as
//! "no answer" or a worker being filtered out are *not* errors; only I/O, parse,
//! and configuration failures end up here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the cinegraph engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Crowd(#[from] CrowdError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("failed to read graph file {path}")]
    #[diagnostic(
        code(cine::graph::io),
        help("Check that the graph file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported RDF format for {path}")]
    #[diagnostic(
        code(cine::graph::format),
        help("Use a Turtle (.ttl) or N-Triples (.nt) file, or pass the format explicitly.")
    )]
    UnsupportedFormat { path: String },

    #[error("RDF parse error: {message}")]
    #[diagnostic(
        code(cine::graph::parse),
        help(
            "The graph file could not be parsed. Make sure its extension matches \
             its serialization (Turtle vs N-Triples)."
        )
    )]
    Parse { message: String },

    #[error("RDF serialization error: {message}")]
    #[diagnostic(
        code(cine::graph::serialize),
        help("A term in the graph could not be written as RDF. Check IRIs and language tags.")
    )]
    Serialize { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),
}

// ---------------------------------------------------------------------------
// Embedding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EmbeddingError {
    #[error("failed to read embedding file {path}")]
    #[diagnostic(
        code(cine::embedding::io),
        help("Check that the embedding file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid .npy file {path}: {message}")]
    #[diagnostic(
        code(cine::embedding::npy),
        help(
            "Embedding matrices must be 2-D, C-ordered, little-endian float32 or \
             float64 arrays saved with numpy.save."
        )
    )]
    InvalidNpy { path: String, message: String },

    #[error("invalid id file {path}: {message}")]
    #[diagnostic(
        code(cine::embedding::ids),
        help("Id files are tab-separated `index<TAB>uri` rows with no header.")
    )]
    InvalidIds { path: String, message: String },

    #[error("id file maps {ids} entries but the matrix has {rows} rows")]
    #[diagnostic(
        code(cine::embedding::row_mismatch),
        help("The id file and the vector matrix must come from the same training run.")
    )]
    RowMismatch { ids: usize, rows: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(cine::embedding::dim_mismatch),
        help(
            "Entity vectors and relation vectors must share the same dimension \
             for translational scoring."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// Crowd errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CrowdError {
    #[error("failed to read crowd data {path}")]
    #[diagnostic(
        code(cine::crowd::io),
        help("Check that the crowd data file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed crowd record in {path}: {message}")]
    #[diagnostic(
        code(cine::crowd::record),
        help(
            "Crowd data must be tab-separated with the columns HITId, HITTypeId, \
             WorkerId, WorkTimeInSeconds, LifetimeApprovalRate, Input1ID, Input2ID, \
             Input3ID, AnswerID, FixPosition, FixValue."
        )
    )]
    Record { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(cine::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(cine::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(cine::config::invalid), help("{message}"))]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}")]
    #[diagnostic(
        code(cine::store::io),
        help(
            "A filesystem operation failed. Check that the output directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error on {path}: {message}")]
    #[diagnostic(
        code(cine::store::serde),
        help(
            "Failed to serialize or deserialize a build artifact. Re-run \
             `cinegraph build` to regenerate the artifacts."
        )
    )]
    Serialization { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Symbol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SymbolError {
    #[error("symbol allocator exhausted: cannot allocate more than u64::MAX symbols")]
    #[diagnostic(
        code(cine::symbol::exhausted),
        help(
            "The term ID space is exhausted. This requires 2^64 interned terms; \
             check for a loop that interns fresh terms."
        )
    )]
    AllocatorExhausted,
}

/// Convenience alias for functions returning cinegraph results.
pub type CineResult<T> = std::result::Result<T, CineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_cine_error() {
        let err: CineError = GraphError::Parse {
            message: "bad token".into(),
        }
        .into();
        assert!(matches!(err, CineError::Graph(_)));
        assert!(err.to_string().contains("bad token"));
    }

    #[test]
    fn symbol_error_nests_through_graph_error() {
        let err: GraphError = SymbolError::AllocatorExhausted.into();
        let err: CineError = err.into();
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn diagnostic_codes_are_namespaced() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        let code = err.code().map(|c| c.to_string()).unwrap_or_default();
        assert_eq!(code, "cine::embedding::dim_mismatch");
    }
}
