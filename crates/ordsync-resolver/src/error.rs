use thiserror::Error;

/// Fatal errors raised while building the catalog index.
///
/// Any of these aborts the run before grouping starts; the resolver never
/// matches against a partially loaded catalog.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    /// The backing store could not be read.
    #[error("catalog store unreachable: {0}")]
    Unreachable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("catalog table {0} is empty")]
    Empty(&'static str),

    #[error("packaging {packaging_id} belongs to both product {first} and product {second}")]
    ConflictingPackaging {
        packaging_id: String,
        first: i64,
        second: i64,
    },

    /// A BOM edge names a parent packaging the packaging table does not know.
    #[error("BOM parent packaging {0} is not in the packaging table")]
    DanglingParent(String),
}
