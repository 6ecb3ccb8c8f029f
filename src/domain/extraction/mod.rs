//! Extraction module
//!
//! Schema normalization, selector generalization and the extraction executor.

mod extractor;
mod generalizer;
mod schema;

pub use extractor::ExtractionExecutor;
pub use generalizer::{candidates, generalize, Generalization};
pub use schema::{
    normalize, CanonicalSchema, FieldKind, FieldSpec, RawField, RawSchema, RawSelectorEntry,
    Transform,
};
