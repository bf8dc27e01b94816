//! Features Module - canonical voice measurement schema
//!
//! Layout (names, order) and validated input records.

pub mod layout;
pub mod record;

pub use layout::{Feature, FEATURE_COUNT, validate_layout, LayoutMismatchError};
pub use record::{FeatureRecord, RawRecord, SchemaError};
