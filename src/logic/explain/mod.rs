//! Explain Module - why the model decided what it decided
//!
//! Attribution scores, the LLM narrative, the mock fallback, and the
//! assembler that chooses between them.

pub mod types;
pub mod attribution;
pub mod narrative;
pub mod fallback;
pub mod assembler;

pub use types::{AttributionScore, Explanation, ExplanationPath};
pub use attribution::{Attributor, AttributionError, SamplingShapley, ShapleySettings, ADDITIVITY_TOLERANCE};
pub use narrative::{NarrativeGenerator, NarrativeSettings, FALLBACK_NARRATIVE};
pub use fallback::mock_explanation;
pub use assembler::ExplanationAssembler;
