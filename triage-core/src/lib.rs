//! The consultation pipeline.
//!
//! - [`validate`]: raw input to [`SymptomText`]
//! - [`request`]: bounded retries around the model call
//! - [`normalize`]: raw model output to [`Recommendation`]
//! - [`fallback`]: deterministic recommendation when the above fail
//! - [`consult`]: the four wired together around an `LlmClient`

pub mod consult;
pub mod fallback;
pub mod normalize;
pub mod request;
pub mod validate;

pub use consult::{Consultant, Consultation, FallbackReason, Interrupted, Origin};
pub use normalize::{NormalizationError, Recommendation, Urgency};
pub use request::{RequestError, Requester, RetryPolicy, RetryRecord};
pub use validate::{SymptomText, ValidationError};
