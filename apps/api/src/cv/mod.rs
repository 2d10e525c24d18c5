// CV handling shared by every handler: alias normalization, then PII-free rendering.

pub mod normalize;
pub mod sanitize;

pub use normalize::{normalize_cv, CanonicalCv};
pub use sanitize::{sanitize_cv, scrub_personal_data};
