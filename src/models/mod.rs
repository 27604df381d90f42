pub mod filter;
pub mod recommendation;

pub use filter::{FilterError, FilterField, FilterRequest, FilterSet};
pub use recommendation::{Recommendation, RecommendationRow};
