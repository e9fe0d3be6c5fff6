//! Rating source boundary: lookup adapters and the pacing governor that wraps them.

pub mod adapter;
pub mod governor;
pub mod http;

pub use adapter::{LookupError, RatingResult, SourceAdapter};
pub use governor::{DelayBand, Governor, PacingConfig, PacingError, draw_delay};
pub use http::HttpLookupSource;
