pub mod metrics;
pub mod providers;

pub use providers::{ImageProvider, InpaintInput, ProviderError};
