pub mod generation;

pub use generation::{FormValue, GenerationForm, GenerationRequest, ImageUpload};
