pub mod gemini;
pub mod registry;
pub mod traits;

pub use registry::create_provider;
pub use traits::ModelProvider;
