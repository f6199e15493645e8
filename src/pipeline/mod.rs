mod events;
mod generation;

pub use events::GenerationEvent;
pub use generation::{build_prompt, GenerationPipeline, GenerationRequest, MAX_RETRIES};
