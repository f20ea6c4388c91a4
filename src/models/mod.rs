pub mod media;

pub use vibe_core::models::job;
pub use vibe_core::models::settings;
