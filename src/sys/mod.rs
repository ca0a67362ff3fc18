pub mod avatar;
pub mod dialogue;
pub mod pronounce;
pub mod session;
pub mod transcript;

pub use dialogue::TypingOptions;
pub use session::{Coordinator, Phase, Talkers};
