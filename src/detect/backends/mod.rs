pub mod scripted;
pub mod stub;

pub use scripted::{SceneStep, ScriptedBackend};
pub use stub::StubBackend;
