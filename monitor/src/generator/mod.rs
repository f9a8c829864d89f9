pub mod playback;
pub mod profile;

pub use playback::ScriptedSource;
pub use profile::{build_chunk, ScenarioConfig, ScenarioKind};
