pub mod assets;
pub mod harness;
pub mod reports;
pub mod seeds;
pub mod sessions;
pub mod tester;

pub use assets::TesterAssets;
pub use harness::{ScenarioRun, TesterStore};
pub use seeds::resolve_seed_inputs;
pub use sessions::LoggingSessionStore;
pub use tester::*;
