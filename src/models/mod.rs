pub mod assembly;
pub mod registry;
pub mod voting;
