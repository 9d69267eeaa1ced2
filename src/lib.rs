// Public API for integration tests and potential library usage

pub mod admission;
pub mod api;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod relay;
pub mod state;
pub mod token;
pub mod twiml;
pub mod types;
pub mod voice;
