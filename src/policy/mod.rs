pub mod engine;
pub mod rules;
pub mod types;
pub mod web;

pub use engine::{chat_dependency, evaluate};
pub use types::{AccessRequest, Collection, Decision, Identity, Lookups, Operation, Snapshot};
