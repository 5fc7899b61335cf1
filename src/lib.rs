//! typegate - access-control gatekeeper for the TypeTalk document store.
//!
//! The core is a pure authorization policy engine: given a document
//! operation, the requester's identity, and the existing/proposed document
//! snapshots, it returns Allow or Deny. The crate also carries the email
//! migration job and a small HTTP surface for exercising the engine
//! end-to-end.

pub mod errors;
pub mod migrate;
pub mod policy;
pub mod settings;
pub mod store;
