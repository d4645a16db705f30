//! Backing API adapters for the ILM platform.
//!
//! Both adapters implement `RemoteDirectory` and `RemoteWorkflowStore`:
//! - `HttpRemote` talks JSON over HTTP to the deployed API
//! - `InMemoryRemote` keeps everything in process, for local runs and tests

mod dto;
pub mod http;
pub mod memory;

pub use http::HttpRemote;
pub use memory::InMemoryRemote;
