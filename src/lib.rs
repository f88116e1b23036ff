// promptforge — Model-targeted prompt assembly for code-generation agents
// License: Apache-2.0

pub mod artifact;
pub mod assembler;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod judge;
pub mod keywords;
pub mod logger;
pub mod optimizer;
pub mod pipeline;
pub mod profile;
pub mod provider;
pub mod selection;
pub mod selector;
pub mod store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
