//! Local skill management: SKILL.md parsing, skill.json manifests, version
//! constraints, validation, agent-aware installation, and instruction-file
//! export.

pub mod agents;
pub mod export;
pub mod install;
pub mod manifest;
pub mod parse;
pub mod registry;
pub mod validate;
pub mod version;
