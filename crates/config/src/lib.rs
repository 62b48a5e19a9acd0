//! Configuration loading and path resolution for skillery.
//!
//! Config files: `skillery.toml`, `skillery.yaml`, or `skillery.json`
//! Searched in `./` then `~/.config/skillery/`.

pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_data_dir, config_dir, data_dir, discover_and_load, find_or_default_config_path,
        load_config, render_config, save_config, set_data_dir,
    },
    schema::{AggregatorConfig, InstallConfig, SkilleryConfig},
};
