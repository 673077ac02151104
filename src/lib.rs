pub mod analyzer;
pub mod config;
pub mod input;
pub mod models;
pub mod report;
pub mod stats;

/// Feature file extensions picked up when scanning directories
pub const FEATURE_EXTENSIONS: &[&str] = &["json"];

/// Application name for XDG paths
pub const APP_NAME: &str = "songform";
