pub mod config;
pub mod errors;
pub mod fallback;
pub mod haiku_types;
pub mod haiku_utils;
