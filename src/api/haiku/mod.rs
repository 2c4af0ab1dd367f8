pub mod generate_haiku;
pub mod haiku_service;
pub mod version;
