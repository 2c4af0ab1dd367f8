//! Terminal haiku session
//!
//! Theme entry, generation, editing and history browsing for one user.  The
//! session generates locally unless a server URL is configured, in which
//! case it calls that server's generate-haiku endpoint.

mod generator;
mod repl;
mod state;

pub use generator::HaikuGenerator;
pub use repl::SessionRepl;

use generator::{LocalGenerator, RemoteGenerator};

use std::time::Duration;

use anyhow::Result;
use log::info;

use crate::utils::config::SessionConfig;

/// Choose the generator: the command line URL wins over the configured one.
pub fn make_generator(config: &SessionConfig, server_url: Option<&str>) -> Result<Box<dyn HaikuGenerator>> {
    let url = server_url.or(config.server_url.as_deref());
    let generator: Box<dyn HaikuGenerator> = match url {
        Some(url) => Box::new(RemoteGenerator::new(url)?),
        None => Box::new(LocalGenerator::new(Duration::from_millis(config.simulated_delay_ms))),
    };
    info!("Session generator: {}", generator.describe());
    Ok(generator)
}

/// Run an interactive session until the user quits.
pub async fn run_session(config: &SessionConfig, server_url: Option<&str>) -> Result<()> {
    let generator = make_generator(config, server_url)?;
    SessionRepl::new(generator).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_choice() {
        let config = SessionConfig::default();
        let g = make_generator(&config, None).unwrap();
        assert!(g.describe().starts_with("local"));

        let g = make_generator(&config, Some("http://localhost:3000/api/generate-haiku")).unwrap();
        assert!(g.describe().contains("http://localhost:3000/api/generate-haiku"));

        let config = SessionConfig {
            server_url: Some("http://configured/api/generate-haiku".to_string()),
            ..SessionConfig::default()
        };
        let g = make_generator(&config, None).unwrap();
        assert!(g.describe().contains("configured"));
        let g = make_generator(&config, Some("http://cli/api/generate-haiku")).unwrap();
        assert!(g.describe().contains("cli"));
    }
}
