//! Poem sources for a terminal session

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use serde::Serialize;

use super::state::SessionError;
use crate::utils::fallback::FallbackTable;
use crate::utils::haiku_types::{GeneratedHaiku, HaikuLines};

/// Produces the three lines for a theme on behalf of a session.
#[async_trait]
pub trait HaikuGenerator: Send + Sync {
    async fn generate(&self, theme: &str) -> Result<HaikuLines, SessionError>;

    /// Short description shown when the session starts
    fn describe(&self) -> String;
}

// ***************************************************************************
//                              LocalGenerator
// ***************************************************************************
/// Simulates the AI service offline: waits a fixed delay, then picks from the
/// shared fallback table.
pub struct LocalGenerator {
    delay: Duration,
    table: FallbackTable,
    rng: Mutex<StdRng>,
}

impl LocalGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            table: FallbackTable::shared(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }
}

#[async_trait]
impl HaikuGenerator for LocalGenerator {
    async fn generate(&self, theme: &str) -> Result<HaikuLines, SessionError> {
        debug!("LocalGenerator::generate: theme={} delay={:?}", theme, self.delay);
        tokio::time::sleep(self.delay).await;
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        self.table
            .select(theme, &mut *rng)
            .map_err(|e| SessionError::Generation(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("local simulation ({} ms delay)", self.delay.as_millis())
    }
}

// ***************************************************************************
//                              RemoteGenerator
// ***************************************************************************
#[derive(Serialize)]
struct GenerateHaikuBody<'a> {
    theme: &'a str,
}

/// Calls a running server's generate-haiku endpoint.
pub struct RemoteGenerator {
    url: String,
    http: Client,
}

impl RemoteGenerator {
    pub fn new(url: &str) -> Result<Self, SessionError> {
        let http = Client::builder()
            .build()
            .map_err(|e| SessionError::Generation(format!("Unable to build HTTP client: {}", e)))?;
        Ok(Self {url: url.to_string(), http})
    }
}

#[async_trait]
impl HaikuGenerator for RemoteGenerator {
    async fn generate(&self, theme: &str) -> Result<HaikuLines, SessionError> {
        debug!("RemoteGenerator::generate: url={} theme={}", self.url, theme);
        let response = self.http
            .post(&self.url)
            .json(&GenerateHaikuBody {theme})
            .send()
            .await
            .map_err(|e| SessionError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SessionError::Generation(format!("server returned {}: {}", status, text)));
        }

        let haiku: GeneratedHaiku = response
            .json()
            .await
            .map_err(|e| SessionError::Generation(e.to_string()))?;
        info!("Remote haiku for theme '{}' came from source: {}", theme, haiku.source.as_str());
        haiku.to_lines()
            .ok_or_else(|| SessionError::Generation("server returned a malformed haiku".to_string()))
    }

    fn describe(&self) -> String {
        format!("haiku server at {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_generator_uses_shared_table() {
        let generator = LocalGenerator::new(Duration::ZERO).with_rng(StdRng::seed_from_u64(5));
        let lines = generator.generate("宇宙").await.unwrap();
        assert_eq!(lines, ["静夜思绪飞", "月光洒满窗台上", "诗意自心来"].map(String::from));

        let lines = generator.generate("月亮").await.unwrap();
        assert_eq!(lines[0], "皎月当空照");
    }

    #[tokio::test]
    async fn local_generator_waits() {
        let generator = LocalGenerator::new(Duration::from_millis(30));
        let start = std::time::Instant::now();
        generator.generate("茶").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(generator.describe().contains("30 ms"));
    }

    #[tokio::test]
    async fn unreachable_server_is_generation_error() {
        let generator = RemoteGenerator::new("http://127.0.0.1:1/api/generate-haiku").unwrap();
        let err = generator.generate("茶").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
    }
}
