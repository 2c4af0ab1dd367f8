#![forbid(unsafe_code)]

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::FutureExt;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::llm::{CompletionRequest, TextGenerator};
use crate::utils::config::AiConfig;
use crate::utils::fallback::FallbackTable;
use crate::utils::haiku_types::{GeneratedHaiku, HaikuLines, HaikuSource, HAIKU_LINES};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Instructions sent with every generation request.
pub const HAIKU_SYSTEM_PROMPT: &str = "你是一个专业的俳句创作大师。请根据用户提供的主题，创作一首符合5-7-5音节结构的中文俳句。

要求：
1. 严格遵循5-7-5音节结构（第一句5个音节，第二句7个音节，第三句5个音节）
2. 体现季节感或自然意象
3. 意境优美，富有诗意
4. 语言简洁，意蕴深远
5. 体现禅意和静谧感

请只返回三行俳句，不要添加任何解释或额外内容。
格式示例：
樱花飞舞时
温暖春风轻抚面
新绿满枝头";

// ***************************************************************************
//                               HaikuService
// ***************************************************************************
/** Produces a poem for every theme.  The upstream generator is tried first
 * and any failure there falls through to the static table; if even that
 * fails, including by panic, the hard-coded error poem is returned.
 */
pub struct HaikuService {
    generator: Option<Arc<dyn TextGenerator>>,
    table: FallbackTable,
    rng: Mutex<StdRng>,
    temperature: f32,
    max_tokens: u32,
}

impl HaikuService {
    /// Create a service.  Without a generator every request uses the table.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, ai: &AiConfig) -> Self {
        Self {
            generator,
            table: FallbackTable::shared(),
            rng: Mutex::new(StdRng::from_entropy()),
            temperature: ai.temperature,
            max_tokens: ai.max_tokens,
        }
    }

    /// Replace the fallback table.
    pub fn with_table(mut self, table: FallbackTable) -> Self {
        self.table = table;
        self
    }

    /// Replace the variant selection rng, typically with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    // ---------------------------------------------------------------------------
    // generate:
    // ---------------------------------------------------------------------------
    /** Always returns three lines with their provenance.  The theme is expected
     * to be validated (non-blank) by the caller.
     */
    pub async fn generate(&self, theme: &str) -> GeneratedHaiku {
        match AssertUnwindSafe(self.try_generate(theme)).catch_unwind().await {
            Ok(Ok(haiku)) => haiku,
            Ok(Err(e)) => {
                error!("Haiku generation failed for theme '{}', returning error poem: {}", theme, e);
                GeneratedHaiku::error_fallback()
            }
            Err(_) => {
                error!("Haiku generation panicked for theme '{}', returning error poem.", theme);
                GeneratedHaiku::error_fallback()
            }
        }
    }

    async fn try_generate(&self, theme: &str) -> Result<GeneratedHaiku> {
        if let Some(lines) = self.generate_with_ai(theme).await {
            info!("AI generated haiku for theme: {}", theme);
            return Ok(GeneratedHaiku::new(lines, theme, HaikuSource::Ai));
        }

        info!("Using fallback haiku for theme: {}", theme);
        let lines = self.fallback_lines(theme)?;
        Ok(GeneratedHaiku::new(lines, theme, HaikuSource::Fallback))
    }

    // ---------------------------------------------------------------------------
    // generate_with_ai:
    // ---------------------------------------------------------------------------
    /** One upstream attempt.  Errors and unusable responses are logged and
     * reported as None, never propagated.
     */
    async fn generate_with_ai(&self, theme: &str) -> Option<HaikuLines> {
        let generator = self.generator.as_ref()?;
        let request = build_request(theme, self.temperature, self.max_tokens);
        match generator.complete(request).await {
            Ok(text) => {
                let lines = extract_poem_lines(&text);
                if lines.is_none() {
                    warn!("AI response for theme '{}' had fewer than {} lines: {:?}", theme, HAIKU_LINES, text);
                }
                lines
            }
            Err(e) => {
                warn!("AI service unavailable ({}), using fallback: {}", e.kind(), e);
                None
            }
        }
    }

    fn fallback_lines(&self, theme: &str) -> Result<HaikuLines> {
        // A poisoned lock only means another request panicked mid-choice.
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        self.table.select(theme, &mut *rng)
    }
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_request:
// ---------------------------------------------------------------------------
pub fn build_request(theme: &str, temperature: f32, max_tokens: u32) -> CompletionRequest {
    CompletionRequest {
        system_prompt: HAIKU_SYSTEM_PROMPT.to_string(),
        user_message: format!("请以\"{}\"为主题创作一首俳句", theme),
        temperature,
        max_tokens,
    }
}

// ---------------------------------------------------------------------------
// extract_poem_lines:
// ---------------------------------------------------------------------------
/** Keep the first three non-blank lines, trimmed.  None when there are fewer
 * than three.
 */
pub fn extract_poem_lines(text: &str) -> Option<HaikuLines> {
    let mut lines = text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty());
    Some([
        lines.next()?.to_string(),
        lines.next()?.to_string(),
        lines.next()?.to_string(),
    ])
}
