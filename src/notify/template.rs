//! Push message rendering.

use std::fmt;

use handlebars::Handlebars;
use serde::Serialize;

use crate::source::{BattleRecord, EntityId};

use super::TemplateError;

/// Default push message.
pub const DEFAULT_TEMPLATE: &str = "\
🎮 【新战绩推送】

结果: {{result}}
英雄: {{hero}}
KDA: {{kda}}
地图: {{map}}
评分: {{score}}
时间: {{time}}";

const TEMPLATE_NAME: &str = "message";
const UNKNOWN: &str = "未知";

/// A compiled Handlebars template for push messages.
///
/// # Template Variables
///
/// - `entity`: camp id the record belongs to
/// - `result`: `✅ 胜利` or `❌ 失败`
/// - `win`: boolean win flag
/// - `hero`, `map`: names (`未知` when missing)
/// - `kills`, `deaths`, `assists`, `kda` (`k/d/a`)
/// - `score`, `time`: as reported by the API
///
/// Output is plain text; no HTML escaping is applied.
pub struct MessageTemplate {
    source: String,
    registry: Handlebars<'static>,
}

impl MessageTemplate {
    /// Compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the template syntax is invalid.
    pub fn new(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, &source)
            .map_err(|e| TemplateError(e.to_string()))?;
        Ok(Self { source, registry })
    }

    /// Returns the template source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the push message for `record`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if rendering fails.
    pub fn render(&self, entity: &EntityId, record: &BattleRecord) -> Result<String, TemplateError> {
        self.registry
            .render(TEMPLATE_NAME, &MessageData::new(entity, record))
            .map_err(|e| TemplateError(e.to_string()))
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        // Cannot fail for the built-in template.
        if let Err(e) = registry.register_template_string(TEMPLATE_NAME, DEFAULT_TEMPLATE) {
            tracing::error!("Default message template failed to compile: {e}");
        }
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            registry,
        }
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageTemplate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct MessageData<'a> {
    entity: &'a str,
    result: &'static str,
    win: bool,
    hero: &'a str,
    map: &'a str,
    kills: u32,
    deaths: u32,
    assists: u32,
    kda: String,
    score: &'a str,
    time: &'a str,
}

impl<'a> MessageData<'a> {
    fn new(entity: &'a EntityId, record: &'a BattleRecord) -> Self {
        Self {
            entity: entity.as_str(),
            result: if record.is_win { "✅ 胜利" } else { "❌ 失败" },
            win: record.is_win,
            hero: or_unknown(&record.hero_name),
            map: or_unknown(&record.map_name),
            kills: record.kill_num,
            deaths: record.dead_num,
            assists: record.assist_num,
            kda: record.kda(),
            score: if record.score.is_empty() { "0" } else { &record.score },
            time: &record.game_time,
        }
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { UNKNOWN } else { value }
}
