//! Core types for camp accounts and battle records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a camp account whose battle history is polled.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Composite key identifying one battle record instance.
///
/// Neither the sequence number nor the game time is unique on its own,
/// so the fingerprint joins both as `"{seq}_{time}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an already computed fingerprint string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the camp API's battle list.
///
/// Only the fields needed for change detection and the push message are kept.
/// The API is inconsistent about sending ids and counters as strings or
/// numbers, so every field is decoded leniently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRecord {
    /// Per-account game sequence number.
    #[serde(default, deserialize_with = "lenient::string")]
    pub game_seq: String,

    /// Game time as reported by the API (e.g. `"2024-12-19 12:34:56"`).
    #[serde(default, rename = "gametime", deserialize_with = "lenient::string")]
    pub game_time: String,

    /// Whether the account won this game.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_win: bool,

    /// Name of the hero played.
    #[serde(default, deserialize_with = "lenient::string")]
    pub hero_name: String,

    /// Kill count.
    #[serde(default, deserialize_with = "lenient::count")]
    pub kill_num: u32,

    /// Death count.
    #[serde(default, deserialize_with = "lenient::count")]
    pub dead_num: u32,

    /// Assist count.
    #[serde(default, deserialize_with = "lenient::count")]
    pub assist_num: u32,

    /// Game mode or map name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub map_name: String,

    /// Performance score, kept verbatim (may be fractional).
    #[serde(default, deserialize_with = "lenient::string")]
    pub score: String,
}

impl BattleRecord {
    /// Returns the fingerprint that identifies this record instance.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!("{}_{}", self.game_seq, self.game_time))
    }

    /// Returns the kills/deaths/assists triple as `"k/d/a"`.
    #[must_use]
    pub fn kda(&self) -> String {
        format!("{}/{}/{}", self.kill_num, self.dead_num, self.assist_num)
    }
}

/// Deserializers tolerating string/number mixups in API payloads.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(value.map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX)))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => matches!(s.trim(), "1" | "true"),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_joins_sequence_and_time() {
        let record = BattleRecord {
            game_seq: "100".to_string(),
            game_time: "1000".to_string(),
            ..BattleRecord::default()
        };

        assert_eq!(record.fingerprint(), Fingerprint::new("100_1000"));
    }

    #[test]
    fn same_sequence_different_time_differs() {
        let a = BattleRecord {
            game_seq: "7".to_string(),
            game_time: "2024-01-01 10:00:00".to_string(),
            ..BattleRecord::default()
        };
        let b = BattleRecord {
            game_time: "2024-01-02 10:00:00".to_string(),
            ..a.clone()
        };

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn decodes_numeric_fields_sent_as_numbers() {
        let record: BattleRecord = serde_json::from_value(serde_json::json!({
            "gameSeq": 1_734_580_133,
            "gametime": "2024-12-19 12:00:00",
            "isWin": 1,
            "heroName": "Li Bai",
            "killNum": 12,
            "deadNum": 3,
            "assistNum": 7,
            "mapName": "Ranked",
            "score": 12.5
        }))
        .unwrap();

        assert_eq!(record.game_seq, "1734580133");
        assert!(record.is_win);
        assert_eq!(record.kda(), "12/3/7");
        assert_eq!(record.score, "12.5");
    }

    #[test]
    fn decodes_numeric_fields_sent_as_strings() {
        let record: BattleRecord = serde_json::from_value(serde_json::json!({
            "gameSeq": "55",
            "gametime": "t",
            "isWin": "0",
            "killNum": "4",
            "deadNum": "x",
            "assistNum": null
        }))
        .unwrap();

        assert_eq!(record.game_seq, "55");
        assert!(!record.is_win);
        assert_eq!(record.kill_num, 4);
        assert_eq!(record.dead_num, 0);
        assert_eq!(record.assist_num, 0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let record: BattleRecord = serde_json::from_str("{}").unwrap();

        assert_eq!(record, BattleRecord::default());
        assert_eq!(record.fingerprint().as_str(), "_");
    }

    #[test]
    fn entity_id_displays_raw_value() {
        let id = EntityId::from("2118558336");
        assert_eq!(id.to_string(), "2118558336");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"2118558336\"");
    }
}
