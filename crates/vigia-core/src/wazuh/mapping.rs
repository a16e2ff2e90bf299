//! Typed mapping from raw index hits to flat alert rows.
//!
//! The remote documents are deeply nested and loosely shaped; everything the
//! cache needs is extracted here, in one place, with fixed defaults:
//! description `""`, level `0`, agent `"unknown"`, rule name/id `""`,
//! source/destination `""`, timestamp falling back from `@timestamp` to
//! `timestamp` to the sync instant.

use chrono::DateTime;
use serde::Deserialize;

use crate::models::Alert;

use super::RawHit;

#[derive(Debug, Default, Deserialize)]
struct SourceFields {
    #[serde(rename = "@timestamp")]
    es_timestamp: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    rule: RuleFields,
    #[serde(default)]
    agent: AgentFields,
    source_ip: Option<String>,
    destination_ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RuleFields {
    description: Option<String>,
    level: Option<i64>,
    name: Option<String>,
    id: Option<RuleId>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentFields {
    name: Option<String>,
}

/// Rule ids arrive as strings from Wazuh but as numbers from some decoders
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleId {
    Text(String),
    Number(i64),
}

impl RuleId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Map one raw hit into a cache row, stamping `created_at`/`updated_at`
/// with `now_ms`.
#[must_use]
pub fn map_hit(hit: &RawHit, now_ms: i64) -> Alert {
    let fields: SourceFields = match serde_json::from_value(hit.source.clone()) {
        Ok(fields) => fields,
        Err(err) => {
            tracing::warn!("Malformed alert source for {}: {err}", hit.id);
            SourceFields::default()
        }
    };

    let timestamp = fields
        .es_timestamp
        .as_deref()
        .or(fields.timestamp.as_deref())
        .and_then(parse_instant_ms)
        .unwrap_or(now_ms);

    Alert {
        id: hit.id.clone(),
        timestamp,
        description: fields.rule.description.unwrap_or_default(),
        level: fields.rule.level.unwrap_or(0),
        agent_name: fields
            .agent
            .name
            .unwrap_or_else(|| "unknown".to_string()),
        rule_name: fields.rule.name.unwrap_or_default(),
        rule_id: fields.rule.id.map(RuleId::into_string).unwrap_or_default(),
        source: fields.source_ip.unwrap_or_default(),
        destination: fields.destination_ip.unwrap_or_default(),
        created_at: now_ms,
        updated_at: now_ms,
    }
}

fn parse_instant_ms(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .ok()
}
