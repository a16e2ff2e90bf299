//! Response shaping.
//!
//! The dashboard consumes the remote index's native envelope
//! (`hits.hits[]._source` with nested `rule`/`agent` objects), so local
//! query results are re-nested into that shape for backward compatibility.
//! Triage state rides along under `annotation`/`seq` keys the remote
//! documents never carry.

use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};
use vigia_core::models::{AlertPage, AlertWithAnnotation, Annotation, Attachment, SyncLog};
use vigia_core::wazuh::AlertBatch;

/// Render a Unix-ms instant as RFC 3339 with millisecond precision.
pub fn rfc3339(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Envelope for a local-store query result.
pub fn local_envelope(page: &AlertPage) -> Value {
    let hits: Vec<Value> = page.alerts.iter().map(local_hit).collect();
    json!({
        "hits": {
            "hits": hits,
            "total": {"value": page.total}
        }
    })
}

fn local_hit(row: &AlertWithAnnotation) -> Value {
    let alert = &row.alert;
    let mut source = json!({
        "@timestamp": rfc3339(alert.timestamp),
        "rule": {
            "description": alert.description,
            "level": alert.level,
            "name": alert.rule_name,
            "id": alert.rule_id,
        },
        "agent": {"name": alert.agent_name},
        "source_ip": alert.source,
        "destination_ip": alert.destination,
        "created_at": rfc3339(alert.created_at),
        "updated_at": rfc3339(alert.updated_at),
    });

    if let Some(annotation) = &row.annotation {
        source["annotation"] = annotation_json(annotation);
    }
    if let Some(seq) = row.seq {
        source["seq"] = json!(seq);
    }

    json!({"_id": alert.id, "_source": source})
}

/// Envelope for a remote passthrough result: hits forwarded verbatim.
pub fn remote_envelope(batch: &AlertBatch) -> Value {
    let hits: Vec<Value> = batch
        .hits
        .iter()
        .map(|hit| {
            json!({
                "_id": hit.id,
                "_index": hit.index,
                "_source": hit.source,
            })
        })
        .collect();
    json!({
        "hits": {
            "hits": hits,
            "total": {"value": batch.total}
        }
    })
}

pub fn annotation_json(annotation: &Annotation) -> Value {
    json!({
        "id": annotation.id.as_str(),
        "alertId": annotation.alert_id,
        "status": annotation.status,
        "notes": annotation
            .notes
            .iter()
            .map(|note| json!({
                "text": note.text,
                "author": note.author,
                "timestamp": rfc3339(note.created_at),
            }))
            .collect::<Vec<_>>(),
        "assignedTo": annotation.assigned_to,
        "attachments": annotation
            .attachments
            .iter()
            .map(attachment_json)
            .collect::<Vec<_>>(),
        "createdAt": rfc3339(annotation.created_at),
        "updatedAt": rfc3339(annotation.updated_at),
    })
}

pub fn attachment_json(attachment: &Attachment) -> Value {
    json!({
        "id": attachment.id.as_str(),
        "annotationId": attachment.annotation_id.as_str(),
        "fileName": attachment.file_name,
        "fileType": attachment.file_type,
        "fileSize": attachment.file_size,
        "fileData": attachment.file_data,
        "createdAt": rfc3339(attachment.created_at),
    })
}

pub fn sync_log_json(log: &SyncLog) -> Value {
    json!({
        "id": log.id.as_str(),
        "lastSync": rfc3339(log.last_sync),
        "alertsCount": log.alerts_count,
        "status": log.status.as_str(),
        "error": log.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vigia_core::models::{Alert, AlertWithAnnotation};

    fn alert(id: &str) -> Alert {
        Alert {
            id: id.to_string(),
            timestamp: 1_754_388_000_000,
            description: "sshd: authentication failed".to_string(),
            level: 5,
            agent_name: "web-01".to_string(),
            rule_name: "sshd".to_string(),
            rule_id: "5716".to_string(),
            source: "203.0.113.9".to_string(),
            destination: String::new(),
            created_at: 1_754_388_000_000,
            updated_at: 1_754_388_000_000,
        }
    }

    #[test]
    fn local_hits_take_the_nested_source_shape() {
        let page = AlertPage {
            alerts: vec![AlertWithAnnotation {
                alert: alert("a1"),
                annotation: None,
                seq: Some(3),
            }],
            total: 12,
        };

        let envelope = local_envelope(&page);
        assert_eq!(envelope["hits"]["total"]["value"], 12);

        let hit = &envelope["hits"]["hits"][0];
        assert_eq!(hit["_id"], "a1");
        assert_eq!(hit["_source"]["rule"]["level"], 5);
        assert_eq!(hit["_source"]["rule"]["description"], "sshd: authentication failed");
        assert_eq!(hit["_source"]["agent"]["name"], "web-01");
        assert_eq!(hit["_source"]["seq"], 3);
        assert!(hit["_source"]["annotation"].is_null());
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn remote_hits_pass_through_verbatim() {
        let batch = AlertBatch {
            hits: vec![vigia_core::wazuh::RawHit {
                id: "a1".to_string(),
                index: Some("wazuh-alerts-4.x".to_string()),
                source: serde_json::json!({"full_log": "raw line", "data": {"srcip": "1.2.3.4"}}),
            }],
            total: 1,
        };

        let envelope = remote_envelope(&batch);
        let hit = &envelope["hits"]["hits"][0];
        assert_eq!(hit["_source"]["full_log"], "raw line");
        assert_eq!(hit["_source"]["data"]["srcip"], "1.2.3.4");
    }
}
