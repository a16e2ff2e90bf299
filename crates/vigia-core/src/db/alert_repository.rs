//! Alert repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::Result;
use crate::models::{status, Alert, AlertFilter, AlertPage, AlertStats, AlertWithAnnotation};
use rusqlite::{params_from_iter, Connection, ToSql};

use super::annotation_repository::{AnnotationRepository, SqliteAnnotationRepository};

/// Trait for cached-alert storage operations
pub trait AlertRepository {
    /// Upsert a batch of alerts as one atomic unit, returning the number
    /// written. A failure anywhere rolls the whole batch back.
    fn upsert_batch(&self, alerts: &[Alert]) -> Result<usize>;

    /// Get a single alert by id
    fn get(&self, id: &str) -> Result<Option<Alert>>;

    /// Query alerts with conjunctive filters, newest first, plus the
    /// filtered total for pagination
    fn query(&self, filter: &AlertFilter, limit: usize, offset: usize) -> Result<AlertPage>;

    /// Count annotations carrying the given status
    fn count_by_status(&self, status: &str) -> Result<u64>;

    /// Aggregate counts bucketed by annotation status
    fn stats(&self) -> Result<AlertStats>;
}

const UPSERT_SQL: &str = "INSERT INTO alerts (
        id, timestamp, description, level, agent_name, rule_name, rule_id,
        source, destination, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(id) DO UPDATE SET
        timestamp = excluded.timestamp,
        description = excluded.description,
        level = excluded.level,
        agent_name = excluded.agent_name,
        rule_name = excluded.rule_name,
        rule_id = excluded.rule_id,
        source = excluded.source,
        destination = excluded.destination,
        updated_at = excluded.updated_at";

const SELECT_COLUMNS: &str = "id, timestamp, description, level, agent_name, rule_name, rule_id,
        source, destination, created_at, updated_at";

/// SQLite implementation of `AlertRepository`
pub struct SqliteAlertRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAlertRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Build the WHERE clause and its positional params for a filter.
    ///
    /// Absent filters contribute nothing to the predicate.
    fn build_where(filter: &AlertFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(level) = filter.level {
            clauses.push("level = ?");
            params.push(Box::new(level));
        }
        if let Some(agent) = &filter.agent {
            clauses.push("LOWER(agent_name) LIKE ?");
            params.push(Box::new(format!("%{}%", agent.to_lowercase())));
        }
        if let Some(search) = &filter.search {
            clauses.push("LOWER(description) LIKE ?");
            params.push(Box::new(format!("%{}%", search.to_lowercase())));
        }
        if let Some(since) = filter.since_ms {
            clauses.push("timestamp >= ?");
            params.push(Box::new(since));
        }
        if let Some(until) = filter.until_ms {
            clauses.push("timestamp <= ?");
            params.push(Box::new(until));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (where_sql, params)
    }

    /// Parse an alert from a database row
    fn parse_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
        Ok(Alert {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            description: row.get(2)?,
            level: row.get(3)?,
            agent_name: row.get(4)?,
            rule_name: row.get(5)?,
            rule_id: row.get(6)?,
            source: row.get(7)?,
            destination: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl AlertRepository for SqliteAlertRepository<'_> {
    fn upsert_batch(&self, alerts: &[Alert]) -> Result<usize> {
        if alerts.is_empty() {
            return Ok(0);
        }

        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let mut stmt = match self.conn.prepare(UPSERT_SQL) {
            Ok(stmt) => stmt,
            Err(e) => {
                self.conn.execute_batch("ROLLBACK").ok();
                return Err(e.into());
            }
        };
        for alert in alerts {
            let result = stmt.execute(rusqlite::params![
                alert.id,
                alert.timestamp,
                alert.description,
                alert.level,
                alert.agent_name,
                alert.rule_name,
                alert.rule_id,
                alert.source,
                alert.destination,
                alert.created_at,
                alert.updated_at,
            ]);
            if let Err(e) = result {
                self.conn.execute_batch("ROLLBACK").ok();
                return Err(e.into());
            }
        }

        if let Err(e) = self.conn.execute_batch("COMMIT") {
            self.conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }

        Ok(alerts.len())
    }

    fn get(&self, id: &str) -> Result<Option<Alert>> {
        let result = self.conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM alerts WHERE id = ?"),
            [id],
            Self::parse_alert,
        );

        match result {
            Ok(alert) => Ok(Some(alert)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn query(&self, filter: &AlertFilter, limit: usize, offset: usize) -> Result<AlertPage> {
        let (where_sql, mut params) = Self::build_where(filter);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(1) FROM alerts {where_sql}"),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        // Secondary id ordering keeps pages deterministic under equal timestamps
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM alerts
             {where_sql}
             ORDER BY timestamp DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        params.push(Box::new(limit as i64));
        params.push(Box::new(offset as i64));

        let rows = stmt
            .query_map(params_from_iter(params.iter()), Self::parse_alert)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let annotations = SqliteAnnotationRepository::new(self.conn);
        let alerts = rows
            .into_iter()
            .map(|alert| {
                let annotation = annotations.get(&alert.id)?;
                let seq = annotations.peek_sequence(&alert.id)?;
                Ok(AlertWithAnnotation {
                    alert,
                    annotation,
                    seq,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(AlertPage {
            alerts,
            total: total.max(0) as u64,
        })
    }

    fn count_by_status(&self, status: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM alert_annotations WHERE status = ?",
            [status],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn stats(&self) -> Result<AlertStats> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM alerts", [], |row| row.get(0))?;
        let total = total.max(0) as u64;

        let in_progress = self.count_by_status(status::IN_PROGRESS)?;
        let scheduled = self.count_by_status(status::SCHEDULED)?;
        let closed = self.count_by_status(status::CLOSED)?;
        let canceled = self.count_by_status(status::CANCELED)?;
        let false_positive = self.count_by_status(status::FALSE_POSITIVE)?;
        let in_homologation = self.count_by_status(status::IN_HOMOLOGATION)?;

        let handled =
            in_progress + scheduled + closed + canceled + false_positive + in_homologation;

        Ok(AlertStats {
            total,
            new_alerts: total.saturating_sub(handled),
            in_progress,
            scheduled,
            closed,
            canceled,
            false_positive,
            in_homologation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::AnnotationPatch;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn alert(id: &str, timestamp: i64, level: i64) -> Alert {
        Alert {
            id: id.to_string(),
            timestamp,
            description: format!("event on {id}"),
            level,
            agent_name: "server-01".to_string(),
            rule_name: "auth".to_string(),
            rule_id: "5710".to_string(),
            source: String::new(),
            destination: String::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        let written = repo
            .upsert_batch(&[alert("a1", 1_000, 5), alert("a2", 2_000, 7)])
            .unwrap();
        assert_eq!(written, 2);

        let fetched = repo.get("a1").unwrap().unwrap();
        assert_eq!(fetched.level, 5);
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());
        let batch = [alert("a1", 1_000, 5), alert("a2", 2_000, 7)];

        repo.upsert_batch(&batch).unwrap();
        repo.upsert_batch(&batch).unwrap();

        let page = repo.query(&AlertFilter::default(), 10, 0).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.alerts.len(), 2);
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        repo.upsert_batch(&[alert("a1", 1_000, 5)]).unwrap();
        let first = repo.get("a1").unwrap().unwrap();

        let mut updated = alert("a1", 1_500, 9);
        updated.description = "escalated".to_string();
        updated.updated_at = 9_999;
        repo.upsert_batch(&[updated]).unwrap();

        let fetched = repo.get("a1").unwrap().unwrap();
        assert_eq!(fetched.level, 9);
        assert_eq!(fetched.description, "escalated");
        assert!(fetched.updated_at > first.updated_at);
        // created_at belongs to the first write
        assert_eq!(fetched.created_at, first.created_at);
    }

    #[test]
    fn test_query_filters_compose_conjunctively() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        let mut a1 = alert("a1", 1_000, 5);
        a1.description = "Failed login attempt".to_string();
        let mut a2 = alert("a2", 2_000, 5);
        a2.description = "Package installed".to_string();
        let mut a3 = alert("a3", 3_000, 7);
        a3.description = "Failed login attempt".to_string();
        repo.upsert_batch(&[a1, a2, a3]).unwrap();

        let filter = AlertFilter {
            level: Some(5),
            search: Some("login".to_string()),
            ..AlertFilter::default()
        };
        let page = repo.query(&filter, 10, 0).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.alerts[0].alert.id, "a1");
    }

    #[test]
    fn test_query_search_is_case_insensitive() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        let mut a1 = alert("a1", 1_000, 5);
        a1.description = "SSH Brute Force".to_string();
        a1.agent_name = "Gateway-Prod".to_string();
        repo.upsert_batch(&[a1]).unwrap();

        let by_search = AlertFilter {
            search: Some("brute".to_string()),
            ..AlertFilter::default()
        };
        assert_eq!(repo.query(&by_search, 10, 0).unwrap().total, 1);

        let by_agent = AlertFilter {
            agent: Some("gateway".to_string()),
            ..AlertFilter::default()
        };
        assert_eq!(repo.query(&by_agent, 10, 0).unwrap().total, 1);
    }

    #[test]
    fn test_query_timestamp_range_is_inclusive() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        repo.upsert_batch(&[alert("a1", 1_000, 5), alert("a2", 2_000, 5), alert("a3", 3_000, 5)])
            .unwrap();

        let filter = AlertFilter {
            since_ms: Some(1_000),
            until_ms: Some(2_000),
            ..AlertFilter::default()
        };
        let page = repo.query(&filter, 10, 0).unwrap();
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_query_orders_newest_first_with_stable_ties() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        repo.upsert_batch(&[alert("a1", 2_000, 5), alert("a2", 2_000, 5), alert("a3", 3_000, 5)])
            .unwrap();

        let page = repo.query(&AlertFilter::default(), 10, 0).unwrap();
        let ids: Vec<&str> = page.alerts.iter().map(|a| a.alert.id.as_str()).collect();
        // Equal timestamps fall back to id descending
        assert_eq!(ids, vec!["a3", "a2", "a1"]);
    }

    #[test]
    fn test_pagination_is_disjoint_and_complete() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        let batch: Vec<Alert> = (0..20)
            .map(|i| alert(&format!("a{i:02}"), 1_000 + i64::from(i), 5))
            .collect();
        repo.upsert_batch(&batch).unwrap();

        let first = repo.query(&AlertFilter::default(), 10, 0).unwrap();
        let second = repo.query(&AlertFilter::default(), 10, 10).unwrap();
        let all = repo.query(&AlertFilter::default(), 20, 0).unwrap();

        let combined: Vec<String> = first
            .alerts
            .iter()
            .chain(second.alerts.iter())
            .map(|a| a.alert.id.clone())
            .collect();
        let union: Vec<String> = all.alerts.iter().map(|a| a.alert.id.clone()).collect();
        assert_eq!(combined.len(), 20);
        // Pages are contiguous and disjoint: chaining them reproduces the
        // single 20-row query exactly
        assert_eq!(combined, union);
    }

    #[test]
    fn test_offset_past_total_yields_empty_page() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        repo.upsert_batch(&[alert("a1", 1_000, 5)]).unwrap();

        let page = repo.query(&AlertFilter::default(), 10, 50).unwrap();
        assert!(page.alerts.is_empty());
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_store_does_not_reapply_remote_level_floor() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());

        // A level-3 alert written directly is still queryable even though the
        // remote default filter would have excluded it upstream
        repo.upsert_batch(&[alert("a1", 1_000, 5), alert("a2", 2_000, 7), alert("a3", 3_000, 3)])
            .unwrap();

        let filter = AlertFilter {
            level: Some(3),
            ..AlertFilter::default()
        };
        let page = repo.query(&filter, 10, 0).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.alerts[0].alert.id, "a3");
    }

    #[test]
    fn test_query_includes_annotation_and_seq() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());
        let annotations = SqliteAnnotationRepository::new(db.connection());

        repo.upsert_batch(&[alert("a1", 1_000, 5), alert("a2", 2_000, 5)])
            .unwrap();
        annotations
            .annotate(
                "a1",
                &AnnotationPatch {
                    status: Some(status::CLOSED.to_string()),
                    ..AnnotationPatch::default()
                },
            )
            .unwrap();
        annotations.sequence_number("a1").unwrap();

        let page = repo.query(&AlertFilter::default(), 10, 0).unwrap();
        let a1 = page.alerts.iter().find(|a| a.alert.id == "a1").unwrap();
        let a2 = page.alerts.iter().find(|a| a.alert.id == "a2").unwrap();

        assert_eq!(a1.annotation.as_ref().unwrap().status, status::CLOSED);
        assert_eq!(a1.seq, Some(1));
        assert!(a2.annotation.is_none());
        assert!(a2.seq.is_none());
    }

    #[test]
    fn test_stats_buckets_by_annotation_status() {
        let db = setup();
        let repo = SqliteAlertRepository::new(db.connection());
        let annotations = SqliteAnnotationRepository::new(db.connection());

        repo.upsert_batch(&[alert("a1", 1_000, 5), alert("a2", 2_000, 5), alert("a3", 3_000, 5)])
            .unwrap();
        annotations
            .annotate(
                "a1",
                &AnnotationPatch {
                    status: Some(status::CLOSED.to_string()),
                    ..AnnotationPatch::default()
                },
            )
            .unwrap();
        annotations
            .annotate(
                "a2",
                &AnnotationPatch {
                    status: Some(status::IN_PROGRESS.to_string()),
                    ..AnnotationPatch::default()
                },
            )
            .unwrap();

        let stats = repo.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.new_alerts, 1);
    }
}
