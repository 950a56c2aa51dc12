//! Session persistence
//!
//! Optional collaborator: the engine runs entirely in memory without it.
//! SQLite, single file, no network - questions keep their template id so a
//! resumed session still knows where each question came from.

use crate::error::{QuestioningError, Result};
use crate::types::{Answer, Priority, Question};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// What the engine needs from a persistence backend
pub trait QuestionStore: Send {
    fn open_session(&self, session_id: &str, topic: &str, catalog_fingerprint: &str) -> Result<()>;

    fn store_question(&self, session_id: &str, question: &Question) -> Result<()>;

    fn store_answer(&self, question_id: &str, answer_text: &str, confidence: f64) -> Result<()>;

    /// Every question of a session in the order it was asked, with its
    /// answer if one was recorded
    fn load_history(&self, session_id: &str) -> Result<Vec<QuestionRecord>>;

    fn session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    fn close_session(&self, session_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub question: Question,
    pub answer: Option<Answer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub topic: String,
    pub catalog_fingerprint: String,
    pub created_at: String,
    pub closed_at: Option<String>,
}

/// Open (or create) the database and apply the schema
pub fn init_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    catalog_fingerprint TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    closed_at TEXT
);

-- Questions keep their template id; NULL for generated clarifications
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    seq INTEGER NOT NULL,
    template_id TEXT,
    phase TEXT NOT NULL,
    text TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL,
    follow_up_to TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_session ON questions(session_id, seq);

-- Latest answer per question
CREATE TABLE IF NOT EXISTS answers (
    question_id TEXT PRIMARY KEY REFERENCES questions(id),
    answer_text TEXT NOT NULL,
    confidence REAL NOT NULL,
    answered_at TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: init_db(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Raw row before timestamp and priority parsing
struct QuestionRow {
    id: String,
    template_id: Option<String>,
    phase: String,
    text: String,
    category: String,
    priority: String,
    follow_up_to: Option<String>,
    created_at: String,
    answer_text: Option<String>,
    confidence: Option<f64>,
    answered_at: Option<String>,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| QuestioningError::config(format!("corrupt timestamp '{}': {}", value, e)))
}

impl QuestionRow {
    fn into_record(self) -> Result<QuestionRecord> {
        let priority = Priority::parse(&self.priority).ok_or_else(|| {
            QuestioningError::config(format!("corrupt priority '{}' on {}", self.priority, self.id))
        })?;

        let answer = match (self.answer_text, self.confidence, self.answered_at) {
            (Some(text), Some(confidence), Some(at)) => Some(Answer {
                question_id: self.id.clone(),
                text,
                confidence,
                timestamp: parse_time(&at)?,
            }),
            _ => None,
        };

        Ok(QuestionRecord {
            question: Question {
                id: self.id,
                template_id: self.template_id,
                phase: self.phase,
                text: self.text,
                category: self.category,
                priority,
                follow_up_to: self.follow_up_to,
                created_at: parse_time(&self.created_at)?,
            },
            answer,
        })
    }
}

impl QuestionStore for SqliteStore {
    fn open_session(&self, session_id: &str, topic: &str, catalog_fingerprint: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, topic, catalog_fingerprint) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET closed_at = NULL",
            params![session_id, topic, catalog_fingerprint],
        )?;
        Ok(())
    }

    fn store_question(&self, session_id: &str, question: &Question) -> Result<()> {
        let seq: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM questions WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )?;

        self.conn.execute(
            "INSERT INTO questions
             (id, session_id, seq, template_id, phase, text, category, priority, follow_up_to, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                question.id,
                session_id,
                seq,
                question.template_id,
                question.phase,
                question.text,
                question.category,
                question.priority.name(),
                question.follow_up_to,
                question.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn store_answer(&self, question_id: &str, answer_text: &str, confidence: f64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO answers (question_id, answer_text, confidence, answered_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(question_id) DO UPDATE SET
                answer_text = ?2,
                confidence = ?3,
                answered_at = ?4",
            params![question_id, answer_text, confidence, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn load_history(&self, session_id: &str) -> Result<Vec<QuestionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT q.id, q.template_id, q.phase, q.text, q.category, q.priority,
                    q.follow_up_to, q.created_at, a.answer_text, a.confidence, a.answered_at
             FROM questions q
             LEFT JOIN answers a ON a.question_id = q.id
             WHERE q.session_id = ?1
             ORDER BY q.seq",
        )?;

        let rows = stmt
            .query_map([session_id], |row| {
                Ok(QuestionRow {
                    id: row.get(0)?,
                    template_id: row.get(1)?,
                    phase: row.get(2)?,
                    text: row.get(3)?,
                    category: row.get(4)?,
                    priority: row.get(5)?,
                    follow_up_to: row.get(6)?,
                    created_at: row.get(7)?,
                    answer_text: row.get(8)?,
                    confidence: row.get(9)?,
                    answered_at: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(QuestionRow::into_record).collect()
    }

    fn session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, topic, catalog_fingerprint, created_at, closed_at
                 FROM sessions WHERE id = ?1",
                [session_id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        topic: row.get(1)?,
                        catalog_fingerprint: row.get(2)?,
                        created_at: row.get(3)?,
                        closed_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn close_session(&self, session_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET closed_at = ?2 WHERE id = ?1",
            params![session_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    fn question(template: Option<&str>, text: &str) -> Question {
        Question::new(
            template.map(str::to_string),
            "specify",
            text.to_string(),
            "requirements",
            Priority::Critical,
        )
    }

    #[test]
    fn test_init_db() {
        let (store, _dir) = setup_test_db();
        let tables: Vec<String> = store
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"sessions".to_string()));
        assert!(tables.contains(&"questions".to_string()));
        assert!(tables.contains(&"answers".to_string()));
    }

    #[test]
    fn test_history_round_trip_keeps_order_and_template_ids() {
        let (store, _dir) = setup_test_db();
        store.open_session("s1", "billing", "abc").unwrap();

        let first = question(Some("req-core"), "What must billing do?");
        let second = question(None, "Could you be more specific?").with_follow_up_to(&first.id);
        store.store_question("s1", &first).unwrap();
        store.store_question("s1", &second).unwrap();
        store.store_answer(&first.id, "Issue invoices", 0.8).unwrap();

        let history = store.load_history("s1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question.id, first.id);
        assert_eq!(history[0].question.template_id.as_deref(), Some("req-core"));
        assert_eq!(history[0].question.priority, Priority::Critical);
        assert_eq!(history[0].answer.as_ref().unwrap().text, "Issue invoices");
        assert_eq!(history[1].question.follow_up_to.as_deref(), Some(first.id.as_str()));
        assert!(history[1].answer.is_none());
    }

    #[test]
    fn test_answer_overwrites_previous() {
        let store = SqliteStore::in_memory().unwrap();
        store.open_session("s1", "billing", "abc").unwrap();
        let q = question(Some("req-core"), "What?");
        store.store_question("s1", &q).unwrap();
        store.store_answer(&q.id, "first", 0.3).unwrap();
        store.store_answer(&q.id, "second", 0.9).unwrap();

        let history = store.load_history("s1").unwrap();
        let answer = history[0].answer.as_ref().unwrap();
        assert_eq!(answer.text, "second");
        assert_eq!(answer.confidence, 0.9);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SqliteStore::in_memory().unwrap();
        store.open_session("a", "x", "f").unwrap();
        store.open_session("b", "y", "f").unwrap();
        store.store_question("a", &question(None, "A?")).unwrap();
        assert_eq!(store.load_history("a").unwrap().len(), 1);
        assert!(store.load_history("b").unwrap().is_empty());
    }

    #[test]
    fn test_session_open_and_close() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.session("s1").unwrap().is_none());

        store.open_session("s1", "billing", "fp").unwrap();
        let open = store.session("s1").unwrap().unwrap();
        assert_eq!(open.topic, "billing");
        assert_eq!(open.catalog_fingerprint, "fp");
        assert!(open.closed_at.is_none());

        store.close_session("s1").unwrap();
        assert!(store.session("s1").unwrap().unwrap().closed_at.is_some());

        // Reopening clears the close marker
        store.open_session("s1", "billing", "fp").unwrap();
        assert!(store.session("s1").unwrap().unwrap().closed_at.is_none());
    }
}
