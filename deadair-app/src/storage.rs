//! SQLite-backed call catalogue and evaluation store.
//!
//! One database file holds two tables:
//! - `calls`: recorded audio plus whatever a human reviewer noted about it.
//! - `evaluations`: one row per `(audio_identifier, context)`, the full
//!   result kept as JSON next to a few scalar columns for querying.
//!
//! Every operation opens its own connection, so a `LocalStore` can be shared
//! freely across batch workers.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use deadair_core::{
    store::ensure_engine_context, AudioSource, DeadAirError, EvaluationResult, EvaluationStore,
    SaveOutcome, AUDIO_ANALYSIS_CONTEXT,
};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

type Result<T> = deadair_core::Result<T>;

/// Concurrent writers wait this long for the database lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    pub identifier: String,
    pub audio_bytes: usize,
    pub human_grade: Option<String>,
    pub transcription_excerpt: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CallImport<'a> {
    pub identifier: &'a str,
    pub audio: &'a [u8],
    pub human_grade: Option<&'a str>,
    pub transcription_excerpt: Option<&'a str>,
}

/// Which calls a batch should pick up.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateFilter {
    pub limit: Option<usize>,
    /// Leave out calls already evaluated under the engine context.
    pub skip_evaluated: bool,
    /// Also take calls that have no human grade.
    pub include_ungraded: bool,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
}

impl LocalStore {
    pub fn default_db_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Lattice Labs")
                .join("DeadAir")
                .join("deadair.db")
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    std::env::var_os("HOME")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("/tmp"))
                        .join(".local")
                        .join("share")
                })
                .join("deadair")
                .join("deadair.db")
        }
    }

    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path };
        store.init_schema()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).map_err(persistence)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(persistence)?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS calls (
              identifier TEXT PRIMARY KEY,
              audio BLOB,
              human_grade TEXT,
              transcription_excerpt TEXT,
              created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS evaluations (
              audio_identifier TEXT NOT NULL,
              context TEXT NOT NULL,
              ai_grade TEXT NOT NULL,
              human_grade TEXT,
              grade_match INTEGER,
              gap_count INTEGER NOT NULL DEFAULT 0,
              total_dead_air_seconds REAL NOT NULL DEFAULT 0,
              audio_duration REAL NOT NULL DEFAULT 0,
              result_json TEXT NOT NULL,
              created_at INTEGER NOT NULL,
              updated_at INTEGER NOT NULL,
              PRIMARY KEY (audio_identifier, context)
            );

            CREATE INDEX IF NOT EXISTS idx_evaluations_context ON evaluations(context);
            "#,
        )
        .map_err(persistence)?;
        Ok(())
    }

    /// Add a call, or replace the audio and notes of an existing one.
    pub fn import_call(&self, call: CallImport<'_>) -> Result<()> {
        let human_grade = call
            .human_grade
            .map(str::trim)
            .filter(|g| !g.is_empty());
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO calls (identifier, audio, human_grade, transcription_excerpt, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(identifier) DO UPDATE SET
              audio = excluded.audio,
              human_grade = excluded.human_grade,
              transcription_excerpt = excluded.transcription_excerpt
            "#,
            params![
                call.identifier,
                call.audio,
                human_grade,
                call.transcription_excerpt,
                Utc::now().timestamp()
            ],
        )
        .map_err(persistence)?;
        Ok(())
    }

    pub fn get_call(&self, identifier: &str) -> Result<Option<CallSummary>> {
        let conn = self.open()?;
        conn.query_row(
            r#"
            SELECT identifier, COALESCE(length(audio), 0), human_grade, transcription_excerpt, created_at
            FROM calls WHERE identifier = ?1
            "#,
            params![identifier],
            |row| {
                Ok(CallSummary {
                    identifier: row.get(0)?,
                    audio_bytes: row.get::<_, i64>(1)?.max(0) as usize,
                    human_grade: row.get(2)?,
                    transcription_excerpt: row.get(3)?,
                    created_at: ts_to_rfc3339(row.get(4)?),
                })
            },
        )
        .optional()
        .map_err(persistence)
    }

    /// Identifiers of calls eligible for a batch, ordered by identifier.
    pub fn list_candidates(&self, filter: CandidateFilter) -> Result<Vec<String>> {
        let limit = filter.limit.map(|n| n as i64).unwrap_or(-1);
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT c.identifier FROM calls c
                WHERE c.audio IS NOT NULL AND length(c.audio) > 0
                  AND (?1 = 1 OR (c.human_grade IS NOT NULL AND trim(c.human_grade) <> ''))
                  AND (?2 = 0 OR NOT EXISTS (
                    SELECT 1 FROM evaluations e
                    WHERE e.audio_identifier = c.identifier AND e.context = ?3
                  ))
                ORDER BY c.identifier
                LIMIT ?4
                "#,
            )
            .map_err(persistence)?;
        let rows = stmt
            .query_map(
                params![
                    filter.include_ungraded as i64,
                    filter.skip_evaluated as i64,
                    AUDIO_ANALYSIS_CONTEXT,
                    limit
                ],
                |row| row.get::<_, String>(0),
            )
            .map_err(persistence)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(persistence)
    }

    /// When the engine last wrote its evaluation of `audio_identifier`.
    pub fn evaluated_at(&self, audio_identifier: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        let ts: Option<i64> = conn
            .query_row(
                "SELECT updated_at FROM evaluations WHERE audio_identifier = ?1 AND context = ?2",
                params![audio_identifier, AUDIO_ANALYSIS_CONTEXT],
                |row| row.get(0),
            )
            .optional()
            .map_err(persistence)?;
        Ok(ts.map(ts_to_rfc3339))
    }
}

impl AudioSource for LocalStore {
    fn fetch_audio(&self, id: &str) -> Result<Vec<u8>> {
        let conn = self
            .open()
            .map_err(|e| DeadAirError::source_unavailable(id, e))?;
        let audio: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT audio FROM calls WHERE identifier = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DeadAirError::source_unavailable(id, e))?;
        match audio {
            None => Err(DeadAirError::source_unavailable(id, "no such call")),
            Some(None) => Err(DeadAirError::source_unavailable(id, "call has no audio")),
            Some(Some(bytes)) if bytes.is_empty() => {
                Err(DeadAirError::source_unavailable(id, "call has no audio"))
            }
            Some(Some(bytes)) => Ok(bytes),
        }
    }

    fn human_grade(&self, id: &str) -> Result<Option<String>> {
        let conn = self
            .open()
            .map_err(|e| DeadAirError::source_unavailable(id, e))?;
        conn.query_row(
            "SELECT human_grade FROM calls WHERE identifier = ?1",
            params![id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map_err(|e| DeadAirError::source_unavailable(id, e))?
        .ok_or_else(|| DeadAirError::source_unavailable(id, "no such call"))
    }
}

impl EvaluationStore for LocalStore {
    fn save(&self, result: &EvaluationResult, reprocess: bool) -> Result<SaveOutcome> {
        ensure_engine_context(result)?;
        let json = serde_json::to_string(result)
            .map_err(|e| DeadAirError::Persistence(e.to_string()))?;
        let now = Utc::now().timestamp();
        let ai_grade = result.ai_grade.as_str();
        let gap_count = result.gap_count as i64;
        let row = params![
            result.audio_identifier,
            result.context,
            ai_grade,
            result.human_grade,
            result.grade_match,
            gap_count,
            result.total_dead_air_seconds,
            result.audio_duration,
            json,
            now
        ];

        let mut conn = self.open()?;
        if !reprocess {
            let changed = conn
                .execute(
                    r#"
                    INSERT INTO evaluations
                    (audio_identifier, context, ai_grade, human_grade, grade_match, gap_count,
                     total_dead_air_seconds, audio_duration, result_json, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                    ON CONFLICT(audio_identifier, context) DO NOTHING
                    "#,
                    row,
                )
                .map_err(persistence)?;
            return Ok(if changed == 0 {
                SaveOutcome::already_evaluated()
            } else {
                SaveOutcome::inserted()
            });
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(persistence)?;
        let existed: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM evaluations WHERE audio_identifier = ?1 AND context = ?2)",
                params![result.audio_identifier, result.context],
                |r| r.get(0),
            )
            .map_err(persistence)?;
        tx.execute(
            r#"
            INSERT INTO evaluations
            (audio_identifier, context, ai_grade, human_grade, grade_match, gap_count,
             total_dead_air_seconds, audio_duration, result_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            ON CONFLICT(audio_identifier, context) DO UPDATE SET
              ai_grade = excluded.ai_grade,
              human_grade = excluded.human_grade,
              grade_match = excluded.grade_match,
              gap_count = excluded.gap_count,
              total_dead_air_seconds = excluded.total_dead_air_seconds,
              audio_duration = excluded.audio_duration,
              result_json = excluded.result_json,
              updated_at = excluded.updated_at
            "#,
            row,
        )
        .map_err(persistence)?;
        tx.commit().map_err(persistence)?;

        Ok(if existed {
            SaveOutcome::replaced()
        } else {
            SaveOutcome::inserted()
        })
    }

    fn load(&self, audio_identifier: &str, context: &str) -> Result<Option<EvaluationResult>> {
        let conn = self.open()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT result_json FROM evaluations WHERE audio_identifier = ?1 AND context = ?2",
                params![audio_identifier, context],
                |row| row.get(0),
            )
            .optional()
            .map_err(persistence)?;
        json.map(|raw| decode_result(&raw)).transpose()
    }

    fn list(&self, context: &str) -> Result<Vec<EvaluationResult>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT result_json FROM evaluations WHERE context = ?1 ORDER BY audio_identifier",
            )
            .map_err(persistence)?;
        let rows = stmt
            .query_map(params![context], |row| row.get::<_, String>(0))
            .map_err(persistence)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(decode_result(&raw.map_err(persistence)?)?);
        }
        Ok(out)
    }
}

fn decode_result(raw: &str) -> Result<EvaluationResult> {
    serde_json::from_str(raw)
        .map_err(|e| DeadAirError::Persistence(format!("corrupt evaluation record: {e}")))
}

fn persistence(e: rusqlite::Error) -> DeadAirError {
    DeadAirError::Persistence(e.to_string())
}

fn ts_to_rfc3339(ts: i64) -> String {
    let dt: DateTime<Utc> = Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now);
    dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadair_core::{
        evaluation::compose, AnalysisParameters, EvaluationBoundaries, Gap, SaveReason,
    };

    fn temp_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nested").join("deadair.db")).unwrap();
        (dir, store)
    }

    fn result(id: &str, failed: bool, human: Option<&str>) -> EvaluationResult {
        let gaps = if failed {
            vec![Gap {
                start_time: 20.0,
                end_time: 26.0,
                duration: 6.0,
            }]
        } else {
            vec![]
        };
        compose(
            id,
            gaps,
            60.0,
            EvaluationBoundaries {
                start_time: 10.0,
                end_time: 50.0,
            },
            AnalysisParameters::default(),
            human,
        )
    }

    fn import(store: &LocalStore, id: &str, audio: &[u8], grade: Option<&str>) {
        store
            .import_call(CallImport {
                identifier: id,
                audio,
                human_grade: grade,
                transcription_excerpt: None,
            })
            .unwrap();
    }

    #[test]
    fn save_is_idempotent_without_reprocess() {
        let (_dir, store) = temp_store();
        let first = result("1", true, None);

        assert_eq!(store.save(&first, false).unwrap(), SaveOutcome::inserted());
        let again = store.save(&result("1", false, None), false).unwrap();
        assert_eq!(again.reason, SaveReason::AlreadyEvaluated);
        assert_eq!(
            store.load("1", AUDIO_ANALYSIS_CONTEXT).unwrap(),
            Some(first)
        );
    }

    #[test]
    fn inexact_gap_times_survive_save_and_load() {
        let (_dir, store) = temp_store();
        let rate = 44_100.0;
        let mut expected = Vec::new();
        for k in 0..200u32 {
            let start = f64::from(k * 331 + 132_301) / rate * 3.7;
            let end = start + f64::from(k * 131 + 132_301) / rate;
            let gaps = vec![Gap {
                start_time: start,
                end_time: end,
                duration: end - start,
            }];
            let r = compose(
                &format!("call-{k}"),
                gaps,
                f64::from(k + 3_000_017) / rate,
                EvaluationBoundaries {
                    start_time: 10.0,
                    end_time: f64::from(k + 2_559_017) / rate,
                },
                AnalysisParameters::default(),
                None,
            );
            store.save(&r, false).unwrap();
            expected.push(r);
        }

        for r in &expected {
            let loaded = store.load(&r.audio_identifier, AUDIO_ANALYSIS_CONTEXT).unwrap();
            assert_eq!(loaded.as_ref(), Some(r));
        }
        let mut listed = store.list(AUDIO_ANALYSIS_CONTEXT).unwrap();
        listed.sort_by(|a, b| a.audio_identifier.cmp(&b.audio_identifier));
        expected.sort_by(|a, b| a.audio_identifier.cmp(&b.audio_identifier));
        assert_eq!(listed, expected);
    }

    #[test]
    fn reprocess_replaces_record() {
        let (_dir, store) = temp_store();
        store.save(&result("1", true, None), false).unwrap();

        let fresh = result("1", false, Some("PASSED"));
        let outcome = store.save(&fresh, true).unwrap();
        assert_eq!(outcome, SaveOutcome::replaced());
        assert_eq!(store.load("1", AUDIO_ANALYSIS_CONTEXT).unwrap(), Some(fresh));
        assert!(store.evaluated_at("1").unwrap().is_some());
    }

    #[test]
    fn reprocess_on_empty_key_inserts() {
        let (_dir, store) = temp_store();
        let outcome = store.save(&result("9", false, None), true).unwrap();
        assert_eq!(outcome.reason, SaveReason::Inserted);
    }

    #[test]
    fn foreign_context_is_refused() {
        let (_dir, store) = temp_store();
        let mut human = result("1", true, Some("FAILED"));
        human.context = "human_review".into();

        assert!(matches!(
            store.save(&human, true),
            Err(DeadAirError::InvalidParameters(_))
        ));
        assert!(store.list("human_review").unwrap().is_empty());
    }

    #[test]
    fn list_is_ordered_by_identifier() {
        let (_dir, store) = temp_store();
        for id in ["b", "c", "a"] {
            store.save(&result(id, false, None), false).unwrap();
        }
        let ids: Vec<String> = store
            .list(AUDIO_ANALYSIS_CONTEXT)
            .unwrap()
            .into_iter()
            .map(|r| r.audio_identifier)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn audio_source_reads_imported_calls() {
        let (_dir, store) = temp_store();
        import(&store, "42", b"RIFF....", Some("  Failed "));

        assert_eq!(store.fetch_audio("42").unwrap(), b"RIFF....".to_vec());
        assert_eq!(store.human_grade("42").unwrap().as_deref(), Some("Failed"));
        assert_eq!(store.get_call("42").unwrap().unwrap().audio_bytes, 8);
    }

    #[test]
    fn missing_or_empty_audio_is_unavailable() {
        let (_dir, store) = temp_store();
        import(&store, "empty", b"", None);

        assert!(store.fetch_audio("ghost").unwrap_err().is_retryable());
        assert!(matches!(
            store.fetch_audio("empty"),
            Err(DeadAirError::SourceUnavailable { .. })
        ));
        assert!(store.human_grade("ghost").is_err());
    }

    #[test]
    fn candidates_respect_filter() {
        let (_dir, store) = temp_store();
        import(&store, "3", b"wav", Some("PASSED"));
        import(&store, "1", b"wav", Some("FAILED"));
        import(&store, "2", b"wav", None);
        import(&store, "4", b"", Some("FAILED"));
        store.save(&result("3", false, Some("PASSED")), false).unwrap();

        let graded = store.list_candidates(CandidateFilter::default()).unwrap();
        assert_eq!(graded, ["1", "3"]);

        let pending = store
            .list_candidates(CandidateFilter {
                skip_evaluated: true,
                ..CandidateFilter::default()
            })
            .unwrap();
        assert_eq!(pending, ["1"]);

        let all = store
            .list_candidates(CandidateFilter {
                include_ungraded: true,
                limit: Some(2),
                ..CandidateFilter::default()
            })
            .unwrap();
        assert_eq!(all, ["1", "2"]);
    }
}
