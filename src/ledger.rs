// Run ledger - persistent record of job executions and their steps
//
// Replaces an external job repository: every execution gets a monotonically
// increasing run id, and each step records its status and record counts in
// the same database as the data it moves.

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

/// Idempotent DDL for the ledger tables.
const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS job_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    error_message TEXT
);

CREATE TABLE IF NOT EXISTS step_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES job_runs(id),
    step_name TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    records_read INTEGER NOT NULL DEFAULT 0,
    records_written INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_step_runs_run ON step_runs (run_id, step_name);
";

pub fn setup_ledger(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

// ============================================================================
// STATUS TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Complete,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Complete => "COMPLETE",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(code: &str) -> Option<RunStatus> {
        match code {
            "RUNNING" => Some(RunStatus::Running),
            "COMPLETE" => Some(RunStatus::Complete),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Complete,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Running => "RUNNING",
            StepStatus::Complete => "COMPLETE",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(code: &str) -> Option<StepStatus> {
        match code {
            "RUNNING" => Some(StepStatus::Running),
            "COMPLETE" => Some(StepStatus::Complete),
            "FAILED" => Some(StepStatus::Failed),
            "SKIPPED" => Some(StepStatus::Skipped),
            _ => None,
        }
    }
}

// ============================================================================
// LEDGER RECORDS
// ============================================================================

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub job_name: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub run_id: i64,
    pub step_name: String,
    pub status: StepStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub records_read: i64,
    pub records_written: i64,
    pub error_message: Option<String>,
}

// ============================================================================
// RUN OPERATIONS
// ============================================================================

/// Open a new run for `job_name` and return its id. Ids increase
/// monotonically across every execution of every job.
pub fn start_run(conn: &Connection, job_name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO job_runs (job_name, status, started_at) VALUES (?1, ?2, ?3)",
        params![job_name, RunStatus::Running.as_str(), Utc::now().to_rfc3339()],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn complete_run(conn: &Connection, run_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE job_runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
        params![RunStatus::Complete.as_str(), Utc::now().to_rfc3339(), run_id],
    )?;

    Ok(())
}

pub fn fail_run(conn: &Connection, run_id: i64, message: &str) -> Result<()> {
    conn.execute(
        "UPDATE job_runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
        params![
            RunStatus::Failed.as_str(),
            Utc::now().to_rfc3339(),
            message,
            run_id,
        ],
    )?;

    Ok(())
}

/// Most recent run of `job_name`, if any.
pub fn latest_run(conn: &Connection, job_name: &str) -> Result<Option<RunRecord>> {
    let row = conn
        .query_row(
            "SELECT id, job_name, status, started_at, finished_at, error_message
             FROM job_runs WHERE job_name = ?1 ORDER BY id DESC LIMIT 1",
            params![job_name],
            run_from_row,
        )
        .optional()?;

    row.map(finish_run_record).transpose()
}

pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, job_name, status, started_at, finished_at, error_message
         FROM job_runs ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit as i64], run_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(finish_run_record).collect()
}

type RawRun = (i64, String, String, String, Option<String>, Option<String>);

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn finish_run_record(raw: RawRun) -> Result<RunRecord> {
    let (id, job_name, status, started_at, finished_at, error_message) = raw;
    let status = RunStatus::parse(&status)
        .ok_or_else(|| anyhow!("run {} has unknown status '{}'", id, status))?;

    Ok(RunRecord {
        id,
        job_name,
        status,
        started_at,
        finished_at,
        error_message,
    })
}

// ============================================================================
// STEP OPERATIONS
// ============================================================================

pub fn start_step(conn: &Connection, run_id: i64, step_name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO step_runs (run_id, step_name, status, started_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            run_id,
            step_name,
            StepStatus::Running.as_str(),
            Utc::now().to_rfc3339(),
        ],
    )?;

    Ok(())
}

pub fn complete_step(
    conn: &Connection,
    run_id: i64,
    step_name: &str,
    records_read: i64,
    records_written: i64,
) -> Result<()> {
    finish_step(
        conn,
        run_id,
        step_name,
        StepStatus::Complete,
        records_read,
        records_written,
        None,
    )
}

pub fn fail_step(
    conn: &Connection,
    run_id: i64,
    step_name: &str,
    records_read: i64,
    records_written: i64,
    message: &str,
) -> Result<()> {
    finish_step(
        conn,
        run_id,
        step_name,
        StepStatus::Failed,
        records_read,
        records_written,
        Some(message),
    )
}

/// Record a step that was not executed because a prior run already
/// completed it.
pub fn skip_step(conn: &Connection, run_id: i64, step_name: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO step_runs (run_id, step_name, status, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![run_id, step_name, StepStatus::Skipped.as_str(), now],
    )?;

    Ok(())
}

fn finish_step(
    conn: &Connection,
    run_id: i64,
    step_name: &str,
    status: StepStatus,
    records_read: i64,
    records_written: i64,
    message: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE step_runs
         SET status = ?1, finished_at = ?2, records_read = ?3,
             records_written = ?4, error_message = ?5
         WHERE run_id = ?6 AND step_name = ?7",
        params![
            status.as_str(),
            Utc::now().to_rfc3339(),
            records_read,
            records_written,
            message,
            run_id,
            step_name,
        ],
    )?;

    Ok(())
}

/// Status of a named step within a run, if the step was recorded.
pub fn step_status(conn: &Connection, run_id: i64, step_name: &str) -> Result<Option<StepStatus>> {
    let code: Option<String> = conn
        .query_row(
            "SELECT status FROM step_runs WHERE run_id = ?1 AND step_name = ?2",
            params![run_id, step_name],
            |row| row.get(0),
        )
        .optional()?;

    match code {
        None => Ok(None),
        Some(code) => {
            let status = StepStatus::parse(&code).ok_or_else(|| {
                anyhow!("step '{}' of run {} has unknown status '{}'", step_name, run_id, code)
            })?;
            Ok(Some(status))
        }
    }
}

pub fn steps_for_run(conn: &Connection, run_id: i64) -> Result<Vec<StepRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, step_name, status, started_at, finished_at,
                records_read, records_written, error_message
         FROM step_runs WHERE run_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(run_id, step_name, status, started_at, finished_at, records_read, records_written, error_message)| {
            let status = StepStatus::parse(&status).ok_or_else(|| {
                anyhow!("step '{}' of run {} has unknown status '{}'", step_name, run_id, status)
            })?;

            Ok(StepRecord {
                run_id,
                step_name,
                status,
                started_at,
                finished_at,
                records_read,
                records_written,
                error_message,
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();
        conn
    }

    #[test]
    fn test_run_ids_increase_monotonically() {
        let conn = test_conn();

        let first = start_run(&conn, "loader").unwrap();
        let second = start_run(&conn, "loader").unwrap();
        let third = start_run(&conn, "other-job").unwrap();

        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn test_run_lifecycle() {
        let conn = test_conn();

        let run_id = start_run(&conn, "loader").unwrap();
        let run = latest_run(&conn, "loader").unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        complete_run(&conn, run_id).unwrap();
        let run = latest_run(&conn, "loader").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Complete);
        assert!(run.finished_at.is_some());
        assert!(run.error_message.is_none());
    }

    #[test]
    fn test_failed_run_keeps_message() {
        let conn = test_conn();

        let run_id = start_run(&conn, "loader").unwrap();
        fail_run(&conn, run_id, "step 'x' failed: boom").unwrap();

        let run = latest_run(&conn, "loader").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("step 'x' failed: boom"));
    }

    #[test]
    fn test_latest_run_is_per_job() {
        let conn = test_conn();

        start_run(&conn, "loader").unwrap();
        start_run(&conn, "other-job").unwrap();

        assert_eq!(latest_run(&conn, "loader").unwrap().unwrap().job_name, "loader");
        assert!(latest_run(&conn, "missing-job").unwrap().is_none());
    }

    #[test]
    fn test_step_lifecycle() {
        let conn = test_conn();
        let run_id = start_run(&conn, "loader").unwrap();

        start_step(&conn, run_id, "load").unwrap();
        assert_eq!(
            step_status(&conn, run_id, "load").unwrap(),
            Some(StepStatus::Running)
        );

        complete_step(&conn, run_id, "load", 42, 42).unwrap();
        assert_eq!(
            step_status(&conn, run_id, "load").unwrap(),
            Some(StepStatus::Complete)
        );

        let steps = steps_for_run(&conn, run_id).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].records_read, 42);
        assert_eq!(steps[0].records_written, 42);
        assert!(steps[0].finished_at.is_some());
    }

    #[test]
    fn test_failed_and_skipped_steps() {
        let conn = test_conn();
        let run_id = start_run(&conn, "loader").unwrap();

        start_step(&conn, run_id, "load").unwrap();
        fail_step(&conn, run_id, "load", 10, 0, "parse error").unwrap();
        skip_step(&conn, run_id, "map").unwrap();

        let steps = steps_for_run(&conn, run_id).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].status, StepStatus::Failed);
        assert_eq!(steps[0].error_message.as_deref(), Some("parse error"));
        assert_eq!(steps[1].status, StepStatus::Skipped);

        assert_eq!(step_status(&conn, run_id, "missing").unwrap(), None);
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let conn = test_conn();

        let first = start_run(&conn, "loader").unwrap();
        complete_run(&conn, first).unwrap();
        let second = start_run(&conn, "loader").unwrap();

        let runs = recent_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);

        let limited = recent_runs(&conn, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, second);
    }
}
