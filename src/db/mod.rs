//! Database module - SQLite storage for body samples and goals

use anyhow::Result;
use chrono::{FixedOffset, Offset, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::metrics::normalize::resolve_millis;
use crate::metrics::{Goals, RawSample, RawTimestamp};

const INSERT_SAMPLE: &str = "INSERT INTO samples (ts, sort_ms, weight, body_fat, muscle, waist, notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

fn ts_value(ts: &RawTimestamp) -> Value {
    match ts {
        RawTimestamp::Number(n) => Value::Real(*n),
        RawTimestamp::Text(s) => Value::Text(s.clone()),
    }
}

/// Database wrapper
pub struct Database {
    conn: Connection,
    /// Zone for naive text timestamps when computing `sort_ms`
    tz: FixedOffset,
}

impl Database {
    /// Open or create database; naive text timestamps are ordered as UTC
    pub fn open(path: &str) -> Result<Self> {
        Self::open_in(path, Utc.fix())
    }

    /// Open or create database, reading naive text timestamps in `tz`.
    ///
    /// Pass the same zone the metrics pipeline uses so "most recent" agrees
    /// with the calendar days it derives.
    pub fn open_in(path: &str, tz: FixedOffset) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn, tz };
        db.init_schema()?;
        debug!(path, offset = tz.local_minus_utc(), "database opened");
        Ok(db)
    }

    /// Resolved instant for ordering
    fn sort_millis(&self, ts: &RawTimestamp) -> Option<i64> {
        resolve_millis(ts, &self.tz)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        // ts keeps whatever the client wrote (epoch number or text);
        // sort_ms is the resolved instant, used only for ordering
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts NOT NULL,
                sort_ms INTEGER,
                weight REAL,
                body_fat REAL,
                muscle REAL,
                waist REAL,
                notes TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                weight_goal REAL,
                body_fat_goal REAL
            )",
            [],
        )?;

        Ok(())
    }

    /// Add new sample record
    pub fn add_sample(&self, sample: &RawSample) -> Result<i64> {
        self.conn.execute(
            INSERT_SAMPLE,
            params![
                ts_value(&sample.ts),
                self.sort_millis(&sample.ts),
                sample.weight,
                sample.body_fat,
                sample.muscle,
                sample.waist,
                sample.notes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Add many samples in one transaction
    pub fn import_samples(&mut self, samples: &[RawSample]) -> Result<usize> {
        let tz = self.tz;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_SAMPLE)?;
            for sample in samples {
                stmt.execute(params![
                    ts_value(&sample.ts),
                    resolve_millis(&sample.ts, &tz),
                    sample.weight,
                    sample.body_fat,
                    sample.muscle,
                    sample.waist,
                    sample.notes,
                ])?;
            }
        }
        tx.commit()?;
        info!(count = samples.len(), "samples imported");
        Ok(samples.len())
    }

    /// Get up to `limit` most recent samples, newest first
    pub fn list_recent(&self, limit: usize) -> Result<Vec<RawSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ts, weight, body_fat, muscle, waist, notes FROM samples
             ORDER BY sort_ms IS NULL, sort_ms DESC, id DESC LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let samples = stmt
            .query_map([limit], |row| {
                let ts = match row.get::<_, Value>(1)? {
                    Value::Integer(i) => RawTimestamp::Number(i as f64),
                    Value::Real(r) => RawTimestamp::Number(r),
                    Value::Text(t) => RawTimestamp::Text(t),
                    _ => RawTimestamp::Text(String::new()),
                };
                Ok(RawSample {
                    id: Some(row.get(0)?),
                    ts,
                    weight: row.get(2)?,
                    body_fat: row.get(3)?,
                    muscle: row.get(4)?,
                    waist: row.get(5)?,
                    notes: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = samples.len(), "samples loaded");
        Ok(samples)
    }

    /// Current goals, empty if never set
    pub fn get_goals(&self) -> Result<Goals> {
        let goals = self
            .conn
            .query_row(
                "SELECT weight_goal, body_fat_goal FROM goals WHERE id = 1",
                [],
                |row| {
                    Ok(Goals {
                        weight_goal: row.get(0)?,
                        body_fat_goal: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(goals.unwrap_or_default())
    }

    /// Replace the stored goals
    pub fn set_goals(&self, goals: &Goals) -> Result<()> {
        self.conn.execute(
            "INSERT INTO goals (id, weight_goal, body_fat_goal) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET weight_goal = excluded.weight_goal, body_fat_goal = excluded.body_fat_goal",
            params![goals.weight_goal, goals.body_fat_goal],
        )?;
        info!(?goals, "goals updated");
        Ok(())
    }
}
