use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "vsjx.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chapters(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    // `chapter` holds the chapter name, not its id: quizzes and submissions
    // join on names.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS quizzes(
            id TEXT PRIMARY KEY,
            chapter TEXT NOT NULL,
            question TEXT NOT NULL,
            options TEXT NOT NULL,
            correct_answer INTEGER NOT NULL,
            image_url TEXT,
            audio_url TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quizzes_chapter ON quizzes(chapter)",
        [],
    )?;

    // `score` has no declared type so legacy imports keep whatever value the
    // old backend held; readers coerce it.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            student_name TEXT NOT NULL,
            analysis TEXT NOT NULL,
            score,
            raw_results TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_submissions_question_ids(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions(student_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_created ON submissions(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_submissions_question_ids(conn: &Connection) -> anyhow::Result<()> {
    // Workspaces created before answers carried their question ids only have
    // the positional raw_results column.
    if table_has_column(conn, "submissions", "question_ids")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE submissions ADD COLUMN question_ids TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn open_db_adds_question_ids_to_old_submissions_table() {
        let ws = temp_workspace("vsjx-db-migrate");
        std::fs::create_dir_all(&ws).expect("mkdir");
        {
            let conn = Connection::open(ws.join(DB_FILE)).expect("open raw");
            conn.execute(
                "CREATE TABLE submissions(
                    id TEXT PRIMARY KEY,
                    student_name TEXT NOT NULL,
                    analysis TEXT NOT NULL,
                    score,
                    raw_results TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )
            .expect("create legacy table");
        }

        let conn = open_db(&ws).expect("open_db");
        assert!(table_has_column(&conn, "submissions", "question_ids").expect("pragma"));
        // Second open is a no-op.
        drop(conn);
        open_db(&ws).expect("reopen");
    }

    #[test]
    fn settings_roundtrip_overwrites() {
        let ws = temp_workspace("vsjx-db-settings");
        let conn = open_db(&ws).expect("open_db");
        assert!(settings_get_json(&conn, "setup.scoring").expect("get").is_none());
        settings_set_json(&conn, "setup.scoring", &serde_json::json!({ "passThreshold": 60 }))
            .expect("set");
        settings_set_json(&conn, "setup.scoring", &serde_json::json!({ "passThreshold": 75 }))
            .expect("set again");
        let v = settings_get_json(&conn, "setup.scoring").expect("get").expect("some");
        assert_eq!(v["passThreshold"], 75);
    }
}
