use filedb::Database;
use serde_json::{json, Value};

fn open_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_default(dir.path()).unwrap();
    (dir, db)
}

fn seed_task_with_stage(db: &Database) {
    db.prepare("INSERT INTO tasks (id, name) VALUES (?, ?)")
        .run(&[json!("t1"), json!("Demo")])
        .unwrap();
    db.prepare("INSERT INTO stages (task_id, idx, name) VALUES (?, ?, ?)")
        .run(&[json!("t1"), json!(0), json!("Plan")])
        .unwrap();
}

#[test]
fn test_insert_and_list() {
    let (_dir, db) = open_db();
    seed_task_with_stage(&db);

    let stages = db
        .prepare("SELECT * FROM stages WHERE task_id = ? ORDER BY idx")
        .all(&[json!("t1")])
        .unwrap();

    assert_eq!(stages.len(), 1);
    let stage = &stages[0];
    assert_eq!(stage["task_id"], json!("t1"));
    assert_eq!(stage["idx"], json!(0));
    assert_eq!(stage["name"], json!("Plan"));
    assert_eq!(stage["done"], json!(0));
}

#[test]
fn test_advance_stage() {
    let (_dir, db) = open_db();
    seed_task_with_stage(&db);

    let run = db
        .prepare("UPDATE stages SET done = 1 WHERE task_id = ? AND idx = ?")
        .run(&[json!("t1"), json!(0)])
        .unwrap();
    assert_eq!(run.changes, 1);

    let pending = db
        .prepare("SELECT * FROM stages WHERE task_id = ? AND done = 0")
        .get(&[json!("t1")])
        .unwrap();
    assert_eq!(pending, None);
}

#[test]
fn test_unknown_table() {
    let (_dir, db) = open_db();

    for sql in [
        "SELECT * FROM reminders WHERE id = ?",
        "UPDATE reminders SET done = 1 WHERE id = ?",
        "not an instruction at all",
    ] {
        let stmt = db.prepare(sql);
        assert!(stmt.all(&[json!("x")]).unwrap().is_empty());
        assert_eq!(stmt.get(&[json!("x")]).unwrap(), None);
        assert_eq!(stmt.run(&[json!("x")]).unwrap().changes, 0);
    }
}

#[test]
fn test_count_fallback() {
    let (_dir, db) = open_db();
    let insert = db.prepare("INSERT INTO tasks (id, status, channel_id) VALUES (?, ?, ?)");
    insert.run(&[json!("a"), json!("active"), json!("c1")]).unwrap();
    insert.run(&[json!("b"), json!("active"), json!("c2")]).unwrap();
    insert.run(&[json!("c"), json!("done"), json!("c1")]).unwrap();

    let filtered = db
        .prepare("SELECT COUNT(*) AS n FROM tasks WHERE status = ?")
        .get(&[json!("active")])
        .unwrap()
        .unwrap();
    assert_eq!(filtered["n"], json!(2));

    // (status, channel_id) is not a declared count shape
    let fallback = db
        .prepare("SELECT COUNT(*) AS n FROM tasks WHERE status = ? AND channel_id = ?")
        .get(&[json!("active"), json!("c1")])
        .unwrap()
        .unwrap();
    assert_eq!(fallback["n"], json!(3));
}

#[test]
fn test_count_through_all() {
    let (_dir, db) = open_db();
    seed_task_with_stage(&db);

    let rows = db.prepare("SELECT COUNT(*) FROM tasks").all(&[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["count"], json!(1));
}

#[test]
fn test_insert_generates_key() {
    let (_dir, db) = open_db();

    let run = db
        .prepare("INSERT INTO issues (title, reporter_id) VALUES (?, ?)")
        .run(&[json!("Bot offline"), json!("u1")])
        .unwrap();
    assert_eq!(run.changes, 1);
    let key = run.inserted_key.unwrap();

    let issue = db
        .prepare("SELECT * FROM issues WHERE id = ?")
        .get(&[key.to_value()])
        .unwrap()
        .unwrap();
    assert_eq!(issue["title"], json!("Bot offline"));
    assert_eq!(issue["status"], json!("open"));
    assert_eq!(issue["severity"], json!("normal"));
}

#[test]
fn test_settings_require_key() {
    let (_dir, db) = open_db();

    let result = db
        .prepare("INSERT INTO settings (value) VALUES (?)")
        .run(&[json!("orphan")]);
    assert!(matches!(result, Err(filedb::Error::MissingPrimaryKey { .. })));

    db.prepare("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .run(&[json!("motd"), json!("hello")])
        .unwrap();
    let ignored = db
        .prepare("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .run(&[json!("motd"), json!("ignored")])
        .unwrap();
    assert_eq!(ignored.changes, 0);

    let setting = db
        .prepare("SELECT value FROM settings WHERE key = ?")
        .get(&[json!("motd")])
        .unwrap()
        .unwrap();
    assert_eq!(setting["value"], json!("hello"));
}

#[test]
fn test_sort_and_limit_from_last_param() {
    let (_dir, db) = open_db();
    let insert = db.prepare("INSERT INTO changelogs (id, version, created_at) VALUES (?, ?, ?)");
    for (id, version, at) in [
        ("a", "1.0", "2024-01-01T00:00:00.000Z"),
        ("b", "1.1", "2024-02-01T00:00:00.000Z"),
        ("c", "1.2", "2024-03-01T00:00:00.000Z"),
    ] {
        insert.run(&[json!(id), json!(version), json!(at)]).unwrap();
    }

    let latest = db
        .prepare("SELECT * FROM changelogs ORDER BY created_at DESC LIMIT ?")
        .all(&[json!(2)])
        .unwrap();
    let versions: Vec<&Value> = latest.iter().map(|r| &r["version"]).collect();
    assert_eq!(versions, vec![&json!("1.2"), &json!("1.1")]);
}

#[test]
fn test_update_pending_stage_by_filter() {
    let (_dir, db) = open_db();
    let insert = db.prepare("INSERT INTO stages (task_id, idx, name) VALUES (?, ?, ?)");
    for (idx, name) in [(0, "Plan"), (1, "Build"), (2, "Ship")] {
        insert.run(&[json!("t1"), json!(idx), json!(name)]).unwrap();
    }

    let advance = db.prepare("UPDATE stages SET done = 1 WHERE task_id = ? AND done = 0");
    assert_eq!(advance.run(&[json!("t1")]).unwrap().changes, 1);
    assert_eq!(advance.run(&[json!("t1")]).unwrap().changes, 1);

    let next = db
        .prepare("SELECT * FROM stages WHERE task_id = ? AND done = 0 ORDER BY idx")
        .get(&[json!("t1")])
        .unwrap()
        .unwrap();
    assert_eq!(next["name"], json!("Ship"));
}

#[test]
fn test_bulk_delete_by_parent() {
    let (_dir, db) = open_db();
    let insert = db.prepare("INSERT INTO stages (task_id, idx) VALUES (?, ?)");
    for (task, idx) in [("t1", 0), ("t1", 1), ("t2", 0)] {
        insert.run(&[json!(task), json!(idx)]).unwrap();
    }

    let run = db
        .prepare("DELETE FROM stages WHERE task_id = ?")
        .run(&[json!("t1")])
        .unwrap();
    assert_eq!(run.changes, 2);
    assert_eq!(db.load_from_disk("stages").unwrap().len(), 1);
}

#[test]
fn test_unrecognized_shapes_are_empty() {
    let (_dir, db) = open_db();
    seed_task_with_stage(&db);

    // `name` is not filterable on tasks
    let rows = db
        .prepare("SELECT * FROM tasks WHERE name = ?")
        .all(&[json!("Demo")])
        .unwrap();
    assert!(rows.is_empty());

    // missing parameter
    let rows = db.prepare("SELECT * FROM tasks WHERE status = ?").all(&[]).unwrap();
    assert!(rows.is_empty());

    // OR is not a supported shape
    let stmt = db.prepare("SELECT * FROM tasks WHERE id = ? OR id = ?");
    assert!(stmt.is_noop());
    assert!(stmt.all(&[json!("t1"), json!("t2")]).unwrap().is_empty());
}

#[test]
fn test_schema_declarations_are_acknowledged() {
    let (_dir, db) = open_db();
    db.exec(
        "CREATE TABLE IF NOT EXISTS tasks (id TEXT PRIMARY KEY, name TEXT);
         CREATE TABLE IF NOT EXISTS stages (task_id TEXT, idx INTEGER);",
    )
    .unwrap();

    let run = db
        .prepare("CREATE INDEX IF NOT EXISTS idx_stages ON stages (task_id)")
        .run(&[])
        .unwrap();
    assert_eq!(run.changes, 0);
}
