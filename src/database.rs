use anyhow::Result;
use libsql::{Builder, Connection};
use std::{path::Path, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id             TEXT    PRIMARY KEY,
    email          TEXT    UNIQUE NOT NULL,
    password_hash  TEXT    NOT NULL,
    created_at     TEXT    NOT NULL
);
"#;

const CREATE_CATEGORIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id    TEXT PRIMARY KEY,
    name  TEXT UNIQUE NOT NULL,
    icon  TEXT NOT NULL
);
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id               TEXT    PRIMARY KEY,
    amount           REAL    NOT NULL,
    description      TEXT    NOT NULL,
    date             TEXT    NOT NULL,
    is_ai_identified INTEGER NOT NULL DEFAULT 0,
    user_id          TEXT    NOT NULL,
    category_id      TEXT    NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);
"#;

const CREATE_TRANSACTIONS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
"#;

/// The fixed reference category set, seeded at startup.
pub const DEFAULT_CATEGORIES: [(&str, &str); 10] = [
    ("Food", "🍔"),
    ("Transport", "🚗"),
    ("Entertainment", "🎬"),
    ("Rent", "🏠"),
    ("Utilities", "💡"),
    ("Shopping", "🛍️"),
    ("Health", "🏥"),
    ("Education", "📚"),
    ("Subscriptions", "📱"),
    ("Other", "📁"),
];

pub type Db = Arc<RwLock<Connection>>;

/// Open (or create) the main database and ensure schema + seed data.
pub async fn init_main_db(data_dir: &str) -> Result<Db> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = Path::new(data_dir).join("fintrack.db");
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;

    conn.execute(CREATE_USERS_TABLE, ()).await?;
    conn.execute(CREATE_CATEGORIES_TABLE, ()).await?;
    conn.execute(CREATE_TRANSACTIONS_TABLE, ()).await?;
    conn.execute(CREATE_TRANSACTIONS_INDEX, ()).await?;

    seed_categories(&conn).await?;

    Ok(Arc::new(RwLock::new(conn)))
}

/// Idempotent: existing rows keep their ids, re-running is a no-op.
pub async fn seed_categories(conn: &Connection) -> Result<()> {
    for (name, icon) in DEFAULT_CATEGORIES {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT OR IGNORE INTO categories (id, name, icon) VALUES (?, ?, ?)",
            (id.as_str(), name, icon),
        )
        .await?;
    }
    Ok(())
}
