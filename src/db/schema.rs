//! Database schema and migrations for filevault.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    email       TEXT NOT NULL UNIQUE,
    password    TEXT NOT NULL,           -- Argon2 hash
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: file records
    r#"
-- parent_id NULL is the root of the owner's tree.
-- Folders never carry a blob, files and images always do.
CREATE TABLE files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES users(id),
    name          TEXT NOT NULL,
    file_type     TEXT NOT NULL CHECK (file_type IN ('file', 'folder', 'image')),
    is_public     INTEGER NOT NULL DEFAULT 0,
    parent_id     INTEGER REFERENCES files(id),
    blob_locator  TEXT,
    created_at    TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK ((file_type = 'folder') = (blob_locator IS NULL))
);

CREATE INDEX idx_files_owner_parent ON files(user_id, parent_id, id);
CREATE INDEX idx_files_type ON files(file_type);
"#,
];
