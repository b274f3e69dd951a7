//! Embedded schema migrations for depot.
//!
//! Migrations are applied in order by [`Database::migrate`](super::Database);
//! each entry is one version. Never edit an applied migration; append a new
//! one instead.

/// Ordered migration SQL. Index + 1 is the schema version.
pub const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    r#"
    CREATE TABLE accounts (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        username    TEXT NOT NULL UNIQUE,
        plan        TEXT NOT NULL DEFAULT 'hobbyist',
        created_at  TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE artifacts (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id    INTEGER NOT NULL REFERENCES accounts(id),
        name        TEXT NOT NULL UNIQUE,
        category    TEXT NOT NULL,
        description TEXT NOT NULL,
        size_mb     INTEGER NOT NULL,
        url         TEXT NOT NULL,
        icon_url    TEXT NOT NULL,
        downloads   INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_artifacts_owner ON artifacts(owner_id);
    CREATE UNIQUE INDEX idx_artifacts_name ON artifacts(name);

    CREATE TABLE media_assets (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        artifact_id INTEGER NOT NULL REFERENCES artifacts(id),
        url         TEXT NOT NULL
    );

    CREATE INDEX idx_media_artifact ON media_assets(artifact_id);

    CREATE TABLE reviews (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        artifact_id INTEGER NOT NULL REFERENCES artifacts(id),
        author_id   INTEGER NOT NULL REFERENCES accounts(id),
        rating      INTEGER NOT NULL,
        body        TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_reviews_artifact ON reviews(artifact_id);
    "#,
];
