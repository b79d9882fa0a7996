//! SQL schema for the fitm SQLite store.
//!
//! Rows in these tables are written by the submission paths; this crate only
//! reads them and rewrites `Links.global_cats` / `Links.global_summary`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS Users (
    id         TEXT PRIMARY KEY,          -- hyphenated UUID
    login_name TEXT NOT NULL UNIQUE,
    about      TEXT,
    pfp        TEXT,
    created    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS Links (
    id             INTEGER PRIMARY KEY,
    url            TEXT NOT NULL UNIQUE,
    submitted_by   TEXT NOT NULL,         -- login name
    submit_date    TEXT NOT NULL,
    global_cats    TEXT,                  -- derived; lower-case, comma-joined
    global_summary TEXT,                  -- derived
    img_url        TEXT
);

-- One row per (link, user); edits replace categories and last_updated.
CREATE TABLE IF NOT EXISTS Tags (
    id           INTEGER PRIMARY KEY,
    link_id      INTEGER NOT NULL REFERENCES Links(id),
    categories   TEXT NOT NULL,
    submitted_by TEXT NOT NULL,           -- login name
    last_updated TEXT NOT NULL,
    UNIQUE (link_id, submitted_by)
);

CREATE TABLE IF NOT EXISTS Summaries (
    id           INTEGER PRIMARY KEY,
    text         TEXT NOT NULL,
    link_id      INTEGER NOT NULL REFERENCES Links(id),
    submitted_by TEXT NOT NULL REFERENCES Users(id),
    last_updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "Link Likes" (
    id      INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES Users(id),
    link_id INTEGER NOT NULL REFERENCES Links(id),
    UNIQUE (user_id, link_id)
);

CREATE TABLE IF NOT EXISTS "Link Copies" (
    id      INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES Users(id),
    link_id INTEGER NOT NULL REFERENCES Links(id),
    UNIQUE (user_id, link_id)
);

CREATE TABLE IF NOT EXISTS "Summary Likes" (
    id         INTEGER PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES Users(id),
    summary_id INTEGER NOT NULL REFERENCES Summaries(id),
    UNIQUE (user_id, summary_id)
);

CREATE INDEX IF NOT EXISTS links_submitted_by_idx ON Links(submitted_by);
CREATE INDEX IF NOT EXISTS links_submit_date_idx  ON Links(submit_date);
CREATE INDEX IF NOT EXISTS tags_submitted_by_idx  ON Tags(submitted_by);
CREATE INDEX IF NOT EXISTS summaries_link_idx     ON Summaries(link_id);

-- ─── Category side indexes ──────────────────────────────────────────────────

CREATE VIRTUAL TABLE IF NOT EXISTS global_cats_fts
    USING fts5(link_id UNINDEXED, global_cats);

CREATE VIRTUAL TABLE IF NOT EXISTS tag_cats_fts
    USING fts5(tag_id UNINDEXED, categories);

CREATE TRIGGER IF NOT EXISTS links_fts_insert AFTER INSERT ON Links BEGIN
    INSERT INTO global_cats_fts (link_id, global_cats)
    VALUES (new.id, COALESCE(new.global_cats, ''));
END;

CREATE TRIGGER IF NOT EXISTS links_fts_update AFTER UPDATE OF global_cats ON Links BEGIN
    DELETE FROM global_cats_fts WHERE link_id = old.id;
    INSERT INTO global_cats_fts (link_id, global_cats)
    VALUES (new.id, COALESCE(new.global_cats, ''));
END;

CREATE TRIGGER IF NOT EXISTS links_fts_delete AFTER DELETE ON Links BEGIN
    DELETE FROM global_cats_fts WHERE link_id = old.id;
END;

CREATE TRIGGER IF NOT EXISTS tags_fts_insert AFTER INSERT ON Tags BEGIN
    INSERT INTO tag_cats_fts (tag_id, categories) VALUES (new.id, new.categories);
END;

CREATE TRIGGER IF NOT EXISTS tags_fts_update AFTER UPDATE OF categories ON Tags BEGIN
    DELETE FROM tag_cats_fts WHERE tag_id = old.id;
    INSERT INTO tag_cats_fts (tag_id, categories) VALUES (new.id, new.categories);
END;

CREATE TRIGGER IF NOT EXISTS tags_fts_delete AFTER DELETE ON Tags BEGIN
    DELETE FROM tag_cats_fts WHERE tag_id = old.id;
END;

PRAGMA user_version = 1;
"#;
