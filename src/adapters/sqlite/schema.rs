use rusqlite::Connection;

use crate::error::EngineError;

pub fn initialize_schema(conn: &Connection) -> Result<(), EngineError> {
    conn.execute_batch(
        "
        -- Mailbox accounts. Transport credentials live with the sync
        -- collaborator; this engine only needs the classification flags
        -- and the storage counters.
        CREATE TABLE IF NOT EXISTS accounts (
            id                            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id                       INTEGER NOT NULL,
            email_address                 TEXT NOT NULL,
            is_active                     INTEGER DEFAULT 1,
            auto_classify                 INTEGER DEFAULT 0,
            custom_classification_prompt  TEXT,
            custom_review_prompt          TEXT,
            last_sync_error               TEXT,
            mailbox_storage_bytes         INTEGER,
            mailbox_storage_limit         INTEGER,
            created_at                    INTEGER NOT NULL,   -- unix epoch ms
            updated_at                    INTEGER NOT NULL,

            UNIQUE(user_id, email_address)
        );

        -- Message store. Bodies arrive already decoded from the MIME
        -- collaborator; address lists are JSON arrays.
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,   -- UUID
            account_id      INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            imap_uid        INTEGER,
            message_id      TEXT NOT NULL,      -- RFC 5322 Message-ID header
            thread_id       TEXT,
            from_name       TEXT,
            from_email      TEXT NOT NULL,
            to_addresses    TEXT DEFAULT '[]',  -- JSON array
            cc_addresses    TEXT DEFAULT '[]',  -- JSON array
            bcc_addresses   TEXT DEFAULT '[]',  -- JSON array
            subject         TEXT,
            date            INTEGER,            -- unix epoch ms
            snippet         TEXT,
            body_text       TEXT,
            body_html       TEXT,
            has_attachments INTEGER DEFAULT 0,
            is_read         INTEGER DEFAULT 0,
            is_starred      INTEGER DEFAULT 0,
            created_at      INTEGER NOT NULL,

            UNIQUE(account_id, imap_uid)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_account_date ON messages(account_id, date DESC);
        CREATE INDEX IF NOT EXISTS idx_messages_from         ON messages(from_email);

        CREATE TABLE IF NOT EXISTS attachments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            filename    TEXT NOT NULL,
            mime_type   TEXT,
            size_bytes  INTEGER,
            local_path  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id);

        -- One classification opinion per message. Absence of a row means
        -- the message sits in the Inbox view. final_label is free text on
        -- purpose: the sentinel 'Deleted' and ad hoc labels must stay
        -- representable, so there is no FK into categories.
        CREATE TABLE IF NOT EXISTS classifications (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id           TEXT NOT NULL UNIQUE REFERENCES messages(id) ON DELETE CASCADE,

            primary_label        TEXT,
            primary_confidence   REAL,
            primary_rationale    TEXT,

            secondary_label      TEXT,
            secondary_confidence REAL,
            secondary_rationale  TEXT,

            final_label          TEXT NOT NULL,
            final_reason         TEXT,
            decided_by           TEXT NOT NULL,  -- provenance tag
            decided_at           INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_classifications_label ON classifications(final_label);

        -- Sender-domain whitelist consulted by the rule evaluator.
        CREATE TABLE IF NOT EXISTS service_whitelist (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL,
            domain_pattern  TEXT NOT NULL,
            description     TEXT,
            is_active       INTEGER DEFAULT 1,
            created_at      INTEGER NOT NULL,

            UNIQUE(user_id, domain_pattern)
        );

        -- Label vocabulary. ai_instruction feeds the classifier prompts;
        -- is_system rows cannot be deleted.
        CREATE TABLE IF NOT EXISTS categories (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL,
            key             TEXT NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT,
            ai_instruction  TEXT NOT NULL,
            icon            TEXT,
            is_system       INTEGER DEFAULT 0,
            created_at      INTEGER NOT NULL,

            UNIQUE(user_id, key)
        );

        CREATE TABLE IF NOT EXISTS audit_logs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp       INTEGER NOT NULL,
            message_id      TEXT,
            action          TEXT NOT NULL,
            payload         TEXT,               -- JSON
            status          TEXT,               -- 'success' | 'error'
            error_message   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_logs(action, timestamp DESC);
    ",
    )?;

    Ok(())
}
