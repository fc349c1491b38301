//! v001 -- Initial schema creation.
//!
//! Creates `accounts`, `users`, `pets`, `chats` and `messages`.  Listings and
//! messages carry an autoincrement `seq` that records insertion order, used
//! to break ties between equal timestamps.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Accounts (credentials, owned by the auth side)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    uid             TEXT PRIMARY KEY NOT NULL,
    email           TEXT NOT NULL UNIQUE,     -- stored lowercased
    password_hash   TEXT NOT NULL,            -- Argon2id PHC string
    created_at      TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- User profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    uid              TEXT PRIMARY KEY NOT NULL,
    name             TEXT NOT NULL,
    email            TEXT NOT NULL,
    role             TEXT NOT NULL,            -- Buyer | Seller | Admin
    favorite_pet_ids TEXT NOT NULL DEFAULT '[]', -- JSON array of listing ids
    created_at       TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Pet listings (seller_id deliberately not a foreign key)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS pets (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    pet_type    TEXT NOT NULL,
    breed       TEXT NOT NULL,
    age         INTEGER NOT NULL CHECK (age >= 0),
    description TEXT NOT NULL,
    image_url   TEXT,
    seller_id   TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pets_created ON pets(created_at DESC, seq DESC);
CREATE INDEX IF NOT EXISTS idx_pets_type_breed ON pets(pet_type, breed);

-- ----------------------------------------------------------------
-- Chat sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id               TEXT PRIMARY KEY NOT NULL, -- "<low>_<high>"
    participant_low  TEXT NOT NULL,
    participant_high TEXT NOT NULL,
    participant_info TEXT NOT NULL,             -- JSON {uid: {name, role}}
    last_message     TEXT,                      -- JSON {text, senderId, timestamp}
    last_message_ts  TEXT,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_low ON chats(participant_low, last_message_ts);
CREATE INDEX IF NOT EXISTS idx_chats_high ON chats(participant_high, last_message_ts);

-- ----------------------------------------------------------------
-- Messages (child log of a chat)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    chat_id     TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    text        TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts ON messages(chat_id, timestamp, seq);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
