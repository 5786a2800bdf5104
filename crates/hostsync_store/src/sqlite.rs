//! SQLite-backed store.

use crate::error::StoreResult;
use crate::records::{
    Account, ChangeSet, GroupRecord, Grant, InputNotice, SharedField, Timestamp, UpdateNotice,
};
use crate::store::Store;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::debug;

/// Schema applied on open. Foreign keys carry every cascade the engine relies on.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    identity        TEXT PRIMARY KEY,
    credential      TEXT NOT NULL,
    timeout_minutes INTEGER NOT NULL,
    session         TEXT NOT NULL DEFAULT '',
    last_activity   INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS sync_groups (
    group_id TEXT PRIMARY KEY,
    app      TEXT NOT NULL,
    host     TEXT NOT NULL REFERENCES accounts(identity) ON DELETE CASCADE,
    created  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS sync_groups_app ON sync_groups(app);
CREATE TABLE IF NOT EXISTS memberships (
    group_id TEXT NOT NULL REFERENCES sync_groups(group_id) ON DELETE CASCADE,
    member   TEXT NOT NULL REFERENCES accounts(identity) ON DELETE CASCADE,
    PRIMARY KEY (group_id, member)
);
CREATE TABLE IF NOT EXISTS grants (
    group_id TEXT NOT NULL,
    field    TEXT NOT NULL,
    member   TEXT NOT NULL,
    PRIMARY KEY (group_id, field, member),
    FOREIGN KEY (group_id, member) REFERENCES memberships(group_id, member) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS shared_fields (
    group_id TEXT NOT NULL REFERENCES sync_groups(group_id) ON DELETE CASCADE,
    field    TEXT NOT NULL,
    data     TEXT NOT NULL,
    PRIMARY KEY (group_id, field)
);
CREATE TABLE IF NOT EXISTS update_notices (
    group_id  TEXT NOT NULL,
    field     TEXT NOT NULL,
    recipient TEXT NOT NULL,
    id        TEXT NOT NULL,
    time      INTEGER NOT NULL,
    PRIMARY KEY (group_id, field, recipient),
    FOREIGN KEY (group_id, recipient) REFERENCES memberships(group_id, member) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS input_notices (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL REFERENCES sync_groups(group_id) ON DELETE CASCADE,
    sender   TEXT NOT NULL,
    id       TEXT NOT NULL UNIQUE,
    payload  TEXT NOT NULL,
    time     INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS private_data (
    identity TEXT NOT NULL REFERENCES accounts(identity) ON DELETE CASCADE,
    key      TEXT NOT NULL,
    data     TEXT NOT NULL,
    PRIMARY KEY (identity, key)
);
";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        identity: row.get(0)?,
        credential: row.get(1)?,
        timeout_minutes: row.get(2)?,
        session: row.get(3)?,
        last_activity: row.get::<_, i64>(4)? as Timestamp,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        group_id: row.get(0)?,
        app: row.get(1)?,
        host: row.get(2)?,
        created: row.get::<_, i64>(3)? as Timestamp,
    })
}

/// A [`Store`] persisted in a SQLite database.
///
/// The connection is guarded by a mutex; every method runs one statement or
/// one transaction while holding it.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Store for SqliteStore {
    fn insert_account(&self, account: &Account) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO accounts (identity, credential, timeout_minutes, session, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.identity,
                account.credential,
                account.timeout_minutes,
                account.session,
                account.last_activity as i64
            ],
        )?;
        Ok(())
    }

    fn account(&self, identity: &str) -> StoreResult<Option<Account>> {
        let account = self
            .conn
            .lock()
            .query_row(
                "SELECT identity, credential, timeout_minutes, session, last_activity
                 FROM accounts WHERE identity = ?1",
                params![identity],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    fn set_session(
        &self,
        identity: &str,
        session: &str,
        last_activity: Timestamp,
    ) -> StoreResult<()> {
        self.conn.lock().execute(
            "UPDATE accounts SET session = ?2, last_activity = ?3 WHERE identity = ?1",
            params![identity, session, last_activity as i64],
        )?;
        Ok(())
    }

    fn touch_account(&self, identity: &str, last_activity: Timestamp) -> StoreResult<()> {
        self.conn.lock().execute(
            "UPDATE accounts SET last_activity = ?2 WHERE identity = ?1",
            params![identity, last_activity as i64],
        )?;
        Ok(())
    }

    fn delete_account(&self, identity: &str) -> StoreResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM accounts WHERE identity = ?1", params![identity])?;
        Ok(removed > 0)
    }

    fn insert_group(&self, group: &GroupRecord) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO sync_groups (group_id, app, host, created) VALUES (?1, ?2, ?3, ?4)",
            params![group.group_id, group.app, group.host, group.created as i64],
        )?;
        tx.execute(
            "INSERT INTO memberships (group_id, member) VALUES (?1, ?2)",
            params![group.group_id, group.host],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn group(&self, group_id: &str) -> StoreResult<Option<GroupRecord>> {
        let group = self
            .conn
            .lock()
            .query_row(
                "SELECT group_id, app, host, created FROM sync_groups WHERE group_id = ?1",
                params![group_id],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    fn groups_in_app(&self, app: &str) -> StoreResult<Vec<GroupRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT group_id, app, host, created FROM sync_groups
             WHERE app = ?1 ORDER BY group_id",
        )?;
        let groups = stmt
            .query_map(params![app], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn groups_hosted_by(&self, host: &str) -> StoreResult<Vec<GroupRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT group_id, app, host, created FROM sync_groups
             WHERE host = ?1 ORDER BY group_id",
        )?;
        let groups = stmt
            .query_map(params![host], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn groups_joined_by(&self, member: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT group_id FROM memberships WHERE member = ?1 ORDER BY group_id",
        )?;
        let groups = stmt
            .query_map(params![member], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(groups)
    }

    fn delete_group(&self, group_id: &str) -> StoreResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM sync_groups WHERE group_id = ?1", params![group_id])?;
        Ok(removed > 0)
    }

    fn insert_membership(&self, group_id: &str, member: &str) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO memberships (group_id, member) VALUES (?1, ?2)",
            params![group_id, member],
        )?;
        Ok(())
    }

    fn is_member(&self, group_id: &str, member: &str) -> StoreResult<bool> {
        let found = self
            .conn
            .lock()
            .query_row(
                "SELECT 1 FROM memberships WHERE group_id = ?1 AND member = ?2",
                params![group_id, member],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn members(&self, group_id: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT member FROM memberships WHERE group_id = ?1 ORDER BY member",
        )?;
        let members = stmt
            .query_map(params![group_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(members)
    }

    fn delete_membership(&self, group_id: &str, member: &str) -> StoreResult<bool> {
        let removed = self.conn.lock().execute(
            "DELETE FROM memberships WHERE group_id = ?1 AND member = ?2",
            params![group_id, member],
        )?;
        Ok(removed > 0)
    }

    fn commit(&self, changes: &ChangeSet) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let group_id = changes.group_id.as_str();

        {
            let mut upsert_field = tx.prepare_cached(
                "INSERT INTO shared_fields (group_id, field, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(group_id, field) DO UPDATE SET data = excluded.data",
            )?;
            for field in &changes.fields {
                upsert_field.execute(params![group_id, field.field, field.data])?;
            }

            let mut revoke = tx.prepare_cached(
                "DELETE FROM grants WHERE group_id = ?1 AND field = ?2 AND member = ?3",
            )?;
            for grant in &changes.revoke {
                revoke.execute(params![group_id, grant.field, grant.member])?;
            }

            let mut grant = tx.prepare_cached(
                "INSERT INTO grants (group_id, field, member) VALUES (?1, ?2, ?3)
                 ON CONFLICT(group_id, field, member) DO NOTHING",
            )?;
            for g in &changes.grant {
                grant.execute(params![group_id, g.field, g.member])?;
            }

            let mut notice = tx.prepare_cached(
                "INSERT INTO update_notices (group_id, field, recipient, id, time)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(group_id, field, recipient)
                 DO UPDATE SET id = excluded.id, time = excluded.time",
            )?;
            for n in &changes.notices {
                notice.execute(params![group_id, n.field, n.recipient, n.id, n.time as i64])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn grants_for_fields(&self, group_id: &str, fields: &[String]) -> StoreResult<Vec<Grant>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT field, member FROM grants WHERE group_id = ?1 AND field = ?2
             ORDER BY member",
        )?;
        let mut grants = Vec::new();
        for field in fields {
            let rows = stmt.query_map(params![group_id, field], |row| {
                Ok(Grant::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for grant in rows {
                grants.push(grant?);
            }
        }
        Ok(grants)
    }

    fn grants_for_member(&self, group_id: &str, member: &str) -> StoreResult<Vec<Grant>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT field, member FROM grants WHERE group_id = ?1 AND member = ?2
             ORDER BY field",
        )?;
        let grants = stmt
            .query_map(params![group_id, member], |row| {
                Ok(Grant::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(grants)
    }

    fn fields(&self, group_id: &str, names: &[String]) -> StoreResult<Vec<SharedField>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT data FROM shared_fields WHERE group_id = ?1 AND field = ?2",
        )?;
        let mut fields = Vec::new();
        for name in names {
            let data: Option<String> = stmt
                .query_row(params![group_id, name], |row| row.get(0))
                .optional()?;
            if let Some(data) = data {
                fields.push(SharedField {
                    field: name.clone(),
                    data,
                });
            }
        }
        Ok(fields)
    }

    fn update_notices(&self, group_id: &str, recipient: &str) -> StoreResult<Vec<UpdateNotice>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT field, recipient, id, time FROM update_notices
             WHERE group_id = ?1 AND recipient = ?2 ORDER BY time, field",
        )?;
        let notices = stmt
            .query_map(params![group_id, recipient], |row| {
                Ok(UpdateNotice {
                    field: row.get(0)?,
                    recipient: row.get(1)?,
                    id: row.get(2)?,
                    time: row.get::<_, i64>(3)? as Timestamp,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notices)
    }

    fn delete_update_notices(
        &self,
        group_id: &str,
        recipient: &str,
        ids: &[String],
    ) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached(
                "DELETE FROM update_notices WHERE group_id = ?1 AND recipient = ?2 AND id = ?3",
            )?;
            for id in ids {
                removed += stmt.execute(params![group_id, recipient, id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn insert_input_notice(&self, notice: &InputNotice) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO input_notices (group_id, sender, id, payload, time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                notice.group_id,
                notice.sender,
                notice.id,
                notice.payload,
                notice.time as i64
            ],
        )?;
        Ok(())
    }

    fn input_notices(&self, group_id: &str) -> StoreResult<Vec<InputNotice>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT group_id, sender, id, payload, time FROM input_notices
             WHERE group_id = ?1 ORDER BY time, seq",
        )?;
        let notices = stmt
            .query_map(params![group_id], |row| {
                Ok(InputNotice {
                    group_id: row.get(0)?,
                    sender: row.get(1)?,
                    id: row.get(2)?,
                    payload: row.get(3)?,
                    time: row.get::<_, i64>(4)? as Timestamp,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notices)
    }

    fn delete_input_notices(&self, group_id: &str, ids: &[String]) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare_cached("DELETE FROM input_notices WHERE group_id = ?1 AND id = ?2")?;
            for id in ids {
                removed += stmt.execute(params![group_id, id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn put_private(&self, identity: &str, key: &str, data: &str) -> StoreResult<()> {
        self.conn.lock().execute(
            "INSERT INTO private_data (identity, key, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(identity, key) DO UPDATE SET data = excluded.data",
            params![identity, key, data],
        )?;
        Ok(())
    }

    fn private(&self, identity: &str, key: &str) -> StoreResult<Option<String>> {
        let data = self
            .conn
            .lock()
            .query_row(
                "SELECT data FROM private_data WHERE identity = ?1 AND key = ?2",
                params![identity, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    fn delete_private(&self, identity: &str, key: &str) -> StoreResult<bool> {
        let removed = self.conn.lock().execute(
            "DELETE FROM private_data WHERE identity = ?1 AND key = ?2",
            params![identity, key],
        )?;
        Ok(removed > 0)
    }
}
