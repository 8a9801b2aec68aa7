use rusqlite::{Connection, OptionalExtension};

use varsync_core::{Aggregate, AggregateId, ItemRef, Record, RecordFields, VariationId};

use crate::error::StorageError;
use crate::traits::{Capabilities, VariationStore};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

/// Access flags stored alongside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordAccess {
    pub can_write: bool,
    pub can_delete: bool,
    pub read_only: bool,
}

impl Default for RecordAccess {
    fn default() -> Self {
        Self {
            can_write: true,
            can_delete: true,
            read_only: false,
        }
    }
}

pub struct SqliteStore {
    conn: Connection,
    /// Actor on whose behalf this store acts; locks held by anyone else block writes.
    actor: String,
    /// Elevated actors write through other actors' locks.
    elevated: bool,
}

const RECORD_COLUMNS: &str =
    "record_id, aggregate_id, name, display_name, datasource, replacement, hide_component, sort_key";

type RawRecord = (Vec<u8>, Vec<u8>, String, String, Option<String>, Option<String>, bool, i64);

fn raw_record(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_record(raw: RawRecord) -> Result<Record, StorageError> {
    let (id_bytes, aggregate_bytes, name, display_name, datasource, replacement, hide_component, sort_key) = raw;
    Ok(Record {
        id: VariationId::from_bytes(to_array::<16>(id_bytes, "record_id")?),
        aggregate_id: AggregateId::from_bytes(to_array::<16>(aggregate_bytes, "aggregate_id")?),
        name,
        display_name,
        datasource: datasource.as_deref().and_then(ItemRef::parse),
        replacement: replacement.as_deref().and_then(ItemRef::parse),
        hide_component,
        sort_key,
    })
}

impl SqliteStore {
    pub fn open(path: &str, actor: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            actor: actor.to_string(),
            elevated: false,
        })
    }

    pub fn open_in_memory(actor: &str) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            actor: actor.to_string(),
            elevated: false,
        })
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Make an item resolvable to a canonical path.
    pub fn register_item(&mut self, item_id: &str, path: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO items (item_id, path) VALUES (?1, ?2)
             ON CONFLICT(item_id) DO UPDATE SET path = excluded.path",
            rusqlite::params![item_id, path],
        )?;
        Ok(())
    }

    pub fn set_record_access(&mut self, id: VariationId, access: RecordAccess) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE records SET can_write = ?1, can_delete = ?2, read_only = ?3 WHERE record_id = ?4",
            rusqlite::params![
                access.can_write,
                access.can_delete,
                access.read_only,
                id.as_bytes().as_slice(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Lock a record for `holder`, or unlock it with `None`.
    pub fn set_lock(&mut self, id: VariationId, holder: Option<&str>) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE records SET locked_by = ?1 WHERE record_id = ?2",
            rusqlite::params![holder, id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn set_aggregate_access(
        &mut self,
        aggregate_id: AggregateId,
        can_add: bool,
        can_delete: bool,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE aggregates SET can_add = ?1, can_delete = ?2 WHERE aggregate_id = ?3",
            rusqlite::params![can_add, can_delete, aggregate_id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(aggregate_id.to_string()));
        }
        Ok(())
    }

    fn record_flag(&self, id: VariationId, column: &str) -> Result<bool, StorageError> {
        let sql = format!("SELECT {column} FROM records WHERE record_id = ?1");
        self.conn
            .query_row(&sql, rusqlite::params![id.as_bytes().as_slice()], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn aggregate_flag(&self, aggregate_id: AggregateId, column: &str) -> Result<bool, StorageError> {
        let sql = format!("SELECT {column} FROM aggregates WHERE aggregate_id = ?1");
        self.conn
            .query_row(&sql, rusqlite::params![aggregate_id.as_bytes().as_slice()], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StorageError::NotFound(aggregate_id.to_string()))
    }

    fn read_aggregate(&self, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Aggregate>, StorageError> {
        let row = self
            .conn
            .query_row(sql, [param], |row| {
                let id_bytes: Vec<u8> = row.get(0)?;
                let owner_key: String = row.get(1)?;
                let original: Option<Vec<u8>> = row.get(2)?;
                Ok((id_bytes, owner_key, original))
            })
            .optional()?;

        match row {
            Some((id_bytes, owner_key, original)) => {
                let original_ref = match original {
                    Some(bytes) => Some(VariationId::from_bytes(to_array::<16>(bytes, "original_ref")?)),
                    None => None,
                };
                Ok(Some(Aggregate {
                    id: AggregateId::from_bytes(to_array::<16>(id_bytes, "aggregate_id")?),
                    owner_key,
                    original_ref,
                }))
            }
            None => Ok(None),
        }
    }
}

impl Capabilities for SqliteStore {
    fn can_add_child(&self, aggregate_id: AggregateId) -> Result<bool, StorageError> {
        self.aggregate_flag(aggregate_id, "can_add")
    }

    fn can_delete(&self, id: VariationId) -> Result<bool, StorageError> {
        self.record_flag(id, "can_delete")
    }

    fn can_write(&self, id: VariationId) -> Result<bool, StorageError> {
        self.record_flag(id, "can_write")
    }

    fn is_locked(&self, id: VariationId) -> Result<bool, StorageError> {
        let holder: Option<String> = self
            .conn
            .query_row(
                "SELECT locked_by FROM records WHERE record_id = ?1",
                rusqlite::params![id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        Ok(holder.is_some_and(|holder| holder != self.actor))
    }

    fn is_read_only(&self, id: VariationId) -> Result<bool, StorageError> {
        self.record_flag(id, "read_only")
    }

    fn can_delete_aggregate(&self, aggregate_id: AggregateId) -> Result<bool, StorageError> {
        self.aggregate_flag(aggregate_id, "can_delete")
    }
}

impl VariationStore for SqliteStore {
    fn list_records(&self, aggregate_id: AggregateId) -> Result<Vec<Record>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE aggregate_id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![aggregate_id.as_bytes().as_slice()], raw_record)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(decode_record(row?)?);
        }
        Ok(result)
    }

    fn get_record(&self, id: VariationId) -> Result<Option<Record>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1");
        let raw = self
            .conn
            .query_row(&sql, rusqlite::params![id.as_bytes().as_slice()], raw_record)
            .optional()?;
        raw.map(decode_record).transpose()
    }

    fn create_record(
        &mut self,
        aggregate_id: AggregateId,
        id: VariationId,
        name: &str,
        sort_key: i64,
        fields: &RecordFields,
    ) -> Result<Record, StorageError> {
        if !self.can_add_child(aggregate_id)? {
            return Err(StorageError::PermissionDenied(format!(
                "cannot add variations under {aggregate_id}"
            )));
        }

        let result = self.conn.execute(
            "INSERT INTO records (record_id, aggregate_id, name, display_name, datasource, replacement, hide_component, sort_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id.as_bytes().as_slice(),
                aggregate_id.as_bytes().as_slice(),
                name,
                fields.display_name,
                fields.datasource.as_ref().map(ItemRef::as_str),
                fields.replacement.as_ref().map(ItemRef::as_str),
                fields.hide_component,
                sort_key,
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                return Err(StorageError::IdConflict(id.to_string()));
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(StorageError::NameConflict {
                    aggregate_id: aggregate_id.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(StorageError::Sqlite(e)),
        }

        tracing::debug!(record = %id.short(), name, sort_key, "record created");
        Ok(Record {
            id,
            aggregate_id,
            name: name.to_string(),
            display_name: fields.display_name.clone(),
            datasource: fields.datasource.clone(),
            replacement: fields.replacement.clone(),
            hide_component: fields.hide_component,
            sort_key,
        })
    }

    fn delete_record(&mut self, id: VariationId) -> Result<(), StorageError> {
        if !self.can_delete(id)? {
            return Err(StorageError::PermissionDenied(format!("cannot delete {id}")));
        }
        self.conn.execute(
            "DELETE FROM records WHERE record_id = ?1",
            rusqlite::params![id.as_bytes().as_slice()],
        )?;
        tracing::debug!(record = %id.short(), "record deleted");
        Ok(())
    }

    fn update_record(&mut self, id: VariationId, fields: &RecordFields) -> Result<(), StorageError> {
        if !self.can_write(id)? || self.is_read_only(id)? {
            return Err(StorageError::PermissionDenied(format!("cannot write {id}")));
        }
        if !self.elevated && self.is_locked(id)? {
            return Err(StorageError::Locked(id.to_string()));
        }
        self.conn.execute(
            "UPDATE records SET display_name = ?1, datasource = ?2, replacement = ?3, hide_component = ?4
             WHERE record_id = ?5",
            rusqlite::params![
                fields.display_name,
                fields.datasource.as_ref().map(ItemRef::as_str),
                fields.replacement.as_ref().map(ItemRef::as_str),
                fields.hide_component,
                id.as_bytes().as_slice(),
            ],
        )?;
        tracing::debug!(record = %id.short(), "record updated");
        Ok(())
    }

    fn set_original_ref(
        &mut self,
        aggregate_id: AggregateId,
        id: VariationId,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE aggregates SET original_ref = ?1 WHERE aggregate_id = ?2",
            rusqlite::params![id.as_bytes().as_slice(), aggregate_id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(aggregate_id.to_string()));
        }
        Ok(())
    }

    fn resolve_path(&self, item: &ItemRef) -> Result<Option<String>, StorageError> {
        let path = self
            .conn
            .query_row(
                "SELECT path FROM items WHERE item_id = ?1",
                rusqlite::params![item.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path)
    }

    fn get_aggregate(&self, aggregate_id: AggregateId) -> Result<Option<Aggregate>, StorageError> {
        let id_bytes = aggregate_id.as_bytes().to_vec();
        self.read_aggregate(
            "SELECT aggregate_id, owner_key, original_ref FROM aggregates WHERE aggregate_id = ?1",
            &id_bytes,
        )
    }

    fn find_aggregate(&self, owner_key: &str) -> Result<Option<Aggregate>, StorageError> {
        self.read_aggregate(
            "SELECT aggregate_id, owner_key, original_ref FROM aggregates WHERE owner_key = ?1",
            &owner_key,
        )
    }

    fn create_aggregate(&mut self, owner_key: &str) -> Result<Aggregate, StorageError> {
        let id = AggregateId::new();
        self.conn.execute(
            "INSERT INTO aggregates (aggregate_id, owner_key) VALUES (?1, ?2)",
            rusqlite::params![id.as_bytes().as_slice(), owner_key],
        )?;
        tracing::debug!(aggregate = %id.short(), owner_key, "aggregate created");
        Ok(Aggregate {
            id,
            owner_key: owner_key.to_string(),
            original_ref: None,
        })
    }

    fn delete_aggregate(&mut self, aggregate_id: AggregateId) -> Result<(), StorageError> {
        if !self.can_delete_aggregate(aggregate_id)? {
            return Err(StorageError::PermissionDenied(format!("cannot delete {aggregate_id}")));
        }
        self.conn.execute(
            "DELETE FROM aggregates WHERE aggregate_id = ?1",
            rusqlite::params![aggregate_id.as_bytes().as_slice()],
        )?;
        Ok(())
    }
}
