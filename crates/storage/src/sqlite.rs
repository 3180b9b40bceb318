use std::path::Path;

use rusqlite::{Connection, Transaction};

use rowedit_core::{ids::RowUid, record::Record};

use crate::error::StorageError;
use crate::traits::{DataMutationGateway, MutationRequest, MutationResult, RequestType, Row};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn checksum(payload: &[u8]) -> [u8; 32] {
    *blake3::hash(payload).as_bytes()
}

/// SQLite-backed store. Records are MessagePack blobs guarded by a blake3
/// checksum that is verified on every read.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Append records in order, assigning fresh uids.
    pub fn seed(&mut self, records: impl IntoIterator<Item = Record>) -> Result<Vec<RowUid>, StorageError> {
        let rows: Vec<Row> = records.into_iter().map(Row::new).collect();
        let uids = rows.iter().map(|r| r.uid).collect();
        let request = MutationRequest {
            request_type: RequestType::Save,
            rows,
            index: None,
        };
        self.execute(&request)?;
        Ok(uids)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn count_rows(tx: &Transaction) -> Result<usize, StorageError> {
    let n: i64 = tx.query_row("SELECT COUNT(*) FROM grid_rows", [], |row| row.get(0))?;
    Ok(n as usize)
}

fn insert_rows(tx: &Transaction, rows: &[Row], index: Option<usize>) -> Result<usize, StorageError> {
    let len = count_rows(tx)?;
    let index = index.unwrap_or(len).min(len);

    tx.execute(
        "UPDATE grid_rows SET position = position + ?1 WHERE position >= ?2",
        rusqlite::params![rows.len() as i64, index as i64],
    )?;

    for (offset, row) in rows.iter().enumerate() {
        let payload = row.record.to_msgpack()?;
        let result = tx.execute(
            "INSERT INTO grid_rows (uid, position, payload, checksum) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                row.uid.as_bytes().as_slice(),
                (index + offset) as i64,
                payload,
                checksum(&payload).as_slice(),
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StorageError::ConstraintViolation(format!(
                    "row {} already exists",
                    row.uid
                )));
            }
            Err(e) => return Err(StorageError::Sqlite(e)),
        }
    }
    Ok(index)
}

fn update_rows(tx: &Transaction, rows: &[Row]) -> Result<(), StorageError> {
    for row in rows {
        let payload = row.record.to_msgpack()?;
        let changed = tx.execute(
            "UPDATE grid_rows SET payload = ?1, checksum = ?2,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
             WHERE uid = ?3",
            rusqlite::params![payload, checksum(&payload).as_slice(), row.uid.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("row {}", row.uid)));
        }
    }
    Ok(())
}

fn delete_rows(tx: &Transaction, rows: &[Row]) -> Result<usize, StorageError> {
    let mut affected = 0;
    for row in rows {
        let changed = tx.execute(
            "DELETE FROM grid_rows WHERE uid = ?1",
            rusqlite::params![row.uid.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("row {}", row.uid)));
        }
        affected += changed;
    }
    // Close the gaps so positions stay dense.
    let remaining: Vec<Vec<u8>> = {
        let mut stmt = tx.prepare("SELECT uid FROM grid_rows ORDER BY position")?;
        let uids = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        uids
    };
    for (position, uid) in remaining.iter().enumerate() {
        tx.execute(
            "UPDATE grid_rows SET position = ?1 WHERE uid = ?2",
            rusqlite::params![position as i64, uid],
        )?;
    }
    Ok(affected)
}

impl DataMutationGateway for SqliteStore {
    fn execute(&mut self, request: &MutationRequest) -> Result<MutationResult, StorageError> {
        let tx = self.conn.transaction()?;
        let result = match request.request_type {
            RequestType::Save => {
                let index = insert_rows(&tx, &request.rows, request.index)?;
                MutationResult {
                    affected: request.rows.len(),
                    index: Some(index),
                }
            }
            RequestType::Update => {
                update_rows(&tx, &request.rows)?;
                MutationResult {
                    affected: request.rows.len(),
                    index: None,
                }
            }
            RequestType::Delete => MutationResult {
                affected: delete_rows(&tx, &request.rows)?,
                index: None,
            },
        };
        tx.commit()?;
        tracing::debug!(
            request = request.request_type.as_str(),
            affected = result.affected,
            "sqlite store applied request"
        );
        Ok(result)
    }

    fn query(&self) -> Result<Vec<Row>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, payload, checksum FROM grid_rows ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            let uid_bytes: Vec<u8> = row.get(0)?;
            let payload: Vec<u8> = row.get(1)?;
            let checksum_bytes: Vec<u8> = row.get(2)?;
            Ok((uid_bytes, payload, checksum_bytes))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (uid_bytes, payload, checksum_bytes) = row?;
            let uid = RowUid::from_bytes(to_array::<16>(uid_bytes, "uid")?);
            if checksum(&payload).as_slice() != checksum_bytes.as_slice() {
                return Err(StorageError::ChecksumMismatch { uid: uid.to_string() });
            }
            let record = Record::from_msgpack(&payload)?;
            result.push(Row { uid, record });
        }
        Ok(result)
    }

    fn row_count(&self) -> Result<usize, StorageError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM grid_rows", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
