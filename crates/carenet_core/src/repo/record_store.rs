//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/insert/update/delete/list APIs for facilities and
//!   individuals, including each side's association set.
//! - Provide a unit-of-work wrapper that commits cross-entity edits as one
//!   SQLite transaction.
//!
//! # Invariants
//! - Association sets are persisted in the `facility_individuals` join table;
//!   counterpart order is registration order (`link_seq`).
//! - Writing one side's set rewrites only that side's join rows and keeps the
//!   `link_seq` of links that survive.
//! - Deleting a record that still has join rows fails with a foreign key
//!   error; detachment is the caller's job.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::{Facility, FacilityId, Individual, IndividualId, RecordRef};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from record store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target record does not exist.
    NotFound(RecordRef),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(record) => write!(f, "{record} not found"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consumed by the association manager and registry service.
pub trait RecordStore {
    fn get_facility(&self, id: FacilityId) -> RepoResult<Option<Facility>>;
    fn get_individual(&self, id: IndividualId) -> RepoResult<Option<Individual>>;
    /// Inserts a facility with an empty association set and returns it with
    /// its assigned id.
    fn insert_facility(&self, name: &str) -> RepoResult<Facility>;
    /// Inserts an individual with an empty association set and returns it
    /// with its assigned id.
    fn insert_individual(&self, name: &str) -> RepoResult<Individual>;
    /// Persists name and association set of an existing facility and returns
    /// the read-back form.
    fn update_facility(&self, facility: &Facility) -> RepoResult<Facility>;
    /// Persists name and association set of an existing individual and
    /// returns the read-back form.
    fn update_individual(&self, individual: &Individual) -> RepoResult<Individual>;
    fn delete_facility(&self, id: FacilityId) -> RepoResult<()>;
    fn delete_individual(&self, id: IndividualId) -> RepoResult<()>;
    /// Lists every facility ordered by id.
    fn list_facilities(&self) -> RepoResult<Vec<Facility>>;
    /// Lists every individual ordered by id.
    fn list_individuals(&self) -> RepoResult<Vec<Individual>>;
    /// Runs `work` as one atomic unit: every write it performs commits
    /// together, or none does when it returns `Err`.
    ///
    /// Nested calls join the enclosing unit.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed record store owning one migrated connection.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Wraps a migrated connection, rejecting one whose schema is missing or
    /// out of date.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_store_connection_ready(&conn)?;
        Ok(Self { conn })
    }
}

impl RecordStore for SqliteRecordStore {
    fn get_facility(&self, id: FacilityId) -> RepoResult<Option<Facility>> {
        let name: Option<String> = self
            .conn
            .query_row("SELECT name FROM facilities WHERE id = ?1;", [id.0], |row| {
                row.get(0)
            })
            .optional()?;

        match name {
            Some(name) => Ok(Some(Facility {
                id,
                name,
                individual_ids: load_individual_ids(&self.conn, id)?,
            })),
            None => Ok(None),
        }
    }

    fn get_individual(&self, id: IndividualId) -> RepoResult<Option<Individual>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM individuals WHERE id = ?1;",
                [id.0],
                |row| row.get(0),
            )
            .optional()?;

        match name {
            Some(name) => Ok(Some(Individual {
                id,
                name,
                facility_ids: load_facility_ids(&self.conn, id)?,
            })),
            None => Ok(None),
        }
    }

    fn insert_facility(&self, name: &str) -> RepoResult<Facility> {
        self.conn
            .execute("INSERT INTO facilities (name) VALUES (?1);", [name])?;
        let id = parse_row_id(self.conn.last_insert_rowid(), "facilities.id")?;
        Ok(Facility::new(FacilityId(id), name))
    }

    fn insert_individual(&self, name: &str) -> RepoResult<Individual> {
        self.conn
            .execute("INSERT INTO individuals (name) VALUES (?1);", [name])?;
        let id = parse_row_id(self.conn.last_insert_rowid(), "individuals.id")?;
        Ok(Individual::new(IndividualId(id), name))
    }

    fn update_facility(&self, facility: &Facility) -> RepoResult<Facility> {
        self.atomically(|store| {
            let changed = store.conn.execute(
                "UPDATE facilities SET name = ?2 WHERE id = ?1;",
                params![facility.id.0, facility.name.as_str()],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(facility.id.into()));
            }

            let existing = load_individual_ids(&store.conn, facility.id)?;
            for stale in existing
                .into_iter()
                .filter(|individual| !facility.has_individual(*individual))
            {
                store.conn.execute(
                    "DELETE FROM facility_individuals
                     WHERE facility_id = ?1 AND individual_id = ?2;",
                    params![facility.id.0, stale.0],
                )?;
            }
            for individual in &facility.individual_ids {
                store.conn.execute(
                    "INSERT OR IGNORE INTO facility_individuals (facility_id, individual_id)
                     VALUES (?1, ?2);",
                    params![facility.id.0, individual.0],
                )?;
            }

            store
                .get_facility(facility.id)?
                .ok_or(RepoError::NotFound(facility.id.into()))
        })
    }

    fn update_individual(&self, individual: &Individual) -> RepoResult<Individual> {
        self.atomically(|store| {
            let changed = store.conn.execute(
                "UPDATE individuals SET name = ?2 WHERE id = ?1;",
                params![individual.id.0, individual.name.as_str()],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(individual.id.into()));
            }

            let existing = load_facility_ids(&store.conn, individual.id)?;
            for stale in existing
                .into_iter()
                .filter(|facility| !individual.has_facility(*facility))
            {
                store.conn.execute(
                    "DELETE FROM facility_individuals
                     WHERE facility_id = ?1 AND individual_id = ?2;",
                    params![stale.0, individual.id.0],
                )?;
            }
            for facility in &individual.facility_ids {
                store.conn.execute(
                    "INSERT OR IGNORE INTO facility_individuals (facility_id, individual_id)
                     VALUES (?1, ?2);",
                    params![facility.0, individual.id.0],
                )?;
            }

            store
                .get_individual(individual.id)?
                .ok_or(RepoError::NotFound(individual.id.into()))
        })
    }

    fn delete_facility(&self, id: FacilityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM facilities WHERE id = ?1;", [id.0])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.into()));
        }
        Ok(())
    }

    fn delete_individual(&self, id: IndividualId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM individuals WHERE id = ?1;", [id.0])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.into()));
        }
        Ok(())
    }

    fn list_facilities(&self) -> RepoResult<Vec<Facility>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM facilities ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut facilities = Vec::new();
        while let Some(row) = rows.next()? {
            let id = FacilityId(parse_row_id(row.get("id")?, "facilities.id")?);
            facilities.push(Facility {
                id,
                name: row.get("name")?,
                individual_ids: load_individual_ids(&self.conn, id)?,
            });
        }
        Ok(facilities)
    }

    fn list_individuals(&self) -> RepoResult<Vec<Individual>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM individuals ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut individuals = Vec::new();
        while let Some(row) = rows.next()? {
            let id = IndividualId(parse_row_id(row.get("id")?, "individuals.id")?);
            individuals.push(Individual {
                id,
                name: row.get("name")?,
                facility_ids: load_facility_ids(&self.conn, id)?,
            });
        }
        Ok(individuals)
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return work(self);
        }

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        // Dropping `tx` on the error path rolls the unit back.
        let value = work(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn load_individual_ids(conn: &Connection, facility: FacilityId) -> RepoResult<Vec<IndividualId>> {
    let mut stmt = conn.prepare(
        "SELECT individual_id
         FROM facility_individuals
         WHERE facility_id = ?1
         ORDER BY link_seq ASC;",
    )?;
    let mut rows = stmt.query([facility.0])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(IndividualId(parse_row_id(
            row.get(0)?,
            "facility_individuals.individual_id",
        )?));
    }
    Ok(ids)
}

fn load_facility_ids(conn: &Connection, individual: IndividualId) -> RepoResult<Vec<FacilityId>> {
    let mut stmt = conn.prepare(
        "SELECT facility_id
         FROM facility_individuals
         WHERE individual_id = ?1
         ORDER BY link_seq ASC;",
    )?;
    let mut rows = stmt.query([individual.0])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(FacilityId(parse_row_id(
            row.get(0)?,
            "facility_individuals.facility_id",
        )?));
    }
    Ok(ids)
}

fn parse_row_id(value: i64, column: &'static str) -> RepoResult<i64> {
    if value <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id value `{value}` in {column}"
        )));
    }
    Ok(value)
}

fn ensure_store_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = schema_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        ("facilities", &["id", "name"]),
        ("individuals", &["id", "name"]),
        (
            "facility_individuals",
            &["link_seq", "facility_id", "individual_id"],
        ),
    ];
    for &(table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{RecordStore, RepoError, SqliteRecordStore};
    use crate::db::open_db_in_memory;
    use crate::model::{FacilityId, IndividualId, RecordRef};
    use rusqlite::Connection;

    fn store() -> SqliteRecordStore {
        SqliteRecordStore::try_new(open_db_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteRecordStore::try_new(conn).unwrap_err();
        assert!(matches!(
            err,
            RepoError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn update_facility_keeps_link_order_of_surviving_links() {
        let store = store();
        let mut facility = store.insert_facility("General Hospital").unwrap();
        let first = store.insert_individual("first").unwrap();
        let second = store.insert_individual("second").unwrap();
        let third = store.insert_individual("third").unwrap();

        facility.link_individual(second.id);
        facility.link_individual(first.id);
        facility = store.update_facility(&facility).unwrap();
        assert_eq!(facility.individual_ids, vec![second.id, first.id]);

        facility.unlink_individual(second.id);
        facility.link_individual(third.id);
        let reloaded = store.update_facility(&facility).unwrap();
        assert_eq!(reloaded.individual_ids, vec![first.id, third.id]);
    }

    #[test]
    fn update_missing_individual_returns_not_found() {
        let store = store();
        let mut ghost = store.insert_individual("ghost").unwrap();
        store.delete_individual(ghost.id).unwrap();
        ghost.name = "renamed".to_string();

        let err = store.update_individual(&ghost).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(RecordRef::Individual(id)) if id == ghost.id));
    }

    #[test]
    fn delete_with_remaining_links_is_rejected_by_foreign_keys() {
        let store = store();
        let mut facility = store.insert_facility("General Hospital").unwrap();
        let individual = store.insert_individual("John Doe").unwrap();
        facility.link_individual(individual.id);
        store.update_facility(&facility).unwrap();

        let err = store.delete_facility(facility.id).unwrap_err();
        assert!(matches!(err, RepoError::Db(_)));
        assert!(store.get_facility(facility.id).unwrap().is_some());
    }

    #[test]
    fn linking_unknown_individual_fails_and_leaves_facility_unchanged() {
        let store = store();
        let mut facility = store.insert_facility("General Hospital").unwrap();
        facility.name = "renamed".to_string();
        facility.link_individual(IndividualId(42));

        assert!(store.update_facility(&facility).is_err());
        let reloaded = store.get_facility(facility.id).unwrap().unwrap();
        assert_eq!(reloaded.name, "General Hospital");
        assert!(reloaded.individual_ids.is_empty());
    }

    #[test]
    fn atomically_rolls_back_every_write_on_error() {
        let store = store();
        let result: Result<(), RepoError> = store.atomically(|store| {
            store.insert_facility("kept only on commit")?;
            Err(RepoError::NotFound(FacilityId(7).into()))
        });
        assert!(result.is_err());
        assert!(store.list_facilities().unwrap().is_empty());
    }

    #[test]
    fn nested_atomically_joins_outer_unit() {
        let store = store();
        let result: Result<(), RepoError> = store.atomically(|outer| {
            outer.atomically(|inner| inner.insert_individual("nested").map(|_| ()))?;
            Err(RepoError::InvalidData("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.list_individuals().unwrap().is_empty());
    }
}
