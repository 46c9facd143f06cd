use std::{path::PathBuf, time::Duration};

use log::{debug, warn};
use rusqlite::{Connection, params, params_from_iter};

use super::{Field, Predicate, Record, StorageError, Table, Value};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Teams (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE,
    state TEXT,
    city TEXT,
    division TEXT,
    arena TEXT,
    championships INTEGER,
    website TEXT
);
CREATE TABLE IF NOT EXISTS Players (
    id INTEGER PRIMARY KEY,
    first_name TEXT,
    last_name TEXT,
    number INTEGER,
    age INTEGER,
    rings INTEGER,
    nationality TEXT,
    team_id INTEGER,
    FOREIGN KEY(team_id) REFERENCES Teams(id)
);";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Access to the Teams and Players tables of one SQLite database.
///
/// No connection is kept between calls: every operation opens its own, runs a
/// single statement and drops it, so concurrent sessions only meet at the
/// database's own locking.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Opens the database at `path`, creating the tables if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self { path: path.into() };
        store.connect()?.execute_batch(SCHEMA)?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let open = || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&self.path)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(conn)
        };

        open().map_err(|source| StorageError::Open {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Every row of `table` matching `predicate`.
    pub fn get(&self, table: Table, predicate: &Predicate) -> Result<Vec<Record>, StorageError> {
        let columns = table
            .fields()
            .iter()
            .map(Field::as_str)
            .collect::<Vec<&str>>()
            .join(", ");
        let sql = match predicate.clause() {
            Some(clause) => format!("SELECT {columns} FROM {table} WHERE {clause};"),
            None => format!("SELECT {columns} FROM {table};"),
        };
        debug!("executing '{sql}' with {:?}", predicate.values());

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(predicate.values()), |row| {
            Record::from_row(table, row)
        })?;
        let records = rows.collect::<Result<Vec<Record>, _>>()?;
        Ok(records)
    }

    /// Ids of the teams named exactly `name`.
    pub fn find_team_ids(&self, name: &str) -> Result<Vec<i64>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id FROM Teams WHERE name = ?1;")?;
        let ids = stmt
            .query_map(params![name], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Inserts a row; any `id` in `fields` is skipped since the store assigns it.
    ///
    /// Storage failures (a duplicate team name, an unknown `team_id`) come back
    /// as `false`.
    pub fn add(&self, table: Table, fields: &[(Field, Value)]) -> bool {
        let (columns, values): (Vec<&str>, Vec<&Value>) = fields
            .iter()
            .filter(|(field, _)| *field != Field::Id)
            .map(|(field, value)| (field.as_str(), value))
            .unzip();
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders});",
            columns.join(", ")
        );

        self.change(&sql, values)
    }

    /// Applies `fields` to the row with `id`.
    ///
    /// Fails without touching the row when `fields` would change the id itself,
    /// or when no row has that id.
    pub fn update(&self, table: Table, id: i64, fields: &[(Field, Value)]) -> bool {
        let moves_id = fields
            .iter()
            .any(|(field, value)| *field == Field::Id && *value != Value::Integer(id));
        if moves_id {
            warn!("refusing to change the id of {table} row {id}");
            return false;
        }

        let assignments = fields
            .iter()
            .map(|(field, _)| format!("{} = ?", field.as_str()))
            .collect::<Vec<String>>()
            .join(", ");
        let sql = format!("UPDATE {table} SET {assignments} WHERE id = ?;");
        let id = Value::Integer(id);
        let values = fields.iter().map(|(_, value)| value).chain([&id]);

        self.change(&sql, values)
    }

    pub fn delete(&self, table: Table, id: i64) -> bool {
        let sql = format!("DELETE FROM {table} WHERE id = ?;");
        self.change(&sql, [&Value::Integer(id)])
    }

    /// Runs one mutating statement; `true` only if it touched at least one row.
    fn change<'a>(&self, sql: &str, values: impl IntoIterator<Item = &'a Value>) -> bool {
        debug!("executing '{sql}'");
        let res = self
            .connect()
            .and_then(|conn| Ok(conn.execute(sql, params_from_iter(values))?));

        match res {
            Ok(changed) => changed > 0,
            Err(e) => {
                warn!("statement failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::storage::{Comparison, Division, Team};

    fn store(temp: &TempDir) -> Store {
        Store::open(temp.path().join("roster.db")).unwrap()
    }

    fn bulls() -> Vec<(Field, Value)> {
        vec![
            (Field::Name, "Bulls".into()),
            (Field::State, "Illinois".into()),
            (Field::City, "Chicago".into()),
            (Field::Division, "Central".into()),
            (Field::Arena, "United Center".into()),
            (Field::Championships, 6.into()),
            (Field::Website, "nba.com/bulls".into()),
        ]
    }

    fn player(team_id: i64) -> Vec<(Field, Value)> {
        vec![
            (Field::FirstName, "Michael".into()),
            (Field::LastName, "Jordan".into()),
            (Field::Number, 23.into()),
            (Field::Age, 35.into()),
            (Field::Rings, 6.into()),
            (Field::Nationality, "USA".into()),
            (Field::TeamId, team_id.into()),
        ]
    }

    #[test]
    fn empty_store_returns_no_rows() {
        let temp = TempDir::new("empty").unwrap();
        let store = store(&temp);

        assert!(store.get(Table::Teams, &Predicate::default()).unwrap().is_empty());
        assert!(store.get(Table::Players, &Predicate::default()).unwrap().is_empty());
    }

    #[test]
    fn add_and_get_team() {
        let temp = TempDir::new("add").unwrap();
        let store = store(&temp);

        assert!(store.add(Table::Teams, &bulls()));
        let rows = store.get(Table::Teams, &Predicate::default()).unwrap();
        assert_eq!(
            rows,
            vec![Record::Team(Team {
                id: 1,
                name: "Bulls".into(),
                state: "Illinois".into(),
                city: "Chicago".into(),
                division: Division::Central,
                arena: "United Center".into(),
                championships: 6,
                website: "nba.com/bulls".into(),
            })]
        );
    }

    #[test]
    fn duplicate_name_fails() {
        let temp = TempDir::new("duplicate").unwrap();
        let store = store(&temp);

        assert!(store.add(Table::Teams, &bulls()));
        assert!(!store.add(Table::Teams, &bulls()));

        let predicate = Predicate::compare(vec![(Field::Name, "Bulls".into())], Comparison::Equal)
            .unwrap();
        assert_eq!(store.get(Table::Teams, &predicate).unwrap().len(), 1);
    }

    #[test]
    fn foreign_key_enforced() {
        let temp = TempDir::new("foreign").unwrap();
        let store = store(&temp);

        assert!(!store.add(Table::Players, &player(42)));
        assert!(store.add(Table::Teams, &bulls()));
        assert!(store.add(Table::Players, &player(1)));
    }

    #[test]
    fn add_ignores_supplied_id() {
        let temp = TempDir::new("id").unwrap();
        let store = store(&temp);

        let mut fields = bulls();
        fields.insert(0, (Field::Id, 99.into()));
        assert!(store.add(Table::Teams, &fields));
        assert_eq!(store.find_team_ids("Bulls").unwrap(), vec![1]);
    }

    #[test]
    fn update_cannot_move_id() {
        let temp = TempDir::new("update").unwrap();
        let store = store(&temp);
        store.add(Table::Teams, &bulls());

        assert!(!store.update(Table::Teams, 1, &[(Field::Id, 7.into())]));
        assert!(!store.update(
            Table::Teams,
            1,
            &[(Field::City, "Gary".into()), (Field::Id, 7.into())]
        ));
        assert_eq!(store.find_team_ids("Bulls").unwrap(), vec![1]);
        let rows = store.get(Table::Teams, &Predicate::default()).unwrap();
        let Record::Team(team) = &rows[0] else {
            panic!("expected a team")
        };
        assert_eq!(team.city, "Chicago");

        assert!(store.update(
            Table::Teams,
            1,
            &[(Field::Id, 1.into()), (Field::City, "Gary".into())]
        ));
        let rows = store.get(Table::Teams, &Predicate::default()).unwrap();
        let Record::Team(team) = &rows[0] else {
            panic!("expected a team")
        };
        assert_eq!(team.city, "Gary");
    }

    #[test]
    fn missing_rows_fail() {
        let temp = TempDir::new("missing").unwrap();
        let store = store(&temp);

        assert!(!store.update(Table::Teams, 5, &[(Field::City, "Gary".into())]));
        assert!(!store.delete(Table::Teams, 5));
    }

    #[test]
    fn delete_row() {
        let temp = TempDir::new("delete").unwrap();
        let store = store(&temp);
        store.add(Table::Teams, &bulls());

        assert!(store.delete(Table::Teams, 1));
        assert!(store.get(Table::Teams, &Predicate::default()).unwrap().is_empty());
    }

    #[test]
    fn filtered_get() {
        let temp = TempDir::new("filter").unwrap();
        let store = store(&temp);
        store.add(Table::Teams, &bulls());
        store.add(Table::Players, &player(1));

        let predicate = Predicate::new(vec![
            crate::storage::Constraint::new(Field::LastName, "ord", Comparison::Contains),
            crate::storage::Constraint::new(Field::Number, 30, Comparison::Less),
        ])
        .unwrap();
        assert_eq!(store.get(Table::Players, &predicate).unwrap().len(), 1);

        let predicate =
            Predicate::compare(vec![(Field::Number, 23.into())], Comparison::Greater).unwrap();
        assert!(store.get(Table::Players, &predicate).unwrap().is_empty());
    }
}
