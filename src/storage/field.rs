use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};
use rusqlite::types::{ToSql, ToSqlOutput};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown table '{0}'")]
pub struct UnknownTable(pub String);

/// Tables held by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Teams,
    Players,
}

const TEAM_FIELDS: [Field; 8] = [
    Field::Id,
    Field::Name,
    Field::State,
    Field::City,
    Field::Division,
    Field::Arena,
    Field::Championships,
    Field::Website,
];

const PLAYER_FIELDS: [Field; 8] = [
    Field::Id,
    Field::FirstName,
    Field::LastName,
    Field::Number,
    Field::Age,
    Field::Rings,
    Field::Nationality,
    Field::TeamId,
];

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Teams => "Teams",
            Table::Players => "Players",
        }
    }

    /// Columns of the table, in storage order.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Table::Teams => &TEAM_FIELDS,
            Table::Players => &PLAYER_FIELDS,
        }
    }

    /// Upper-cases the first character and lower-cases the rest, so `tEAMS`
    /// and `teams` both name [`Table::Teams`].
    pub fn normalize(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        }
    }
}

impl FromStr for Table {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Table::normalize(s).as_str() {
            "Teams" => Ok(Table::Teams),
            "Players" => Ok(Table::Players),
            other => Err(UnknownTable(other.to_string())),
        }
    }
}

impl AsRef<str> for Table {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
}

/// Every column either table exposes. Column identifiers only ever reach SQL
/// through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Name,
    State,
    City,
    Division,
    Arena,
    Championships,
    Website,
    FirstName,
    LastName,
    Number,
    Age,
    Rings,
    Nationality,
    TeamId,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::State => "state",
            Field::City => "city",
            Field::Division => "division",
            Field::Arena => "arena",
            Field::Championships => "championships",
            Field::Website => "website",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Number => "number",
            Field::Age => "age",
            Field::Rings => "rings",
            Field::Nationality => "nationality",
            Field::TeamId => "team_id",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Id
            | Field::Championships
            | Field::Number
            | Field::Age
            | Field::Rings
            | Field::TeamId => FieldKind::Integer,
            _ => FieldKind::Text,
        }
    }

    /// Looks `name` up in the allow-list of `table`.
    pub fn lookup(table: Table, name: &str) -> Option<Field> {
        table.fields().iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar carried by constraints and field assignments.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Value {
    Integer(i64),
    Text(String),
}

impl Value {
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Integer(_) => FieldKind::Integer,
            Value::Text(_) => FieldKind::Text,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Ordered `name -> value` association list.
///
/// This is the structured payload of both constraint maps (GET) and field maps
/// (ADD/UPDATE). Names are not validated here; the dispatcher checks them
/// against [`Field::lookup`] before anything reaches the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct FieldMap(Vec<(String, Value)>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name`, replacing an existing value in place so ordering holds.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
