use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};
use rusqlite::types::Type;
use thiserror::Error;

use super::Table;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("division '{0}' does not exist")]
pub struct DivisionError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Conference {
    Western,
    Eastern,
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conference::Western => f.write_str("Western"),
            Conference::Eastern => f.write_str("Eastern"),
        }
    }
}

/// One of the six divisions. The conference is always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Division {
    Pacific,
    Southwest,
    Northwest,
    Atlantic,
    Central,
    Southeast,
}

impl Division {
    pub fn as_str(&self) -> &'static str {
        match self {
            Division::Pacific => "Pacific",
            Division::Southwest => "Southwest",
            Division::Northwest => "Northwest",
            Division::Atlantic => "Atlantic",
            Division::Central => "Central",
            Division::Southeast => "Southeast",
        }
    }

    pub fn conference(&self) -> Conference {
        match self {
            Division::Pacific | Division::Southwest | Division::Northwest => Conference::Western,
            Division::Atlantic | Division::Central | Division::Southeast => Conference::Eastern,
        }
    }
}

impl FromStr for Division {
    type Err = DivisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pacific" => Ok(Division::Pacific),
            "Southwest" => Ok(Division::Southwest),
            "Northwest" => Ok(Division::Northwest),
            "Atlantic" => Ok(Division::Atlantic),
            "Central" => Ok(Division::Central),
            "Southeast" => Ok(Division::Southeast),
            other => Err(DivisionError(other.to_string())),
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub city: String,
    pub division: Division,
    pub arena: String,
    pub championships: i64,
    pub website: String,
}

impl Team {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let division: String = row.get(4)?;
        let division = division
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            state: row.get(2)?,
            city: row.get(3)?,
            division,
            arena: row.get(5)?,
            championships: row.get(6)?,
            website: row.get(7)?,
        })
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Player {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub number: i64,
    pub age: i64,
    pub rings: i64,
    pub nationality: String,
    pub team_id: i64,
}

impl Player {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            number: row.get(3)?,
            age: row.get(4)?,
            rings: row.get(5)?,
            nationality: row.get(6)?,
            team_id: row.get(7)?,
        })
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Record {
    Team(Team),
    Player(Player),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Team(_) => Table::Teams,
            Record::Player(_) => Table::Players,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::Team(team) => team.id,
            Record::Player(player) => player.id,
        }
    }

    /// Decodes a row selected with the columns of [`Table::fields`], in order.
    pub(crate) fn from_row(table: Table, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        match table {
            Table::Teams => Team::from_row(row).map(Record::Team),
            Table::Players => Player::from_row(row).map(Record::Player),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Team(team) => write!(f, "{team}"),
            Record::Player(player) => write!(f, "{player}"),
        }
    }
}
