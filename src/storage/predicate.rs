use std::str::FromStr;

use thiserror::Error;

use super::{Field, Value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PredicateError {
    #[error("'{0}' can only be matched with contains when its value is text")]
    NotText(&'static str),

    #[error("unknown comparison '{0}'")]
    UnknownComparison(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Less,
    Greater,
    Contains,
}

impl Comparison {
    /// SQL operator, which doubles as the token sent in GET payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::Less => "<",
            Comparison::Greater => ">",
            Comparison::Contains => "LIKE",
        }
    }
}

impl FromStr for Comparison {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Comparison::Equal),
            "<" => Ok(Comparison::Less),
            ">" => Ok(Comparison::Greater),
            "LIKE" => Ok(Comparison::Contains),
            other => Err(PredicateError::UnknownComparison(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub field: Field,
    pub value: Value,
    pub comparison: Comparison,
}

impl Constraint {
    pub fn new(field: Field, value: impl Into<Value>, comparison: Comparison) -> Self {
        Self {
            field,
            value: value.into(),
            comparison,
        }
    }
}

/// Parameterized filter: one `column <op> ?` per constraint joined with `AND`,
/// and the values to bind, index for index.
///
/// The default predicate is unconstrained and matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    columns: Vec<Field>,
    comparisons: Vec<Comparison>,
    values: Vec<Value>,
}

impl Predicate {
    pub fn new(constraints: impl IntoIterator<Item = Constraint>) -> Result<Self, PredicateError> {
        let mut predicate = Self::default();

        for Constraint {
            field,
            value,
            comparison,
        } in constraints
        {
            let value = match (comparison, value) {
                (Comparison::Contains, Value::Text(s)) => Value::Text(format!("%{s}%")),
                (Comparison::Contains, Value::Integer(_)) => {
                    return Err(PredicateError::NotText(field.as_str()));
                }
                (_, value) => value,
            };

            predicate.columns.push(field);
            predicate.comparisons.push(comparison);
            predicate.values.push(value);
        }

        Ok(predicate)
    }

    /// Uses one comparison for every pair.
    pub fn compare(
        pairs: impl IntoIterator<Item = (Field, Value)>,
        comparison: Comparison,
    ) -> Result<Self, PredicateError> {
        Self::new(pairs.into_iter().map(|(field, value)| Constraint {
            field,
            value,
            comparison,
        }))
    }

    /// Substring match on every pair; fails if any value is not text.
    pub fn contains(pairs: impl IntoIterator<Item = (Field, Value)>) -> Result<Self, PredicateError> {
        Self::compare(pairs, Comparison::Contains)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Field] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The `WHERE` body, or `None` when unconstrained.
    pub fn clause(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let parts = self
            .columns
            .iter()
            .zip(&self.comparisons)
            .map(|(column, comparison)| format!("{} {} ?", column.as_str(), comparison.as_str()))
            .collect::<Vec<String>>();
        Some(parts.join(" AND "))
    }
}
