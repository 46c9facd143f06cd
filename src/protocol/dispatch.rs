use log::{debug, warn};

use crate::storage::{
    Comparison, Constraint, Division, Field, FieldMap, Predicate, Record, Store, Table, Value,
};

use super::{
    Reply,
    request::{AddRequest, DeleteRequest, GetRequest, Request, UpdateRequest},
    response::{ErrorCode, ErrorEnvelope},
};

/// Answers decoded requests. One handler is shared by every session.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> Reply;
}

/// Routes requests to the record store and turns the outcome into a reply.
///
/// Every failure caused by the request itself, or by the store while serving
/// it, becomes an [`ErrorEnvelope`]; nothing here ends a session.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Store,
}

type Assignments = Vec<(Field, Value)>;

impl Dispatcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn dispatch(&self, request: Request) -> Reply {
        let res = match request {
            Request::Get(req) => self.get(req).map(Reply::Records),
            Request::Add(req) => self.add(req).map(Reply::outcome),
            Request::Update(req) => self.update(req).map(Reply::outcome),
            Request::Delete(req) => self.delete(req).map(Reply::outcome),
        };

        res.unwrap_or_else(|envelope| {
            debug!("answering with {}", envelope.to_wire());
            Reply::error(envelope)
        })
    }

    fn get(&self, req: GetRequest) -> Result<Vec<Record>, ErrorEnvelope> {
        let table = parse_table(&req.table)?;

        let predicate = match req.filter {
            None => Predicate::default(),
            Some((comparison, constraints)) => {
                let constraints = allowed(table, constraints)?
                    .into_iter()
                    .map(|(field, value)| self.constraint(table, field, value, comparison))
                    .collect::<Result<Vec<Constraint>, ErrorEnvelope>>()?;
                Predicate::new(constraints)
                    .map_err(|e| ErrorEnvelope::new(ErrorCode::WrongArgument, e.to_string()))?
            }
        };

        self.store.get(table, &predicate).map_err(|e| {
            warn!("failed to read {table}: {e}");
            ErrorEnvelope::bare(ErrorCode::Unknown)
        })
    }

    fn add(&self, req: AddRequest) -> Result<bool, ErrorEnvelope> {
        let table = parse_table(&req.table)?;
        let mut fields = allowed(table, req.fields)?;
        fields.retain(|(field, _)| *field != Field::Id);

        let missing = table
            .fields()
            .iter()
            .filter(|f| **f != Field::Id)
            .find(|f| !fields.iter().any(|(field, _)| field == *f));
        if let Some(missing) = missing {
            return Err(ErrorEnvelope::new(ErrorCode::IncompleteFields, missing.as_str()));
        }

        self.resolve_team(table, &mut fields)?;
        check_values(&fields)?;

        Ok(self.store.add(table, &fields))
    }

    fn update(&self, req: UpdateRequest) -> Result<bool, ErrorEnvelope> {
        let table = parse_table(&req.table)?;
        if req.fields.is_empty() {
            return Err(ErrorEnvelope::bare(ErrorCode::IncompleteRequest));
        }

        let mut fields = allowed(table, req.fields)?;
        self.resolve_team(table, &mut fields)?;
        check_values(&fields)?;

        Ok(self.store.update(table, req.id, &fields))
    }

    fn delete(&self, req: DeleteRequest) -> Result<bool, ErrorEnvelope> {
        let table = parse_table(&req.table)?;
        Ok(self.store.delete(table, req.id))
    }

    /// One GET constraint. A team named by a player's `team_id` always
    /// matches that team's id exactly. Otherwise text is matched as a
    /// substring and everything else with the requested comparison.
    fn constraint(
        &self,
        table: Table,
        field: Field,
        value: Value,
        comparison: Comparison,
    ) -> Result<Constraint, ErrorEnvelope> {
        if let Some(id) = self.team_reference(table, field, &value)? {
            return Ok(Constraint::new(field, id, Comparison::Equal));
        }

        let comparison = match comparison {
            Comparison::Contains => Comparison::Contains,
            _ if value.is_text() => Comparison::Contains,
            other => other,
        };
        Ok(Constraint::new(field, value, comparison))
    }

    /// Replaces a team name given as a player's `team_id` with that team's id.
    fn resolve_team(&self, table: Table, fields: &mut Assignments) -> Result<(), ErrorEnvelope> {
        for (field, value) in fields.iter_mut() {
            if let Some(id) = self.team_reference(table, *field, value)? {
                *value = Value::Integer(id);
            }
        }

        Ok(())
    }

    /// The team id referenced by `value`, if it is a team name given as a
    /// player's `team_id`. The name must match exactly one team.
    fn team_reference(
        &self,
        table: Table,
        field: Field,
        value: &Value,
    ) -> Result<Option<i64>, ErrorEnvelope> {
        let (Table::Players, Field::TeamId, Value::Text(name)) = (table, field, value) else {
            return Ok(None);
        };

        let ids = self.store.find_team_ids(name).map_err(|e| {
            warn!("failed to look up team '{name}': {e}");
            ErrorEnvelope::bare(ErrorCode::Unknown)
        })?;
        match ids.as_slice() {
            [id] => Ok(Some(*id)),
            _ => Err(ErrorEnvelope::new(ErrorCode::UnknownTeam, name.as_str())),
        }
    }
}

impl Handler for Dispatcher {
    fn handle(&self, request: Request) -> Reply {
        self.dispatch(request)
    }
}

fn parse_table(name: &str) -> Result<Table, ErrorEnvelope> {
    name.parse::<Table>()
        .map_err(|e| ErrorEnvelope::new(ErrorCode::UnknownTable, format!("'{}'", e.0)))
}

/// Maps names onto the table's allow-list, rejecting unknown and repeated ones.
fn allowed(table: Table, map: FieldMap) -> Result<Assignments, ErrorEnvelope> {
    let mut out: Assignments = Vec::with_capacity(map.len());

    for (name, value) in map {
        let field = Field::lookup(table, &name)
            .ok_or_else(|| ErrorEnvelope::new(ErrorCode::WrongArgument, name.as_str()))?;
        if out.iter().any(|(f, _)| *f == field) {
            return Err(ErrorEnvelope::new(ErrorCode::WrongArgument, name));
        }
        out.push((field, value));
    }

    Ok(out)
}

/// Values written to the store must have their column's kind, and divisions
/// must be known labels.
fn check_values(fields: &Assignments) -> Result<(), ErrorEnvelope> {
    for (field, value) in fields {
        if field.kind() != value.kind() {
            return Err(ErrorEnvelope::new(ErrorCode::WrongArgument, field.as_str()));
        }
        if let (Field::Division, Value::Text(label)) = (field, value) {
            label
                .parse::<Division>()
                .map_err(|_| ErrorEnvelope::new(ErrorCode::WrongArgument, label.as_str()))?;
        }
    }

    Ok(())
}
