use std::str::FromStr;

use bincode::{decode_from_slice, encode_to_vec};
use thiserror::Error;

use crate::storage::{Comparison, FieldMap};

use super::{
    DELIMITER,
    response::{ErrorCode, ErrorEnvelope},
    transport::{TransportError, blob_config},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized command '{0}'")]
pub struct UnknownCommand(pub String);

/// First frame of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTag {
    Get,
    Add,
    Update,
    Delete,
}

impl CommandTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandTag::Get => "GET",
            CommandTag::Add => "ADD",
            CommandTag::Update => "UPDATE",
            CommandTag::Delete => "DELETE",
        }
    }
}

impl FromStr for CommandTag {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(CommandTag::Get),
            "ADD" => Ok(CommandTag::Add),
            "UPDATE" => Ok(CommandTag::Update),
            "DELETE" => Ok(CommandTag::Delete),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub table: String,
    /// `None` selects every row.
    pub filter: Option<(Comparison, FieldMap)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub table: String,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub table: String,
    pub id: i64,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub table: String,
    pub id: i64,
}

/// A decoded request. Table names are kept as sent; the dispatcher resolves
/// them so an unknown table can be answered with an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get(GetRequest),
    Add(AddRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

const SEPARATOR: u8 = DELIMITER as u8;

impl Request {
    pub fn tag(&self) -> CommandTag {
        match self {
            Request::Get(_) => CommandTag::Get,
            Request::Add(_) => CommandTag::Add,
            Request::Update(_) => CommandTag::Update,
            Request::Delete(_) => CommandTag::Delete,
        }
    }

    /// Payload frame for this request: `~`-separated text fields with the
    /// encoded field map, if any, always last.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let config = blob_config();
        let parts: Vec<Vec<u8>> = match self {
            Request::Get(GetRequest { table, filter: None }) => vec![table.clone().into_bytes()],
            Request::Get(GetRequest {
                table,
                filter: Some((comparison, constraints)),
            }) => vec![
                table.clone().into_bytes(),
                comparison.as_str().as_bytes().to_vec(),
                encode_to_vec(constraints, config)?,
            ],
            Request::Add(AddRequest { table, fields }) => {
                vec![table.clone().into_bytes(), encode_to_vec(fields, config)?]
            }
            Request::Update(UpdateRequest { table, id, fields }) => vec![
                table.clone().into_bytes(),
                id.to_string().into_bytes(),
                encode_to_vec(fields, config)?,
            ],
            Request::Delete(DeleteRequest { table, id }) => {
                vec![table.clone().into_bytes(), id.to_string().into_bytes()]
            }
        };

        Ok(parts.join(&SEPARATOR))
    }

    /// Reads the payload frame that followed `tag`.
    pub fn decode(tag: CommandTag, payload: &[u8]) -> Result<Self, ErrorEnvelope> {
        let parts = match tag {
            CommandTag::Get | CommandTag::Update => 3,
            CommandTag::Add | CommandTag::Delete => 2,
        };
        let mut parts = payload.splitn(parts, |b| *b == SEPARATOR);
        let table = text(parts.next().unwrap_or_default())?.to_string();

        let request = match tag {
            CommandTag::Get => {
                let filter = match (parts.next(), parts.next()) {
                    (None, _) => None,
                    (Some(comparison), Some(constraints)) => {
                        let comparison = text(comparison)?;
                        let comparison: Comparison = comparison
                            .parse()
                            .map_err(|_| ErrorEnvelope::new(ErrorCode::WrongArgument, comparison))?;
                        Some((comparison, field_map(constraints)?))
                    }
                    (Some(_), None) => return Err(ErrorEnvelope::bare(ErrorCode::IncompleteRequest)),
                };
                Request::Get(GetRequest { table, filter })
            }
            CommandTag::Add => {
                let fields = parts.next().ok_or_else(incomplete)?;
                Request::Add(AddRequest {
                    table,
                    fields: field_map(fields)?,
                })
            }
            CommandTag::Update => {
                let id = parse_id(parts.next().ok_or_else(incomplete)?)?;
                let fields = parts.next().ok_or_else(incomplete)?;
                Request::Update(UpdateRequest {
                    table,
                    id,
                    fields: field_map(fields)?,
                })
            }
            CommandTag::Delete => {
                let id = parse_id(parts.next().ok_or_else(incomplete)?)?;
                Request::Delete(DeleteRequest { table, id })
            }
        };

        Ok(request)
    }
}

fn incomplete() -> ErrorEnvelope {
    ErrorEnvelope::bare(ErrorCode::IncompleteRequest)
}

fn text(part: &[u8]) -> Result<&str, ErrorEnvelope> {
    std::str::from_utf8(part)
        .map_err(|_| ErrorEnvelope::new(ErrorCode::WrongArgument, String::from_utf8_lossy(part)))
}

fn parse_id(part: &[u8]) -> Result<i64, ErrorEnvelope> {
    let raw = text(part)?;
    raw.trim()
        .parse()
        .map_err(|_| ErrorEnvelope::new(ErrorCode::WrongArgument, raw))
}

fn field_map(part: &[u8]) -> Result<FieldMap, ErrorEnvelope> {
    let (map, _) = decode_from_slice(part, blob_config())
        .map_err(|e| ErrorEnvelope::new(ErrorCode::WrongArgument, e.to_string()))?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(request: Request) {
        let payload = request.encode().unwrap();
        assert_eq!(Request::decode(request.tag(), &payload).unwrap(), request);
    }

    #[test]
    fn request_payloads_roundtrip() {
        roundtrip(Request::Get(GetRequest {
            table: "Teams".into(),
            filter: None,
        }));
        roundtrip(Request::Get(GetRequest {
            table: "players".into(),
            filter: Some((
                Comparison::Less,
                FieldMap::new().with("age", 30).with("team_id", "Bulls"),
            )),
        }));
        roundtrip(Request::Update(UpdateRequest {
            table: "Players".into(),
            id: 3,
            fields: FieldMap::new().with("nationality", "a~b~c").with("number", 126),
        }));
        roundtrip(Request::Delete(DeleteRequest {
            table: "Teams".into(),
            id: -1,
        }));
    }

    #[test]
    fn field_map_roundtrip_keeps_order() {
        let fields = FieldMap::new()
            .with("website", "nba.com/bulls")
            .with("championships", 6)
            .with("name", "Bulls");
        let payload = Request::Add(AddRequest {
            table: "Teams".into(),
            fields: fields.clone(),
        })
        .encode()
        .unwrap();

        let Request::Add(AddRequest { fields: decoded, .. }) =
            Request::decode(CommandTag::Add, &payload).unwrap()
        else {
            panic!("expected an add request")
        };
        let names: Vec<&str> = decoded.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["website", "championships", "name"]);
        assert_eq!(decoded, fields);
    }

    #[test]
    fn command_tags() {
        for tag in [
            CommandTag::Get,
            CommandTag::Add,
            CommandTag::Update,
            CommandTag::Delete,
        ] {
            assert_eq!(tag.as_str().parse::<CommandTag>(), Ok(tag));
        }
        assert!("get".parse::<CommandTag>().is_err());
        assert!("DROP".parse::<CommandTag>().is_err());
    }

    #[test]
    fn incomplete_payloads() {
        let inputs: Vec<(CommandTag, &[u8])> = vec![
            (CommandTag::Add, &b"Teams"[..]),
            (CommandTag::Update, &b"Teams~3"[..]),
            (CommandTag::Update, &b"Teams"[..]),
            (CommandTag::Delete, &b"Teams"[..]),
            (CommandTag::Get, &b"Teams~="[..]),
        ];

        for (tag, payload) in inputs {
            let err = Request::decode(tag, payload).unwrap_err();
            assert_eq!(err.code, ErrorCode::IncompleteRequest, "{payload:?}");
        }
    }

    #[test]
    fn wrong_arguments() {
        let err = Request::decode(CommandTag::Delete, b"Teams~three").unwrap_err();
        assert_eq!(err, ErrorEnvelope::new(ErrorCode::WrongArgument, "three"));

        let err = Request::decode(CommandTag::Update, b"Teams~1~\xff\xff").unwrap_err();
        assert_eq!(err.code, ErrorCode::WrongArgument);

        let err = Request::decode(CommandTag::Get, b"Teams~!=~").unwrap_err();
        assert_eq!(err, ErrorEnvelope::new(ErrorCode::WrongArgument, "!="));
    }
}
