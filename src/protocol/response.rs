use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::storage::Record;

use super::{DELIMITER, FAILURE, SUCCESS};

/// Leading token of every error reply.
pub const ERROR_MARKER: &str = "ERROR";
/// Detail sent when an error carries none.
pub const NO_DETAIL: &str = "None";

/// Reply frame. GET answers with records, everything else with text: an
/// outcome token or an encoded [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Reply {
    Records(Vec<Record>),
    Text(String),
}

impl Reply {
    pub fn outcome(success: bool) -> Self {
        let token = if success { SUCCESS } else { FAILURE };
        Reply::Text(token.to_string())
    }

    pub fn error(envelope: ErrorEnvelope) -> Self {
        Reply::Text(envelope.to_wire())
    }

    /// The envelope, if this reply is an error.
    pub fn as_error(&self) -> Option<Result<ErrorEnvelope, UnknownErrorCode>> {
        match self {
            Reply::Text(text) if text.starts_with(ERROR_MARKER) => Some(text.parse()),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed error reply '{0}'")]
pub struct UnknownErrorCode(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Storage failure or anything unclassified.
    Unknown,
    IncompleteRequest,
    WrongArgument,
    UnknownTable,
    /// ADD without every column of the table.
    IncompleteFields,
    /// A team name that does not resolve to exactly one team.
    UnknownTeam,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "000",
            ErrorCode::IncompleteRequest => "001",
            ErrorCode::WrongArgument => "002",
            ErrorCode::UnknownTable => "003",
            ErrorCode::IncompleteFields => "004",
            ErrorCode::UnknownTeam => "005",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::IncompleteRequest => "INCOMPLETE REQUEST",
            ErrorCode::WrongArgument => "WRONG ARGUMENT",
            ErrorCode::UnknownTable => "UNKNOWN TABLE",
            ErrorCode::IncompleteFields => "INCOMPLETE DICT",
            ErrorCode::UnknownTeam => "TEAM NOT RECOGNIZED",
        }
    }
}

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "000" => Ok(ErrorCode::Unknown),
            "001" => Ok(ErrorCode::IncompleteRequest),
            "002" => Ok(ErrorCode::WrongArgument),
            "003" => Ok(ErrorCode::UnknownTable),
            "004" => Ok(ErrorCode::IncompleteFields),
            "005" => Ok(ErrorCode::UnknownTeam),
            other => Err(UnknownErrorCode(other.to_string())),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured error sent in place of a value. On the wire:
/// `ERROR~<REASON>~<CODE>~<DETAIL>`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("ERROR {reason}. Information: {detail}")]
pub struct ErrorEnvelope {
    pub reason: String,
    pub code: ErrorCode,
    pub detail: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            reason: code.reason().to_string(),
            code,
            detail: detail.into(),
        }
    }

    /// Envelope without detail.
    pub fn bare(code: ErrorCode) -> Self {
        Self::new(code, NO_DETAIL)
    }

    pub fn to_wire(&self) -> String {
        format!(
            "{ERROR_MARKER}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.reason,
            self.code.code(),
            self.detail
        )
    }
}

impl FromStr for ErrorEnvelope {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || UnknownErrorCode(s.to_string());
        let mut parts = s.splitn(4, DELIMITER);

        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(ERROR_MARKER), Some(reason), Some(code), Some(detail)) => Ok(Self {
                reason: reason.to_string(),
                code: code.parse().map_err(|_| malformed())?,
                detail: detail.to_string(),
            }),
            _ => Err(malformed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_format() {
        let envelope = ErrorEnvelope::new(ErrorCode::UnknownTable, "'Coaches'");
        assert_eq!(envelope.to_wire(), "ERROR~UNKNOWN TABLE~003~'Coaches'");
        assert_eq!(
            ErrorEnvelope::bare(ErrorCode::Unknown).to_wire(),
            "ERROR~UNKNOWN~000~None"
        );
    }

    #[test]
    fn envelope_parses_back() {
        let inputs = vec![
            ErrorEnvelope::bare(ErrorCode::IncompleteRequest),
            ErrorEnvelope::new(ErrorCode::WrongArgument, "abc"),
            ErrorEnvelope::new(ErrorCode::UnknownTeam, "Nets~Knicks"),
        ];

        for envelope in inputs {
            let parsed: ErrorEnvelope = envelope.to_wire().parse().unwrap();
            assert_eq!(parsed, envelope);
        }
    }

    #[test]
    fn malformed_envelopes() {
        assert!("ERROR~UNKNOWN~999~None".parse::<ErrorEnvelope>().is_err());
        assert!("ERROR~UNKNOWN".parse::<ErrorEnvelope>().is_err());
        assert!("SUCCESS".parse::<ErrorEnvelope>().is_err());
    }

    #[test]
    fn reply_error_detection() {
        let reply = Reply::error(ErrorEnvelope::bare(ErrorCode::IncompleteFields));
        assert_eq!(
            reply.as_error(),
            Some(Ok(ErrorEnvelope::bare(ErrorCode::IncompleteFields)))
        );
        assert_eq!(Reply::outcome(false).as_error(), None);
        assert_eq!(Reply::Records(vec![]).as_error(), None);
    }
}
