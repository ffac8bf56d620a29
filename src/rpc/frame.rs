//! Wire frames
//!
//! Every call is a sequence of newline-delimited JSON frames:
//!
//! ```text
//! client -> server   {"frame":"open","method":"store"}
//! client -> server   {"frame":"property", ...}      (store only, repeated)
//! server -> client   {"frame":"property", ...}      (repeated)
//! server -> client   {"frame":"close","code":"ok","message":""}
//! ```
//!
//! The server ends every call with exactly one `close` frame.

use crate::property::{Property, Query};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two streaming calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Client-streaming Property in, Property out, one response per request
    Store,
    /// One Query in, streamed Property out
    Search,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Open {
        method: Method,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<Query>,
    },
    Property(Property),
    Close(Status),
}

impl Frame {
    pub fn open_store() -> Self {
        Frame::Open {
            method: Method::Store,
            query: None,
        }
    }

    pub fn open_search(query: Query) -> Self {
        Frame::Open {
            method: Method::Search,
            query: Some(query),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Open { .. } => "open",
            Frame::Property(_) => "property",
            Frame::Close(_) => "close",
        }
    }
}

/// Call outcome status codes (gRPC names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    Cancelled,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    Internal,
    Unavailable,
    DataLoss,
    Unimplemented,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::Cancelled => "cancelled",
            StatusCode::InvalidArgument => "invalid_argument",
            StatusCode::DeadlineExceeded => "deadline_exceeded",
            StatusCode::NotFound => "not_found",
            StatusCode::Internal => "internal",
            StatusCode::Unavailable => "unavailable",
            StatusCode::DataLoss => "data_loss",
            StatusCode::Unimplemented => "unimplemented",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trailing status of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    /// `Ok(())` for an ok status, the remote error otherwise
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::Status {
                code: self.code,
                message: self.message,
            })
        }
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::MissingKey
            | Error::Conversion(_)
            | Error::InvalidEnvironment(_)
            | Error::Json(_) => StatusCode::InvalidArgument,
            Error::NoRowsFound => StatusCode::NotFound,
            Error::Decode(_) => StatusCode::DataLoss,
            Error::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            Error::Transport(_) | Error::Io(_) => StatusCode::Unavailable,
            Error::Status { code, .. } => *code,
            _ => StatusCode::Internal,
        };
        Status::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Environment;

    #[test]
    fn test_frame_tags() {
        let json = serde_json::to_string(&Frame::open_store()).unwrap();
        assert_eq!(json, r#"{"frame":"open","method":"store"}"#);

        let json = serde_json::to_string(&Frame::Close(Status::ok())).unwrap();
        assert_eq!(json, r#"{"frame":"close","code":"ok","message":""}"#);
    }

    #[test]
    fn test_property_frame_is_flat() {
        let p = Property::new(["s"], "ns", Environment::Default, "k", ["v"]);
        let json = serde_json::to_value(Frame::Property(p.clone())).unwrap();
        assert_eq!(json["frame"], "property");
        assert_eq!(json["key"], "k");

        let back: Frame = serde_json::from_value(json).unwrap();
        assert_eq!(back, Frame::Property(p));
    }

    #[test]
    fn test_search_open_carries_query() {
        let frame = Frame::open_search(Query::namespace("ns").with_limit(3));
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        match back {
            Frame::Open { method, query } => {
                assert_eq!(method, Method::Search);
                assert_eq!(query.unwrap().limit, 3);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_status_from_error() {
        assert_eq!(Status::from(&Error::MissingKey).code, StatusCode::InvalidArgument);
        assert_eq!(Status::from(&Error::NoRowsFound).code, StatusCode::NotFound);

        let err = Status::new(StatusCode::Internal, "boom").into_result().unwrap_err();
        assert!(matches!(err, Error::Status { code: StatusCode::Internal, .. }));
        assert!(Status::ok().into_result().is_ok());
    }
}
