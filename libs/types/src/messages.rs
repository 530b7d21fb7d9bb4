//! Top-level message kinds
//!
//! Each struct here is one kind on the bus. Topic tags and the wire format
//! are bound to these types in `codec`.

use crate::{Header, Point, Quaternion};
use serde::{Deserialize, Serialize};

/// Pose of a frame: position plus orientation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub header: Header,
    pub point: Point,
    pub orientation: Quaternion,
}

impl Position {
    pub fn new(header: Header, point: Point, orientation: Quaternion) -> Self {
        Self {
            header,
            point,
            orientation,
        }
    }
}

/// Severity carried by a [`Status`] report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusLevel {
    #[default]
    Ok,
    Warn,
    Error,
    Stale,
}

/// Health report of a component
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub header: Header,
    pub level: StatusLevel,
    pub code: u32,
    pub text: String,
}

impl Status {
    pub fn new(header: Header, level: StatusLevel, code: u32, text: impl Into<String>) -> Self {
        Self {
            header,
            level,
            code,
            text: text.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.level == StatusLevel::Ok
    }
}

/// List of capabilities a component advertises
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub header: Header,
    pub names: Vec<String>,
}

impl Capabilities {
    pub fn new<I, S>(header: Header, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn supports(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
