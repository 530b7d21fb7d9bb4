//! Topic tags and typed setters for the built-in message kinds

use crate::{Message, Wrapper};
use types::{Capabilities, Header, Point, Position, Quaternion, Status, StatusLevel};

impl Message for Header {
    const TOPIC: &'static str = "HEADER";
}

impl Message for Position {
    const TOPIC: &'static str = "POSITION";
}

impl Message for Status {
    const TOPIC: &'static str = "STATUS";
}

impl Message for Capabilities {
    const TOPIC: &'static str = "CAPABILITIES";
}

pub type HeaderMessage = Wrapper<Header>;
pub type PositionMessage = Wrapper<Position>;
pub type StatusMessage = Wrapper<Status>;
pub type CapabilitiesMessage = Wrapper<Capabilities>;

impl Wrapper<Position> {
    pub fn set_header(&self, header: Header) {
        self.modify(|m| m.header = header);
    }

    pub fn set_point(&self, point: Point) {
        self.modify(|m| m.point = point);
    }

    pub fn set_orientation(&self, orientation: Quaternion) {
        self.modify(|m| m.orientation = orientation);
    }
}

impl Wrapper<Status> {
    pub fn set_header(&self, header: Header) {
        self.modify(|m| m.header = header);
    }

    pub fn set_level(&self, level: StatusLevel, code: u32, text: impl Into<String>) {
        let text = text.into();
        self.modify(|m| {
            m.level = level;
            m.code = code;
            m.text = text;
        });
    }
}

impl Wrapper<Capabilities> {
    pub fn set_header(&self, header: Header) {
        self.modify(|m| m.header = header);
    }

    pub fn add_capability(&self, name: impl Into<String>) {
        let name = name.into();
        self.modify(|m| {
            if !m.names.contains(&name) {
                m.names.push(name);
            }
        });
    }
}
