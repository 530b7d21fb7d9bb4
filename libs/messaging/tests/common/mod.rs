//! Shared fixtures for messaging integration tests

#![allow(dead_code)]

use codec::{PositionMessage, StatusMessage};
use messaging::Publisher;
use std::time::Duration;
use types::{Header, Point, Position, Quaternion, Status, StatusLevel};

pub const LOOPBACK: &str = "tcp://127.0.0.1:0";

pub fn position(seq: u64) -> PositionMessage {
    PositionMessage::new(Position::new(
        Header::with_stamp(seq, "base_link", 1_700_000_000.25),
        Point::new(1.0, 1.1, 1.2),
        Quaternion::new(0.0, 0.0, 0.0, 1.0),
    ))
}

pub fn status(code: u32, text: &str) -> StatusMessage {
    StatusMessage::new(Status::new(
        Header::with_stamp(u64::from(code), "monitor", 1_700_000_000.5),
        StatusLevel::Warn,
        code,
        text,
    ))
}

/// Block until the publisher has accepted `count` subscriber connections
pub async fn wait_for_subscribers(publisher: &Publisher, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while publisher.subscriber_count() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "subscribers never connected"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Address a client would use for a server bound on `tcp://*:port` or loopback
pub fn connect_address(bound: &messaging::Address) -> String {
    match bound.port() {
        Some(port) => format!("tcp://127.0.0.1:{port}"),
        None => bound.to_string(),
    }
}
