//! Socket patterns
//!
//! Typed wrappers over the endpoint engine, one per messaging pattern:
//!
//! - **PUB/SUB**: fan-out broadcast, slow subscribers miss messages
//! - **REQ/REP**: one outstanding request, replies matched by request id
//! - **ROUTER/DEALER**: identity-addressed replies and round-robin requests,
//!   used to relay REQ/REP traffic through a proxy

pub mod pubsub;
pub mod reqrep;
pub mod routing;

pub use pubsub::{PubSocket, SubSocket};
pub use reqrep::{RepSocket, ReqSocket};
pub use routing::{DealerSocket, RouterSocket};
