//! Message relay from monitored channels to the destination channel.
//!
//! ## Module Structure
//!
//! - `state`: committed channel mapping (`RelayState`)
//! - `forwarder`: create/delete relays (`Forwarder`)
//! - `history`: recently seen messages for deletion notices
//! - `overwrites`: destination permission preservation around a send

pub mod forwarder;
pub mod history;
pub mod overwrites;
pub mod state;

pub use forwarder::{Forwarder, RelayOutcome, SkipReason};
pub use state::RelayState;
