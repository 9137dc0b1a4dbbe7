pub mod chat;
pub mod clock;
pub mod digest;
pub mod error;
pub mod media_ref;
pub mod payload;
pub mod report;
pub mod types;

pub use chat::{ChatClient, MockChat, RoomEvent};
pub use error::SweepError;
pub use media_ref::MediaRef;
pub use payload::MediaPayload;
pub use report::{ClassCounts, RunReport};
pub use types::*;
