//! `bagkeeper`: a bag-based record/replay subsystem for a publish/subscribe
//! middleware. Three engines compose the user-visible behavior:
//!
//! - [`player`] — streams messages from a bag into the live middleware at
//!   a controllable wall-time rate, with pause/resume/seek/step.
//! - [`recorder`] — discovers live topics and writes their messages into a
//!   bag.
//! - [`rewriter`] — merges multiple input bags into one or more output
//!   bags in strict timestamp order.
//!
//! The bag storage engine and the middleware transport are external
//! collaborators; see [`storage`] and [`transport`] for the trait
//! boundaries this crate is written against.

pub mod clock;
pub mod control;
pub mod error;
pub mod message;
pub mod options;
pub mod player;
pub mod qos;
pub mod queue;
pub mod recorder;
pub mod rewriter;
pub mod storage;
pub mod transport;

pub use error::{Error, Result};
pub use message::{BagMetadata, SerializedMessage, TopicMetadata};
pub use options::{PlayOptions, RecordOptions, StorageOptions, TopicSelection};
pub use player::Player;
pub use recorder::Recorder;
pub use rewriter::Rewriter;
