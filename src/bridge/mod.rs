//! Bridge between Slack and the trivia engine.
//!
//! ## Module Structure
//!
//! - `channels`: Communication channel structures
//! - `dispatch`: Envelope routing and engine event handling
//! - `filter`: Inbound message filtering

pub mod channels;
pub mod dispatch;
pub mod filter;

pub use channels::ChannelBundle;
pub use dispatch::{Dispatcher, SlackResponder};
pub use filter::MessageFilter;
