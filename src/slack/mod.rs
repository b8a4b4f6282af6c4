//! Slack integration.
//!
//! This module contains:
//! - Socket Mode event types and the WebSocket client
//! - The Web API client
//! - The cached display name resolver
//! - The `!slacktest` self-test

pub mod commands;
pub mod event;
pub mod resolver;
pub mod socket;
pub mod web;

pub use resolver::{DisplayNameResolver, DisplayNames};
pub use socket::SocketModeClient;
pub use web::{BotIdentity, ChatOutbound, SlackWebClient};
