//! Discord bot integration.
//!
//! This module provides the gateway client, event routing, and the
//! `ChatPlatform` seam the relay and setup flows are written against.

pub mod client;
pub mod commands;
pub mod handler;
pub mod mentions;
pub mod platform;

// Re-export main types for external use
pub use client::DiscordBotBuilder;
