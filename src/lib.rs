//! Core library for the price-bot Telegram bot.
//!
//! The bot answers sales lookups against a supplier workbook. IO adapters
//! live under [`io`], the record types in [`model`], lookup parsing in
//! [`query`], aggregation in [`aggregate`], table rendering in [`report`], and
//! request dispatch in [`bot`]. [`telegram`] connects the dispatcher to the
//! Bot API.

pub mod access;
pub mod aggregate;
pub mod bot;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod query;
pub mod report;
pub mod source;
pub mod telegram;

pub use error::{Result, ToolError};
