//! # quasar-editor: editor core for quasar
//!
//! - **[`block`]**: `Block`, its kind, stable id, revision and render state
//! - **[`cursor`]**: the `(block, line, col)` cursor and the scroll offset
//! - **[`document`]**: the block list and every text mutation, including
//!   detection of `$$` and splitting a math block out of a text block
//! - **[`mode`]**: Normal / Insert
//! - **[`view`]**: layout arithmetic and painting into a frame buffer
//! - **[`render`]**: the coordinator that compiles dirty math blocks off
//!   the event-loop thread and places the resulting images

pub mod block;
pub mod cursor;
pub mod document;
pub mod mode;
pub mod render;
pub mod view;
