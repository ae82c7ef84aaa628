// SPDX-License-Identifier: MIT
//
// quasar-term: terminal runtime for quasar.
//
// Direct terminal control via ANSI escape sequences and raw termios:
// a cell grid that is diffed frame to frame and written in one syscall,
// a byte-level input parser, a background stdin reader, and an event
// loop that multiplexes keystrokes with application messages on one
// channel.
//
// Images do not fit the cell grid. They are drawn by `graphics` through
// the Kitty graphics protocol as an overlay written after each frame,
// over rows the application leaves blank.

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod diff;
pub mod event_loop;
pub mod graphics;
pub mod input;
pub mod output;
pub mod reader;
pub mod terminal;
