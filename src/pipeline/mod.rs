//! Terminal pipeline - the scheduler boundary around the reconciler.
//!
//! ```text
//! crossterm input -> keydown listeners -> perform_scheduled_work -> paint -> FrameRenderer
//! ```
//!
//! Listeners only buffer updates. Passes run when the loop asks for them,
//! once per tick, never from inside a listener.

pub mod mount;
pub mod terminal;

pub use mount::{is_stop_key, key_name, mount, run, tick, unmount, MountConfig, MountHandle, KEYDOWN};
pub use terminal::{detect_terminal_size, FrameRenderer, RenderMode, TerminalSetup};
