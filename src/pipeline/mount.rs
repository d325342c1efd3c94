//! Mount API - terminal application lifecycle.
//!
//! `mount` renders a description tree once into a terminal root. After that
//! the loop is driven from outside:
//!
//! ```text
//! poll input -> keydown listeners (buffer updates) -> perform_scheduled_work -> repaint
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::pipeline::{mount, run, MountConfig};
//!
//! let mut handle = mount(host("text").child("hello"), MountConfig::default())?;
//!
//! // Option 1: blocking loop, ends on Esc / Ctrl+C
//! run(&mut handle)?;
//!
//! // Option 2: tick manually
//! while tick(&mut handle)? {
//!     // Your logic here
//! }
//!
//! handle.unmount();
//! ```

use std::io::{self, Stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::terminal::{FrameRenderer, RenderMode, TerminalSetup, detect_terminal_size};
use crate::element::Node;
use crate::engine::{Reconciler, ReconcilerConfig};
use crate::error::ReconcileError;
use crate::host::events::listener_prop_name;
use crate::host::terminal::{Frame, TerminalHost, TerminalSize};
use crate::host::MemoryHost;
use crate::types::{HostHandle, RootId};

/// Event name used for key presses.
pub const KEYDOWN: &str = "keydown";

const POLL_INTERVAL: Duration = Duration::from_millis(16);

// =============================================================================
// Config
// =============================================================================

/// Options for [`mount`].
#[derive(Debug, Clone, Default)]
pub struct MountConfig {
    pub mode: RenderMode,
    pub reconciler: ReconcilerConfig,
    /// Fixed size instead of the detected terminal size.
    pub size: Option<TerminalSize>,
}

fn pass_error(err: ReconcileError) -> io::Error {
    io::Error::other(err.to_string())
}

// =============================================================================
// Mount Handle
// =============================================================================

/// A mounted application: its reconciler, root and terminal state.
pub struct MountHandle {
    reconciler: Reconciler<TerminalHost>,
    root: RootId,
    container: HostHandle,
    mode: RenderMode,
    size: TerminalSize,
    running: Arc<AtomicBool>,
    setup: TerminalSetup,
    renderer: FrameRenderer,
    stdout: Option<Stdout>,
}

impl MountHandle {
    /// Build the reconciler and run the first pass, without touching the terminal.
    fn new(node: Node, config: MountConfig) -> io::Result<Self> {
        let size = config.size.unwrap_or_else(detect_terminal_size);
        let mut host = TerminalHost::new();
        let container = host.create_container();
        let mut reconciler = Reconciler::with_config(host, config.reconciler);
        let root = reconciler.create_container(container);

        reconciler.update_container(node, root).map_err(pass_error)?;
        reconciler.perform_scheduled_work().map_err(pass_error)?;
        log::debug!("[mount] {root:?} at {}x{}", size.width, size.height);

        Ok(Self {
            reconciler,
            root,
            container,
            mode: config.mode,
            size,
            running: Arc::new(AtomicBool::new(true)),
            setup: TerminalSetup::new(config.mode),
            renderer: FrameRenderer::new(config.mode),
            stdout: None,
        })
    }

    /// Stop and restore the terminal.
    pub fn unmount(mut self) {
        self.stop();
        self.restore();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request the loop to end after the current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Shared running flag, for stopping from another thread.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn size(&self) -> TerminalSize {
        self.size
    }

    pub fn reconciler(&self) -> &Reconciler<TerminalHost> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<TerminalHost> {
        &mut self.reconciler
    }

    pub fn document(&self) -> &MemoryHost {
        self.reconciler.host().document()
    }

    /// Replace the rendered tree and run a pass.
    pub fn render(&mut self, node: impl Into<Node>) -> io::Result<()> {
        self.reconciler
            .update_container(node, self.root)
            .map_err(pass_error)?;
        self.perform_work().map(|_| ())
    }

    /// Run pending passes. Returns true if any ran.
    pub fn perform_work(&mut self) -> io::Result<bool> {
        let passes = self
            .reconciler
            .perform_scheduled_work()
            .map_err(pass_error)?;
        Ok(passes > 0)
    }

    /// The current document painted at the current size.
    pub fn frame(&self) -> io::Result<Frame> {
        self.reconciler
            .host()
            .paint(self.container, self.size, self.mode.constrains_height())
    }

    /// Resize, forcing a full redraw on the next repaint.
    pub fn resize(&mut self, size: TerminalSize) {
        self.size = size;
        self.renderer.invalidate();
    }

    /// Host node that receives key events: the last element in document order
    /// with a keydown listener, else the container.
    pub fn key_target(&self) -> HostHandle {
        let bubble = listener_prop_name(KEYDOWN, false);
        let capture = listener_prop_name(KEYDOWN, true);
        let document = self.document();

        let mut target = self.container;
        let mut stack = vec![self.container];
        while let Some(handle) = stack.pop() {
            if document.attribute(handle, &bubble).is_some()
                || document.attribute(handle, &capture).is_some()
            {
                target = handle;
            }
            stack.extend(document.children(handle).iter().rev());
        }
        target
    }

    /// Dispatch a key press and run the passes it scheduled.
    ///
    /// Returns true if the tree changed.
    pub fn press_key(&mut self, key: &str) -> io::Result<bool> {
        let target = self.key_target();
        let handled = self
            .document()
            .dispatch(target, KEYDOWN, Some(key.to_string()));
        log::trace!("[mount] key {key:?} -> {target:?}, {handled} listener(s)");
        self.perform_work()
    }

    /// Paint and write the current frame.
    pub fn repaint(&mut self) -> io::Result<()> {
        let frame = self.frame()?;
        let stdout = self.stdout.get_or_insert_with(io::stdout);
        self.renderer.render(stdout, frame)
    }

    fn enter_terminal(&mut self) -> io::Result<()> {
        let stdout = self.stdout.get_or_insert_with(io::stdout);
        self.setup.enter(stdout)
    }

    fn restore(&mut self) {
        if let Some(stdout) = self.stdout.as_mut() {
            if let Err(err) = self.setup.exit(stdout) {
                log::warn!("[mount] terminal restore failed: {err}");
            }
        }
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.restore();
    }
}

// =============================================================================
// Mount Function
// =============================================================================

/// Mount `node` into the terminal.
///
/// Renders once, enters raw mode (and the alternate screen in fullscreen
/// mode) and paints the first frame.
pub fn mount(node: impl Into<Node>, config: MountConfig) -> io::Result<MountHandle> {
    let mut handle = MountHandle::new(node.into(), config)?;
    handle.enter_terminal()?;
    handle.repaint()?;
    Ok(handle)
}

/// Unmount and clean up.
pub fn unmount(handle: MountHandle) {
    handle.unmount();
}

// =============================================================================
// Input
// =============================================================================

/// Esc and Ctrl+C end the loop.
pub fn is_stop_key(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Name carried as the `detail` of a keydown event.
pub fn key_name(key: &KeyEvent) -> Option<String> {
    let name = match key.code {
        KeyCode::Char(c) => return Some(c.to_string()),
        KeyCode::Enter => "Enter",
        KeyCode::Tab => "Tab",
        KeyCode::BackTab => "BackTab",
        KeyCode::Backspace => "Backspace",
        KeyCode::Delete => "Delete",
        KeyCode::Up => "ArrowUp",
        KeyCode::Down => "ArrowDown",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Right => "ArrowRight",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::PageUp => "PageUp",
        KeyCode::PageDown => "PageDown",
        KeyCode::F(n) => return Some(format!("F{n}")),
        _ => return None,
    };
    Some(name.to_string())
}

// =============================================================================
// Event Loop
// =============================================================================

/// Run the event loop once.
///
/// Returns `Ok(false)` once the application should stop.
pub fn tick(handle: &mut MountHandle) -> io::Result<bool> {
    if !handle.is_running() {
        return Ok(false);
    }

    let mut changed = false;
    if event::poll(POLL_INTERVAL)? {
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if is_stop_key(&key) {
                    handle.stop();
                } else if let Some(name) = key_name(&key) {
                    changed = handle.press_key(&name)?;
                }
            }
            Event::Resize(width, height) => {
                handle.resize(TerminalSize::new(width, height));
                changed = true;
            }
            _ => {}
        }
    }

    // Updates dispatched outside of input handlers.
    changed |= handle.perform_work()?;
    if changed && handle.is_running() {
        handle.repaint()?;
    }
    Ok(handle.is_running())
}

/// Run the event loop until stopped.
pub fn run(handle: &mut MountHandle) -> io::Result<()> {
    while tick(handle)? {}
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Component, component, host};

    fn headless(node: impl Into<Node>) -> MountHandle {
        let config = MountConfig {
            size: Some(TerminalSize::new(20, 4)),
            ..Default::default()
        };
        MountHandle::new(node.into(), config).expect("mount")
    }

    fn counter() -> Component {
        Component::new("Counter", |hooks, _props| {
            let (count, dispatch) = hooks.use_reducer(|count: &i64, delta: i64| count + delta, 0);
            host("text")
                .on(KEYDOWN, move |event| match event.detail() {
                    Some("+") => dispatch.dispatch(1),
                    Some("-") => dispatch.dispatch(-1),
                    _ => {}
                })
                .child(format!("count {count}"))
                .into()
        })
    }

    #[test]
    fn test_first_frame() {
        let handle = headless(host("text").child("hello"));
        let frame = handle.frame().expect("frame");
        assert_eq!(frame.row(0), "hello");
        assert!(handle.is_running());
    }

    #[test]
    fn test_key_press_rerenders() {
        let counter = counter();
        let mut handle = headless(component(&counter));

        assert!(handle.press_key("+").expect("key"));
        assert!(handle.press_key("+").expect("key"));
        assert!(handle.press_key("-").expect("key"));
        assert_eq!(handle.frame().expect("frame").row(0), "count 1");

        // No listener matched, nothing scheduled.
        assert!(!handle.press_key("x").expect("key"));
    }

    #[test]
    fn test_key_target_falls_back_to_container() {
        let handle = headless(host("text").child("static"));
        assert_eq!(handle.key_target(), handle.container);
    }

    #[test]
    fn test_stop_and_key_names() {
        let handle = headless(Node::Empty);
        handle.stop();
        assert!(!handle.is_running());

        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert!(is_stop_key(&esc));
        assert!(is_stop_key(&ctrl_c));
        assert!(!is_stop_key(&plain_c));

        assert_eq!(key_name(&plain_c).as_deref(), Some("c"));
        assert_eq!(
            key_name(&KeyEvent::new(KeyCode::Up, KeyModifiers::NONE)).as_deref(),
            Some("ArrowUp")
        );
        assert_eq!(key_name(&esc), None);
    }
}
