//! Terminal host - the memory document, laid out with Taffy and painted into
//! a character frame.
//!
//! Every adapter call is forwarded to an inner [`MemoryHost`]. Painting is a
//! separate step the mount loop runs after each commit:
//!
//! ```text
//! document -> taffy tree -> absolute boxes -> Frame
//! ```
//!
//! Writing frames to the terminal lives in `pipeline::terminal`.
//!
//! Style fields understood by the layout: `flexDirection` (`row` / `column`),
//! `width`, `height` (cells or `N%`), `padding`, `gap` and `flexGrow`.

use std::collections::HashMap;
use std::io;

use taffy::{
    AvailableSpace, Dimension, Display, FlexDirection, LengthPercentage, NodeId as TaffyNode,
    Rect, Size, Style, TaffyError, TaffyTree,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::events::{EventHandler, EventTargetTree};
use super::memory::{HostNodeKind, MemoryHost};
use super::props_diff::UpdatePayload;
use super::HostConfig;
use crate::element::{Props, Style as StyleMap};
use crate::types::HostHandle;

// =============================================================================
// Terminal Size
// =============================================================================

/// Terminal dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub width: u16,
    pub height: u16,
}

impl TerminalSize {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

// =============================================================================
// Frame
// =============================================================================

/// Placeholder for the second cell of a double-width character.
const WIDE_TAIL: char = '\0';

/// A painted grid of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u16,
    height: u16,
    cells: Vec<char>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![' '; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn get(&self, x: u16, y: u16) -> Option<char> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// One row as a string, trailing blanks trimmed.
    pub fn row(&self, y: u16) -> String {
        let start = y as usize * self.width as usize;
        let end = (start + self.width as usize).min(self.cells.len());
        self.cells
            .get(start..end)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|c| **c != WIDE_TAIL)
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .unwrap_or_default()
    }

    /// Write `text` at `(x, y)`, clipped to `max_width` and the frame edge.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, max_width: u16) {
        if y >= self.height {
            return;
        }
        let mut col = x;
        for ch in text.chars() {
            let width = char_width(ch);
            if width == 0 {
                continue;
            }
            if col >= self.width || col.saturating_sub(x) + width > max_width {
                break;
            }
            let index = y as usize * self.width as usize + col as usize;
            self.cells[index] = ch;
            if width == 2 && col + 1 < self.width {
                self.cells[index + 1] = WIDE_TAIL;
            }
            col += width;
        }
    }
}

/// Display width of a character in cells.
fn char_width(ch: char) -> u16 {
    UnicodeWidthChar::width(ch).unwrap_or(0) as u16
}

/// Display width of a string in cells.
pub fn display_width(text: &str) -> u16 {
    u16::try_from(UnicodeWidthStr::width(text)).unwrap_or(u16::MAX)
}

// =============================================================================
// Layout
// =============================================================================

/// Absolute box of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutBox {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

fn parse_dimension(value: Option<&String>) -> Dimension {
    let Some(value) = value.map(|v| v.trim()) else {
        return Dimension::Auto;
    };
    if let Some(percent) = value.strip_suffix('%') {
        return percent
            .trim()
            .parse::<f32>()
            .map_or(Dimension::Auto, |p| Dimension::Percent(p / 100.0));
    }
    value
        .parse::<f32>()
        .map_or(Dimension::Auto, Dimension::Length)
}

fn parse_cells(value: Option<&String>) -> f32 {
    value.and_then(|v| v.trim().parse::<f32>().ok()).unwrap_or(0.0)
}

fn build_style(style: &StyleMap) -> Style {
    let padding = LengthPercentage::Length(parse_cells(style.get("padding")));
    let gap = LengthPercentage::Length(parse_cells(style.get("gap")));
    Style {
        display: Display::Flex,
        flex_direction: match style.get("flexDirection").map(String::as_str) {
            Some("row") => FlexDirection::Row,
            _ => FlexDirection::Column,
        },
        flex_grow: parse_cells(style.get("flexGrow")),
        size: Size {
            width: parse_dimension(style.get("width")),
            height: parse_dimension(style.get("height")),
        },
        padding: Rect {
            top: padding,
            right: padding,
            bottom: padding,
            left: padding,
        },
        gap: Size {
            width: gap,
            height: gap,
        },
        ..Default::default()
    }
}

/// Text to draw for a node: a text leaf's content or an element's direct text.
fn own_text(document: &MemoryHost, handle: HostHandle) -> Option<String> {
    match document.kind(handle)? {
        HostNodeKind::Text(text) => Some(text.clone()),
        HostNodeKind::Element(_) if document.children(handle).is_empty() => {
            let text = document.text_content(handle);
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn measure(text: &str, known: Size<Option<f32>>) -> Size<f32> {
    let width = text.lines().map(display_width).max().unwrap_or(0);
    let height = text.lines().count().max(1);
    Size {
        width: known.width.unwrap_or(width as f32),
        height: known.height.unwrap_or(height as f32),
    }
}

// =============================================================================
// Terminal Host
// =============================================================================

/// A host that draws its document to a terminal.
#[derive(Debug, Default)]
pub struct TerminalHost {
    document: MemoryHost,
}

impl TerminalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_container(&mut self) -> HostHandle {
        self.document.create_container()
    }

    pub fn document(&self) -> &MemoryHost {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut MemoryHost {
        &mut self.document
    }

    /// Lay out everything under `container` within `size`.
    ///
    /// With `constrain_height` off the height grows with content.
    pub fn layout(
        &self,
        container: HostHandle,
        size: TerminalSize,
        constrain_height: bool,
    ) -> Result<Vec<(HostHandle, LayoutBox)>, TaffyError> {
        let mut tree: TaffyTree<String> = TaffyTree::new();
        let mut handles: HashMap<HostHandle, TaffyNode> = HashMap::new();

        let root_style = Style {
            display: Display::Flex,
            flex_direction: FlexDirection::Column,
            size: Size {
                width: Dimension::Length(size.width as f32),
                height: if constrain_height {
                    Dimension::Length(size.height as f32)
                } else {
                    Dimension::Auto
                },
            },
            ..Default::default()
        };
        let root = tree.new_leaf(root_style)?;
        for child in self.document.children(container) {
            let node = self.build_node(&mut tree, *child, &mut handles)?;
            tree.add_child(root, node)?;
        }

        let available = Size {
            width: AvailableSpace::Definite(size.width as f32),
            height: if constrain_height {
                AvailableSpace::Definite(size.height as f32)
            } else {
                AvailableSpace::MaxContent
            },
        };
        tree.compute_layout_with_measure(
            root,
            available,
            |known, _available, _node, context: Option<&mut String>, _style| match context {
                Some(text) => measure(text, known),
                None => Size::ZERO,
            },
        )?;

        let mut boxes = Vec::with_capacity(handles.len());
        for child in self.document.children(container) {
            self.collect_boxes(&tree, *child, &handles, (0.0, 0.0), &mut boxes)?;
        }
        Ok(boxes)
    }

    fn build_node(
        &self,
        tree: &mut TaffyTree<String>,
        handle: HostHandle,
        handles: &mut HashMap<HostHandle, TaffyNode>,
    ) -> Result<TaffyNode, TaffyError> {
        let style = self
            .document
            .style(handle)
            .map(build_style)
            .unwrap_or_default();
        let node = match own_text(&self.document, handle) {
            Some(text) => tree.new_leaf_with_context(style, text)?,
            None => {
                let node = tree.new_leaf(style)?;
                for child in self.document.children(handle) {
                    let child_node = self.build_node(tree, *child, handles)?;
                    tree.add_child(node, child_node)?;
                }
                node
            }
        };
        handles.insert(handle, node);
        Ok(node)
    }

    fn collect_boxes(
        &self,
        tree: &TaffyTree<String>,
        handle: HostHandle,
        handles: &HashMap<HostHandle, TaffyNode>,
        origin: (f32, f32),
        out: &mut Vec<(HostHandle, LayoutBox)>,
    ) -> Result<(), TaffyError> {
        let Some(&node) = handles.get(&handle) else {
            return Ok(());
        };
        let layout = tree.layout(node)?;
        let x = origin.0 + layout.location.x;
        let y = origin.1 + layout.location.y;
        out.push((
            handle,
            LayoutBox {
                x: x.round() as u16,
                y: y.round() as u16,
                width: layout.size.width.round() as u16,
                height: layout.size.height.round() as u16,
            },
        ));
        for child in self.document.children(handle) {
            self.collect_boxes(tree, *child, handles, (x, y), out)?;
        }
        Ok(())
    }

    /// Paint the document into a frame of `size`.
    ///
    /// Without `constrain_height` the frame is as tall as the content, capped at
    /// `size.height`.
    pub fn paint(
        &self,
        container: HostHandle,
        size: TerminalSize,
        constrain_height: bool,
    ) -> io::Result<Frame> {
        let boxes = self
            .layout(container, size, constrain_height)
            .map_err(|err| io::Error::other(err.to_string()))?;
        let height = if constrain_height {
            size.height
        } else {
            boxes
                .iter()
                .map(|(_, b)| b.y.saturating_add(b.height))
                .max()
                .unwrap_or(0)
                .min(size.height)
        };
        let mut frame = Frame::new(size.width, height);
        for (handle, layout) in boxes {
            let Some(text) = own_text(&self.document, handle) else { continue };
            for (line, content) in text.lines().enumerate() {
                if line as u16 >= layout.height.max(1) {
                    break;
                }
                frame.put_str(layout.x, layout.y + line as u16, content, layout.width);
            }
        }
        Ok(frame)
    }
}

// =============================================================================
// Forwarding
// =============================================================================

impl HostConfig for TerminalHost {
    fn create_instance(&mut self, tag: &str, props: &Props) -> HostHandle {
        self.document.create_instance(tag, props)
    }

    fn create_text_instance(&mut self, text: &str) -> HostHandle {
        self.document.create_text_instance(text)
    }

    fn append_initial_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.document.append_initial_child(parent, child)
    }

    fn finalize_initial_children(&mut self, handle: HostHandle, tag: &str, props: &Props) {
        self.document.finalize_initial_children(handle, tag, props)
    }

    fn commit_update(&mut self, handle: HostHandle, tag: &str, payload: &UpdatePayload) {
        self.document.commit_update(handle, tag, payload)
    }

    fn commit_text_update(&mut self, handle: HostHandle, old_text: &str, new_text: &str) {
        self.document.commit_text_update(handle, old_text, new_text)
    }

    fn append_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.document.append_child(parent, child)
    }

    fn insert_before(&mut self, parent: HostHandle, child: HostHandle, before: HostHandle) {
        self.document.insert_before(parent, child, before)
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) {
        self.document.remove_child(parent, child)
    }

    fn append_child_to_container(&mut self, container: HostHandle, child: HostHandle) {
        self.document.append_child_to_container(container, child)
    }

    fn insert_in_container_before(
        &mut self,
        container: HostHandle,
        child: HostHandle,
        before: HostHandle,
    ) {
        self.document.insert_in_container_before(container, child, before)
    }

    fn remove_child_from_container(&mut self, container: HostHandle, child: HostHandle) {
        self.document.remove_child_from_container(container, child)
    }
}

impl EventTargetTree for TerminalHost {
    fn parent_of(&self, handle: HostHandle) -> Option<HostHandle> {
        self.document.parent_of(handle)
    }

    fn listener(&self, handle: HostHandle, prop_name: &str) -> Option<EventHandler> {
        self.document.listener(handle, prop_name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::STYLE;

    fn styled(fields: &[(&str, &str)]) -> Props {
        let style: StyleMap = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Props::new().with(STYLE, style)
    }

    #[test]
    fn test_frame_clips_to_width() {
        let mut frame = Frame::new(5, 1);
        frame.put_str(1, 0, "abcdef", 3);
        assert_eq!(frame.row(0), " abc");
        assert_eq!(frame.get(4, 0), Some(' '));
        assert_eq!(frame.get(5, 0), None);
    }

    #[test]
    fn test_display_width() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本"), 4);

        let mut frame = Frame::new(6, 1);
        frame.put_str(0, 0, "日本x", 6);
        assert_eq!(frame.row(0), "日本x");
        assert_eq!(frame.get(4, 0), Some('x'));

        assert_eq!(display_width("e\u{301}"), 1);
        let mut frame = Frame::new(3, 1);
        frame.put_str(0, 0, "e\u{301}z", 3);
        assert_eq!(frame.row(0), "ez");
    }

    #[test]
    fn test_nested_layout_boxes_every_node() {
        let mut host = TerminalHost::new();
        let container = host.create_container();
        let outer = host.create_instance("box", &Props::new());
        let mut lines = Vec::new();
        for label in ["one", "two", "three"] {
            let inner = host.create_instance("box", &Props::new());
            let text = host.create_text_instance(label);
            host.append_initial_child(inner, text);
            host.append_initial_child(outer, inner);
            lines.push((inner, text));
        }
        host.finalize_initial_children(outer, "box", &styled(&[("flexDirection", "column")]));
        host.append_child_to_container(container, outer);

        let boxes = host.layout(container, TerminalSize::new(10, 5), true).expect("layout");
        assert_eq!(boxes.len(), 7);
        for (row, (inner, text)) in lines.iter().enumerate() {
            let find = |handle: HostHandle| boxes.iter().find(|(h, _)| *h == handle).map(|(_, b)| *b);
            assert_eq!(find(*inner).map(|b| b.y), Some(row as u16));
            assert_eq!(find(*text).map(|b| b.y), Some(row as u16));
        }
    }

    #[test]
    fn test_row_layout_paints_side_by_side() {
        let mut host = TerminalHost::new();
        let container = host.create_container();
        let row = host.create_instance("box", &Props::new());
        let a = host.create_text_instance("ab");
        let b = host.create_text_instance("cd");
        host.append_initial_child(row, a);
        host.append_initial_child(row, b);
        host.finalize_initial_children(row, "box", &styled(&[("flexDirection", "row"), ("gap", "1")]));
        host.append_child_to_container(container, row);

        let frame = host.paint(container, TerminalSize::new(10, 2), true).expect("paint");
        assert_eq!(frame.row(0), "ab cd");
        assert_eq!(frame.row(1), "");
    }

    #[test]
    fn test_column_layout_stacks_lines() {
        let mut host = TerminalHost::new();
        let container = host.create_container();
        let first = host.create_instance("text", &Props::new());
        host.finalize_initial_children(first, "text", &Props::new().with("children", crate::element::Node::from("one")));
        let second = host.create_text_instance("two");
        host.append_child_to_container(container, first);
        host.append_child_to_container(container, second);

        let frame = host.paint(container, TerminalSize::new(8, 3), true).expect("paint");
        assert_eq!(frame.row(0), "one");
        assert_eq!(frame.row(1), "two");
    }

    #[test]
    fn test_unconstrained_frame_fits_content() {
        let mut host = TerminalHost::new();
        let container = host.create_container();
        let line = host.create_text_instance("hello");
        host.append_child_to_container(container, line);

        let frame = host.paint(container, TerminalSize::new(20, 10), false).expect("paint");
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.row(0), "hello");
    }
}
