//! Keyboard navigation controller
//!
//! Maps a key press to a [`NavCommand`] given the current view mode, grid
//! geometry and cursor. Pure and synchronous; applying the command is the
//! caller's job.

use crate::input::{Key, Modifiers};
use crate::view_mode::{ComparePair, ViewMode};

/// Default PageUp/PageDown stride in rows
pub const DEFAULT_PAGE_ROWS: usize = 5;

/// Everything the controller needs to know about the current state
#[derive(Debug, Clone, Copy)]
pub struct NavContext {
    pub view_mode: ViewMode,
    pub columns: usize,
    pub page_rows: usize,
    /// Filtered view length
    pub len: usize,
    pub primary: Option<usize>,
    pub compare: Option<ComparePair>,
    pub has_multi_select: bool,
    /// A blocking dialog owns the keyboard
    pub modal_active: bool,
}

impl NavContext {
    pub fn new(view_mode: ViewMode, columns: usize, len: usize, primary: Option<usize>) -> Self {
        Self {
            view_mode,
            columns,
            page_rows: DEFAULT_PAGE_ROWS,
            len,
            primary,
            compare: None,
            has_multi_select: false,
            modal_active: false,
        }
    }
}

/// Result of a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    /// Key not bound in this context
    None,
    /// Move the primary cursor to a filtered index
    MoveTo(usize),
    EnterView(ViewMode),
    ExitToGrid,
    /// Toggle the label of the current selection
    ToggleLabel,
    /// Compare mode: move the left (primary) side
    MoveCompareLeft(usize),
    /// Compare mode: move the right side
    MoveCompareRight(usize),
    ToggleCompareLeft,
    ToggleCompareRight,
    ClearMultiSelect,
    /// Host should show the folder picker
    OpenFolder,
    /// Host should show the export dialog
    Export,
}

/// Resolve a key press
pub fn handle_key(key: Key, modifiers: Modifiers, ctx: &NavContext) -> NavCommand {
    if ctx.modal_active {
        return NavCommand::None;
    }

    if modifiers.command() {
        return match key {
            Key::Char('o') => NavCommand::OpenFolder,
            Key::Char('e') => NavCommand::Export,
            _ => NavCommand::None,
        };
    }

    match ctx.view_mode {
        ViewMode::Grid => grid_key(key, ctx),
        ViewMode::Detail => detail_key(key, ctx),
        ViewMode::Compare => compare_key(key, modifiers, ctx),
        ViewMode::Gallery => gallery_key(key, ctx),
    }
}

fn current(ctx: &NavContext) -> usize {
    ctx.primary.unwrap_or(0).min(ctx.len.saturating_sub(1))
}

/// ±1 with clamping, no wraparound
fn step(ctx: &NavContext, forward: bool) -> NavCommand {
    if ctx.len == 0 {
        return NavCommand::None;
    }
    let cur = current(ctx);
    let next = if forward { (cur + 1).min(ctx.len - 1) } else { cur.saturating_sub(1) };
    NavCommand::MoveTo(next)
}

fn toggle(ctx: &NavContext) -> NavCommand {
    if ctx.len == 0 {
        NavCommand::None
    } else {
        NavCommand::ToggleLabel
    }
}

fn grid_key(key: Key, ctx: &NavContext) -> NavCommand {
    let cols = ctx.columns.max(1);
    let last = match ctx.len.checked_sub(1) {
        Some(last) => last,
        None => return NavCommand::None,
    };
    let cur = current(ctx);

    match key {
        Key::ArrowLeft => step(ctx, false),
        Key::ArrowRight => step(ctx, true),
        Key::ArrowUp => {
            if cur >= cols {
                NavCommand::MoveTo(cur - cols)
            } else {
                NavCommand::None
            }
        }
        // Past the last row jumps to the last item instead of stopping
        Key::ArrowDown => NavCommand::MoveTo((cur + cols).min(last)),
        Key::Home => NavCommand::MoveTo(0),
        Key::End => NavCommand::MoveTo(last),
        Key::PageUp => NavCommand::MoveTo(cur.saturating_sub(cols * ctx.page_rows.max(1))),
        Key::PageDown => NavCommand::MoveTo((cur + cols * ctx.page_rows.max(1)).min(last)),
        Key::Char('1') => NavCommand::ToggleLabel,
        Key::Enter | Key::Space => NavCommand::EnterView(ViewMode::Detail),
        Key::Char('c') => NavCommand::EnterView(ViewMode::Compare),
        Key::Char('g') => NavCommand::EnterView(ViewMode::Gallery),
        _ => NavCommand::None,
    }
}

fn detail_key(key: Key, ctx: &NavContext) -> NavCommand {
    match key {
        Key::Escape => NavCommand::ExitToGrid,
        Key::ArrowLeft => step(ctx, false),
        Key::ArrowRight => step(ctx, true),
        Key::Char('1') => toggle(ctx),
        _ => NavCommand::None,
    }
}

fn compare_key(key: Key, modifiers: Modifiers, ctx: &NavContext) -> NavCommand {
    if key == Key::Escape {
        return NavCommand::ExitToGrid;
    }
    let pair = match ctx.compare {
        Some(pair) if ctx.len >= 2 => pair,
        _ => return NavCommand::None,
    };
    let last = ctx.len - 1;

    match (key, modifiers.shift) {
        (Key::ArrowLeft, false) => NavCommand::MoveCompareLeft(pair.left.saturating_sub(1)),
        (Key::ArrowRight, false) => NavCommand::MoveCompareLeft((pair.left + 1).min(last)),
        (Key::ArrowLeft, true) => NavCommand::MoveCompareRight(pair.right.saturating_sub(1)),
        (Key::ArrowRight, true) => NavCommand::MoveCompareRight((pair.right + 1).min(last)),
        (Key::Char('1'), _) => NavCommand::ToggleCompareLeft,
        (Key::Char('2'), _) => NavCommand::ToggleCompareRight,
        _ => NavCommand::None,
    }
}

fn gallery_key(key: Key, ctx: &NavContext) -> NavCommand {
    match key {
        Key::ArrowLeft => step(ctx, false),
        Key::ArrowRight => step(ctx, true),
        Key::Char('1') => toggle(ctx),
        // Gallery only closes explicitly
        Key::Escape if ctx.has_multi_select => NavCommand::ClearMultiSelect,
        _ => NavCommand::None,
    }
}
