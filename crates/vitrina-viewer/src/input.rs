//! DOM event to [`PointerInput`] translation
//!
//! Kept free of `web-sys` types so it can be tested natively; the host copies
//! the few fields it needs out of each event.

use vitrina_core::{PointerButton, PointerInput, PointerKind};

/// Pointer events the host subscribes to on the canvas
pub const POINTER_EVENTS: [&str; 4] = ["pointerdown", "pointermove", "pointerup", "pointercancel"];

/// `WheelEvent.deltaMode` line height in pixels
const LINE_HEIGHT: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

impl PointerPhase {
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "pointerdown" => Some(Self::Down),
            "pointermove" => Some(Self::Move),
            "pointerup" => Some(Self::Up),
            "pointercancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Fields of a DOM `PointerEvent`, in element-local CSS pixels
#[derive(Debug, Clone, Copy)]
pub struct DomPointer<'a> {
    pub phase: PointerPhase,
    pub pointer_id: i32,
    pub pointer_type: &'a str,
    pub button: i16,
    pub offset_x: f64,
    pub offset_y: f64,
    pub modifier: bool,
}

pub fn pointer_kind(pointer_type: &str) -> PointerKind {
    match pointer_type {
        "touch" => PointerKind::Touch,
        "pen" => PointerKind::Pen,
        _ => PointerKind::Mouse,
    }
}

/// `MouseEvent.button` numbering; back/forward buttons are ignored
pub fn pointer_button(button: i16) -> Option<PointerButton> {
    match button {
        0 => Some(PointerButton::Primary),
        1 => Some(PointerButton::Middle),
        2 => Some(PointerButton::Secondary),
        _ => None,
    }
}

pub fn translate_pointer(event: &DomPointer<'_>) -> Option<PointerInput> {
    let id = event.pointer_id;
    let (x, y) = (event.offset_x as f32, event.offset_y as f32);
    Some(match event.phase {
        PointerPhase::Down => PointerInput::Down {
            id,
            kind: pointer_kind(event.pointer_type),
            button: pointer_button(event.button)?,
            x,
            y,
            modifier: event.modifier,
        },
        PointerPhase::Move => PointerInput::Move { id, x, y },
        PointerPhase::Up => PointerInput::Up { id },
        PointerPhase::Cancel => PointerInput::Cancel { id },
    })
}

/// Normalize a wheel delta to pixels; `page_height` scales page-mode deltas
pub fn translate_wheel(delta_y: f64, delta_mode: u32, page_height: f32) -> Option<PointerInput> {
    let scale = match delta_mode {
        1 => LINE_HEIGHT,
        2 => page_height,
        _ => 1.0,
    };
    let delta_y = delta_y as f32 * scale;
    (delta_y != 0.0).then_some(PointerInput::Wheel { delta_y })
}
