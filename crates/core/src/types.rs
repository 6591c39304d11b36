use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Window identifier (CGWindowID on macOS, HWND on Windows)
pub type WindowId = u64;

/// Absolute screen coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, (dx, dy): (i32, i32)) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Screen-coordinate bounding box of a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub l: i32,
    pub t: i32,
    pub r: i32,
    pub b: i32,
    pub w: i32,
    pub h: i32,
    pub cx: i32,
    pub cy: i32,
}

impl Region {
    /// Build from left/top/width/height.
    pub fn from_ltwh(l: i32, t: i32, w: i32, h: i32) -> Self {
        Self {
            l, t, r: l + w, b: t + h,
            w, h, cx: l + w / 2, cy: t + h / 2,
        }
    }

    /// Build from a left/top/right/bottom rectangle (GetWindowRect style).
    pub fn from_ltrb(l: i32, t: i32, r: i32, b: i32) -> Self {
        Self::from_ltwh(l, t, r - l, b - t)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.l, self.t)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// One visible top-level window, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub pid: u32,
    /// Full path of the owning process image, or the owner name when the
    /// platform cannot resolve a path.
    pub exe: String,
    pub title: String,
}

/// A captured screen area with the absolute position of its top-left pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: image::RgbaImage,
    pub origin: Point,
}

/// A recognized word and its bounding box, relative to the scanned image.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub conf: f32,
}

impl Word {
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2, self.top + self.height / 2)
    }
}

/// One click step of a routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub button: String,
    /// Log a warning when the button is not on screen.
    pub warn_on_miss: bool,
}

/// Why the poll loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    TooManyErrors,
}

/// Set-once stop request shared between the hotkey listener and the poll
/// loop. Never resets.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_from_rect() {
        let r = Region::from_ltrb(100, 50, 1380, 770);
        assert_eq!((r.w, r.h), (1280, 720));
        assert_eq!((r.cx, r.cy), (740, 410));
        assert_eq!(r.origin(), Point::new(100, 50));
    }

    #[test]
    fn stop_signal_is_shared_and_sticky() {
        let stop = StopSignal::new();
        let other = stop.clone();
        assert!(!stop.is_set());
        other.trigger();
        other.trigger();
        assert!(stop.is_set());
    }

    #[test]
    fn word_center_is_relative() {
        let w = Word { text: "Dismiss".into(), left: 10, top: 10, width: 50, height: 20, conf: 91.0 };
        assert_eq!(w.center(), Point::new(35, 20));
    }
}
