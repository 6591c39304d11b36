//! In-memory backends for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use image::{imageops, GrayImage, RgbaImage};

use crate::ocr::TextRecognizer;
use crate::platform::{InputBackend, Platform, Screen};
use crate::sleep::Sleeper;
use crate::types::*;

#[derive(Default)]
struct PlatformState {
    windows: Vec<WindowInfo>,
    rects: HashMap<WindowId, Region>,
    on_launch: Option<WindowInfo>,
    launches: Vec<String>,
    focused: Vec<(WindowId, bool)>,
    fail_focus: bool,
}

/// Scripted window list. Clones share state.
#[derive(Clone, Default)]
pub struct FakePlatform(Rc<RefCell<PlatformState>>);

impl FakePlatform {
    pub fn new(windows: Vec<WindowInfo>) -> Self {
        let p = Self::default();
        p.set_windows(windows);
        p
    }

    pub fn set_windows(&self, windows: Vec<WindowInfo>) {
        self.0.borrow_mut().windows = windows;
    }

    pub fn set_rect(&self, id: WindowId, region: Region) {
        self.0.borrow_mut().rects.insert(id, region);
    }

    /// `win` shows up once `launch` is called.
    pub fn appear_on_launch(&self, win: WindowInfo) {
        self.0.borrow_mut().on_launch = Some(win);
    }

    pub fn fail_focus(&self, fail: bool) {
        self.0.borrow_mut().fail_focus = fail;
    }

    pub fn launches(&self) -> Vec<String> {
        self.0.borrow().launches.clone()
    }

    pub fn focused(&self) -> Vec<(WindowId, bool)> {
        self.0.borrow().focused.clone()
    }
}

impl Platform for FakePlatform {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.0.borrow().windows.clone())
    }

    fn window_rect(&self, id: WindowId) -> Option<Region> {
        let s = self.0.borrow();
        if !s.windows.iter().any(|w| w.id == id) {
            return None;
        }
        Some(s.rects.get(&id).copied().unwrap_or_else(|| Region::from_ltwh(0, 0, 1920, 1080)))
    }

    fn focus(&self, id: WindowId, maximize: bool) -> Result<()> {
        let mut s = self.0.borrow_mut();
        if s.fail_focus {
            bail!("access denied");
        }
        s.focused.push((id, maximize));
        Ok(())
    }

    fn launch(&self, command: &str) -> Result<()> {
        let mut s = self.0.borrow_mut();
        s.launches.push(command.to_string());
        if let Some(win) = s.on_launch.take() {
            s.windows.push(win);
        }
        Ok(())
    }
}

struct ScreenState {
    desktop: RgbaImage,
    captures: Vec<Option<Region>>,
    fail: bool,
    script: VecDeque<bool>,
}

/// Serves crops of a fixed desktop image. Clones share state.
#[derive(Clone)]
pub struct FakeScreen(Rc<RefCell<ScreenState>>);

impl FakeScreen {
    pub fn new(desktop: RgbaImage) -> Self {
        Self(Rc::new(RefCell::new(ScreenState { desktop, captures: Vec::new(), fail: false, script: VecDeque::new() })))
    }

    pub fn blank(w: u32, h: u32) -> Self {
        Self::new(RgbaImage::new(w, h))
    }

    pub fn set_desktop(&self, desktop: RgbaImage) {
        self.0.borrow_mut().desktop = desktop;
    }

    pub fn fail(&self, fail: bool) {
        self.0.borrow_mut().fail = fail;
    }

    /// Fail (`true`) or succeed the next captures in order, then fall back
    /// to the `fail` flag.
    pub fn script(&self, outcomes: &[bool]) {
        self.0.borrow_mut().script.extend(outcomes);
    }

    pub fn captures(&self) -> Vec<Option<Region>> {
        self.0.borrow().captures.clone()
    }
}

impl Screen for FakeScreen {
    fn capture(&mut self, region: Option<Region>) -> Result<Frame> {
        let mut s = self.0.borrow_mut();
        s.captures.push(region);
        let fail = s.script.pop_front().unwrap_or(s.fail);
        if fail {
            return Err(anyhow!("capture failed"));
        }
        match region {
            None => Ok(Frame { image: s.desktop.clone(), origin: Point::default() }),
            Some(r) => {
                let image = imageops::crop_imm(&s.desktop, r.l as u32, r.t as u32, r.w as u32, r.h as u32).to_image();
                Ok(Frame { image, origin: r.origin() })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    MoveTo(Point),
    MoveBy(i32, i32),
    Down(Point),
    Up(Point),
    Click(Point),
    KeyDown(String),
    KeyUp(String),
}

#[derive(Default)]
struct InputState {
    pos: Point,
    events: Vec<InputEvent>,
}

/// Tracks the cursor and records every event. Clones share state.
#[derive(Clone, Default)]
pub struct RecordingInput(Rc<RefCell<InputState>>);

impl RecordingInput {
    pub fn at(p: Point) -> Self {
        let input = Self::default();
        input.0.borrow_mut().pos = p;
        input
    }

    pub fn pos(&self) -> Point {
        self.0.borrow().pos
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.0.borrow().events.clone()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InputEvent::Click(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl InputBackend for RecordingInput {
    fn position(&mut self) -> Result<Point> {
        Ok(self.pos())
    }

    fn move_to(&mut self, p: Point) -> Result<()> {
        let mut s = self.0.borrow_mut();
        s.pos = p;
        s.events.push(InputEvent::MoveTo(p));
        Ok(())
    }

    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        let mut s = self.0.borrow_mut();
        s.pos = s.pos.offset((dx, dy));
        s.events.push(InputEvent::MoveBy(dx, dy));
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<()> {
        let mut s = self.0.borrow_mut();
        let p = s.pos;
        s.events.push(InputEvent::Down(p));
        Ok(())
    }

    fn mouse_up(&mut self) -> Result<()> {
        let mut s = self.0.borrow_mut();
        let p = s.pos;
        s.events.push(InputEvent::Up(p));
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        let mut s = self.0.borrow_mut();
        let p = s.pos;
        s.events.push(InputEvent::Click(p));
        Ok(())
    }

    fn key_down(&mut self, key: &str) -> Result<()> {
        self.0.borrow_mut().events.push(InputEvent::KeyDown(key.to_string()));
        Ok(())
    }

    fn key_up(&mut self, key: &str) -> Result<()> {
        self.0.borrow_mut().events.push(InputEvent::KeyUp(key.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecognizerState {
    words: Vec<Word>,
    calls: usize,
    last_size: Option<(u32, u32)>,
}

/// Returns a fixed word list. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedRecognizer(Rc<RefCell<RecognizerState>>);

impl ScriptedRecognizer {
    pub fn new(words: Vec<Word>) -> Self {
        let r = Self::default();
        r.0.borrow_mut().words = words;
        r
    }

    pub fn calls(&self) -> usize {
        self.0.borrow().calls
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.0.borrow().last_size
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<Vec<Word>> {
        let mut s = self.0.borrow_mut();
        s.calls += 1;
        s.last_size = Some(image.dimensions());
        Ok(s.words.clone())
    }
}

pub fn word(text: &str, left: i32, top: i32, width: i32, height: i32) -> Word {
    Word { text: text.into(), left, top, width, height, conf: 90.0 }
}

/// Records requested delays without sleeping. Can trigger a stop signal
/// once a given delay has been requested `n` times, to end a poll loop.
#[derive(Default)]
pub struct RecordingSleeper {
    calls: RefCell<Vec<Duration>>,
    stop_on: Option<(Duration, usize, StopSignal)>,
}

impl RecordingSleeper {
    pub fn stop_on(delay: Duration, n: usize, stop: &StopSignal) -> Self {
        Self { calls: RefCell::default(), stop_on: Some((delay, n, stop.clone())) }
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.calls.borrow().iter().sum()
    }

    /// Number of delays exactly equal to `d`.
    pub fn count(&self, d: Duration) -> usize {
        self.calls.borrow().iter().filter(|x| **x == d).count()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.borrow_mut().push(duration);
        if let Some((delay, n, stop)) = &self.stop_on {
            if self.count(*delay) >= *n {
                stop.trigger();
            }
        }
    }
}
