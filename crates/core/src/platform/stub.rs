use anyhow::Result;
use image::RgbaImage;

use crate::logger::Logger;
use crate::ocr::TextRecognizer;
use crate::types::*;
use super::{InputBackend, Platform, Screen};

const STUB_WINDOW: WindowId = 10001;

/// Dry-run platform: one fake client window filling a 1920x1080 screen.
pub struct StubPlatform {
    log: Logger,
}

impl StubPlatform {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }
}

impl Platform for StubPlatform {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        self.log.debug("windows()");
        Ok(vec![WindowInfo {
            id: STUB_WINDOW,
            pid: 4242,
            exe: r"C:\Stub\RobloxPlayerBeta.exe".into(),
            title: "Roblox".into(),
        }])
    }

    fn window_rect(&self, id: WindowId) -> Option<Region> {
        (id == STUB_WINDOW).then(|| Region::from_ltwh(0, 0, 1920, 1080))
    }

    fn focus(&self, id: WindowId, maximize: bool) -> Result<()> {
        self.log.info(format!("win({}).focus(maximize={})", id, maximize));
        Ok(())
    }

    fn launch(&self, command: &str) -> Result<()> {
        self.log.info(format!("launch(\"{}\")", command));
        Ok(())
    }
}

/// Always returns a black frame.
pub struct StubScreen {
    log: Logger,
}

impl StubScreen {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }
}

impl Screen for StubScreen {
    fn capture(&mut self, region: Option<Region>) -> Result<Frame> {
        self.log.debug(format!("capture({:?})", region));
        let r = region.unwrap_or_else(|| Region::from_ltwh(0, 0, 1920, 1080));
        Ok(Frame {
            image: RgbaImage::new(r.w.max(1) as u32, r.h.max(1) as u32),
            origin: r.origin(),
        })
    }
}

/// Tracks the cursor and logs events without injecting anything.
pub struct StubInput {
    log: Logger,
    pos: Point,
}

impl StubInput {
    pub fn new(log: Logger) -> Self {
        Self { log, pos: Point::default() }
    }
}

impl InputBackend for StubInput {
    fn position(&mut self) -> Result<Point> {
        Ok(self.pos)
    }

    fn move_to(&mut self, p: Point) -> Result<()> {
        self.pos = p;
        Ok(())
    }

    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.pos = self.pos.offset((dx, dy));
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<()> {
        self.log.debug(format!("mouse_down at ({}, {})", self.pos.x, self.pos.y));
        Ok(())
    }

    fn mouse_up(&mut self) -> Result<()> {
        self.log.debug(format!("mouse_up at ({}, {})", self.pos.x, self.pos.y));
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.log.info(format!("click at ({}, {})", self.pos.x, self.pos.y));
        Ok(())
    }

    fn key_down(&mut self, key: &str) -> Result<()> {
        self.log.debug(format!("key_down(\"{}\")", key));
        Ok(())
    }

    fn key_up(&mut self, key: &str) -> Result<()> {
        self.log.debug(format!("key_up(\"{}\")", key));
        Ok(())
    }
}

/// Recognizes nothing.
pub struct StubRecognizer;

impl TextRecognizer for StubRecognizer {
    fn recognize(&mut self, _image: &image::GrayImage) -> Result<Vec<Word>> {
        Ok(Vec::new())
    }
}
