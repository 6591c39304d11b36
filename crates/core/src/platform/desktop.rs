//! Cross-platform capture and input backends (xcap + enigo).

use anyhow::{anyhow, bail, Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use image::imageops;
use xcap::Monitor;

use crate::types::*;
use super::{InputBackend, Screen};

/// Captures monitors through xcap.
pub struct XcapScreen;

impl XcapScreen {
    fn primary() -> Result<Monitor> {
        let monitors = Monitor::all().context("failed to list monitors")?;
        let primary = monitors.iter().position(|m| m.is_primary().unwrap_or(false)).unwrap_or(0);
        monitors.into_iter().nth(primary).ok_or_else(|| anyhow!("no monitors found"))
    }
}

impl Screen for XcapScreen {
    fn capture(&mut self, region: Option<Region>) -> Result<Frame> {
        let Some(region) = region else {
            let monitor = Self::primary()?;
            let origin = Point::new(monitor.x()?, monitor.y()?);
            let image = monitor.capture_image().context("failed to capture screen")?;
            return Ok(Frame { image, origin });
        };

        if region.is_empty() {
            bail!("cannot capture empty region {:?}", region);
        }

        let monitor = Monitor::from_point(region.l, region.t)
            .or_else(|_| Self::primary())
            .context("no monitor contains the region")?;
        let (mx, my) = (monitor.x()?, monitor.y()?);
        let full = monitor.capture_image().context("failed to capture screen")?;

        // Clamp to the monitor; windows may hang off the edge.
        let l = (region.l - mx).clamp(0, full.width() as i32);
        let t = (region.t - my).clamp(0, full.height() as i32);
        let r = (region.r - mx).clamp(l, full.width() as i32);
        let b = (region.b - my).clamp(t, full.height() as i32);
        if r == l || b == t {
            bail!("region {:?} is off screen", region);
        }

        let image = imageops::crop_imm(&full, l as u32, t as u32, (r - l) as u32, (b - t) as u32).to_image();
        Ok(Frame { image, origin: Point::new(mx + l, my + t) })
    }
}

/// Injects input through enigo.
pub struct EnigoInput {
    enigo: Enigo,
}

impl EnigoInput {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("failed to initialize input injection: {}", e))?;
        Ok(Self { enigo })
    }
}

fn parse_key(key: &str) -> Result<Key> {
    let lower = key.to_lowercase();
    Ok(match lower.as_str() {
        "enter" | "return" => Key::Return,
        "escape" | "esc" => Key::Escape,
        "delete" | "backspace" => Key::Backspace,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" | "option" => Key::Alt,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Key::Unicode(ch),
                _ => bail!("unknown key: {}", key),
            }
        }
    })
}

impl InputBackend for EnigoInput {
    fn position(&mut self) -> Result<Point> {
        let (x, y) = self.enigo.location()?;
        Ok(Point::new(x, y))
    }

    fn move_to(&mut self, p: Point) -> Result<()> {
        self.enigo.move_mouse(p.x, p.y, Coordinate::Abs)?;
        Ok(())
    }

    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.enigo.move_mouse(dx, dy, Coordinate::Rel)?;
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<()> {
        self.enigo.button(Button::Left, Direction::Press)?;
        Ok(())
    }

    fn mouse_up(&mut self) -> Result<()> {
        self.enigo.button(Button::Left, Direction::Release)?;
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.enigo.button(Button::Left, Direction::Click)?;
        Ok(())
    }

    fn key_down(&mut self, key: &str) -> Result<()> {
        self.enigo.key(parse_key(key)?, Direction::Press)?;
        Ok(())
    }

    fn key_up(&mut self, key: &str) -> Result<()> {
        self.enigo.key(parse_key(key)?, Direction::Release)?;
        Ok(())
    }
}
