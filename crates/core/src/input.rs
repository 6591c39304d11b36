use std::f64::consts::PI;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::logger::Logger;
use crate::platform::InputBackend;
use crate::settings::InputSettings;
use crate::sleep::{jittered, uniform_secs, Sleeper};
use crate::types::Point;

const DRAG_SETTLE: Duration = Duration::from_millis(50);
const DRAG_FRAME: Duration = Duration::from_millis(10);

/// Cosine ease-in-out: 0 at t=0, 1 at t=1.
pub fn ease(t: f64) -> f64 {
    (1.0 - (t * PI).cos()) / 2.0
}

fn lerp(from: Point, to: Point, k: f64) -> Point {
    Point::new(
        (from.x as f64 + (to.x - from.x) as f64 * k).round() as i32,
        (from.y as f64 + (to.y - from.y) as f64 * k).round() as i32,
    )
}

/// Human-like mouse and keyboard input on top of an `InputBackend`.
pub struct InputDriver {
    backend: Box<dyn InputBackend>,
    settings: InputSettings,
    rng: StdRng,
    sleeper: Rc<dyn Sleeper>,
    log: Logger,
}

impl InputDriver {
    pub fn new(backend: Box<dyn InputBackend>, settings: InputSettings, sleeper: Rc<dyn Sleeper>, log: Logger) -> Self {
        Self::with_rng(backend, settings, StdRng::from_entropy(), sleeper, log)
    }

    pub fn with_rng(
        backend: Box<dyn InputBackend>,
        settings: InputSettings,
        rng: StdRng,
        sleeper: Rc<dyn Sleeper>,
        log: Logger,
    ) -> Self {
        Self { backend, settings, rng, sleeper, log }
    }

    /// Move along a cosine-eased path of `steps` points (configured default
    /// when `None`). The last point is always exactly `(x, y)`.
    pub fn move_to(&mut self, x: i32, y: i32, steps: Option<u32>) -> Result<()> {
        let steps = steps.unwrap_or(self.settings.move_steps).max(1);
        let start = self.backend.position()?;
        let target = Point::new(x, y);

        for i in 1..=steps {
            let p = if i == steps {
                target
            } else {
                lerp(start, target, ease(i as f64 / steps as f64))
            };
            self.backend.move_to(p)?;
            let (lo, hi) = self.settings.move_delay;
            self.sleeper.sleep(uniform_secs(&mut self.rng, lo, hi));
        }

        self.log.debug(format!("moved to ({}, {})", x, y));
        Ok(())
    }

    /// Small random back-and-forth moves that cancel out exactly.
    fn wiggle(&mut self) -> Result<()> {
        let (min, max) = (self.settings.wiggle_min_offset, self.settings.wiggle_max_offset);
        for _ in 0..self.settings.wiggle_iterations {
            let dx = self.rng.gen_range(min.0.min(max.0)..=max.0.max(min.0));
            let dy = self.rng.gen_range(min.1.min(max.1)..=max.1.max(min.1));
            self.backend.move_by(dx, dy)?;
            let (lo, hi) = self.settings.wiggle_delay;
            self.sleeper.sleep(uniform_secs(&mut self.rng, lo, hi));
            self.backend.move_by(-dx, -dy)?;
        }
        Ok(())
    }

    /// Move, wiggle, then primary click.
    pub fn click(&mut self, x: i32, y: i32) -> Result<()> {
        self.move_to(x, y, None)?;
        self.wiggle()?;
        self.backend.click()?;
        self.log.debug(format!("clicked at ({}, {})", x, y));
        Ok(())
    }

    /// Hold `key` for `duration` seconds give or take 50ms.
    pub fn press_key(&mut self, key: &str, duration: f64) -> Result<()> {
        let hold = jittered(&mut self.rng, duration, 0.05);
        self.backend.key_down(key)?;
        self.sleeper.sleep(hold);
        let released = self.backend.key_up(key);
        self.log.debug(format!("pressed {} for {:.3}s", key, hold.as_secs_f64()));
        released
    }

    /// Press at `(x1, y1)`, ease to `(x2, y2)` over `duration` seconds of
    /// wall-clock time, release.
    pub fn drag(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, duration: f64) -> Result<()> {
        let from = Point::new(x1, y1);
        let to = Point::new(x2, y2);
        let total = Duration::from_secs_f64(duration.max(0.0));

        self.move_to(x1, y1, None)?;
        self.backend.mouse_down()?;
        self.sleeper.sleep(DRAG_SETTLE);

        let result = (|| -> Result<()> {
            let start = Instant::now();
            loop {
                let elapsed = start.elapsed();
                if elapsed >= total {
                    break;
                }
                let progress = elapsed.as_secs_f64() / total.as_secs_f64();
                self.backend.move_to(lerp(from, to, ease(progress)))?;
                self.sleeper.sleep(DRAG_FRAME);
            }
            self.backend.move_to(to)?;
            self.sleeper.sleep(DRAG_SETTLE);
            Ok(())
        })();

        // Never leave the button held
        let released = self.backend.mouse_up();
        result.and(released)?;
        self.log.debug(format!("dragged ({}, {}) -> ({}, {})", x1, y1, x2, y2));
        Ok(())
    }
}
