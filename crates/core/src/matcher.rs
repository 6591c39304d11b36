use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::logger::Logger;
use crate::platform::Screen;
use crate::settings::Settings;
use crate::types::Point;

/// Templates smaller than this (per side, after downscaling) skip the
/// coarse pass.
const MIN_COARSE_SIDE: u32 = 8;

/// Per-pixel variance below which an area counts as flat.
const FLAT_VARIANCE: f64 = 1.0;

/// Summed-area tables of pixel values and their squares.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let (mut row, mut row_sq) = (0u64, 0u64);
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32)[0] as u64;
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sq[i] = sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    /// (sum, sum of squares) over the `w`x`h` window at `(x, y)`.
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let area = |t: &[u64]| {
            let at = |x: usize, y: usize| t[y * self.stride + x];
            (at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0)) as f64
        };
        (area(&self.sum), area(&self.sq))
    }
}

/// Best placement of `template` inside `image` as (top-left, score). The
/// score is the zero-mean normalized cross-correlation in [-1, 1]; flat
/// windows score 0 and a flat template never matches.
pub fn best_match(image: &GrayImage, template: &GrayImage) -> Option<((u32, u32), f32)> {
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > image.width() || th > image.height() {
        return None;
    }

    let n = (tw * th) as f64;
    let (t_sum, t_sq) = template.pixels().fold((0.0, 0.0), |(s, q), p| {
        let v = p[0] as f64;
        (s + v, q + v * v)
    });
    let t_var = t_sq - t_sum * t_sum / n;
    if t_var < n * FLAT_VARIANCE {
        return None;
    }

    let sums = Integral::new(image);
    let cross = match_template(image, template, MatchTemplateMethod::CrossCorrelation);
    let mut best: Option<((u32, u32), f32)> = None;
    for (x, y, p) in cross.enumerate_pixels() {
        let (i_sum, i_sq) = sums.window(x, y, tw, th);
        let i_var = i_sq - i_sum * i_sum / n;
        let score = if i_var < n * FLAT_VARIANCE {
            0.0
        } else {
            ((p[0] as f64 - i_sum * t_sum / n) / (t_var * i_var).sqrt()) as f32
        };
        if best.map_or(true, |(_, s)| score > s) {
            best = Some(((x, y), score));
        }
    }
    best
}

/// Coarse-to-fine search: match both images downscaled by `scale`, then
/// rescan at full resolution in a window around the coarse hit.
pub fn locate(image: &GrayImage, template: &GrayImage, scale: u32) -> Option<((u32, u32), f32)> {
    let (tw, th) = template.dimensions();
    let scale = scale.max(1);
    if scale == 1 || tw / scale < MIN_COARSE_SIDE || th / scale < MIN_COARSE_SIDE {
        return best_match(image, template);
    }

    let small_image = imageops::resize(image, image.width() / scale, image.height() / scale, FilterType::Triangle);
    let small_template = imageops::resize(template, tw / scale, th / scale, FilterType::Triangle);
    let ((cx, cy), _) = best_match(&small_image, &small_template)?;

    let margin = 2 * scale;
    let x0 = (cx * scale).saturating_sub(margin);
    let y0 = (cy * scale).saturating_sub(margin);
    let x1 = (cx * scale + tw + margin).min(image.width());
    let y1 = (cy * scale + th + margin).min(image.height());
    let window = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();

    let ((x, y), score) = best_match(&window, template)?;
    Some(((x0 + x, y0 + y), score))
}

struct ButtonTemplate {
    path: PathBuf,
    confidence: Option<f32>,
}

/// Finds button bitmaps on the primary screen and remembers where they were.
pub struct TemplateMatcher {
    screen: Box<dyn Screen>,
    buttons: HashMap<String, ButtonTemplate>,
    default_confidence: f32,
    coarse_scale: u32,
    /// Decoded bitmaps, kept for the process lifetime.
    templates: HashMap<String, GrayImage>,
    /// Last successful location per button.
    locations: HashMap<String, Point>,
    log: Logger,
}

impl TemplateMatcher {
    pub fn new(screen: Box<dyn Screen>, settings: &Settings, log: Logger) -> Self {
        let buttons = settings
            .buttons
            .iter()
            .map(|(name, b)| {
                let t = ButtonTemplate { path: settings.template_path(name), confidence: b.confidence };
                (name.clone(), t)
            })
            .collect();

        Self {
            screen,
            buttons,
            default_confidence: settings.detection.confidence,
            coarse_scale: settings.detection.coarse_scale,
            templates: HashMap::new(),
            locations: HashMap::new(),
            log,
        }
    }

    /// Center of button `name` on screen. `confidence` overrides the
    /// per-button and global thresholds. With `use_cache`, a remembered
    /// location is returned without capturing.
    pub fn find(&mut self, name: &str, confidence: Option<f32>, use_cache: bool) -> Result<Option<Point>> {
        let button = self.buttons.get(name).ok_or_else(|| anyhow!("unknown button '{}'", name))?;
        let threshold = confidence.or(button.confidence).unwrap_or(self.default_confidence);

        if use_cache {
            if let Some(p) = self.locations.get(name) {
                self.log.debug(format!("{} cached at ({}, {})", name, p.x, p.y));
                return Ok(Some(*p));
            }
        }

        if !self.templates.contains_key(name) {
            if !button.path.exists() {
                self.log.warn(format!("template {} not found", button.path.display()));
                return Ok(None);
            }
            let decoded = image::open(&button.path)
                .with_context(|| format!("failed to decode template {}", button.path.display()))?
                .to_luma8();
            self.templates.insert(name.to_string(), decoded);
        }
        let template = &self.templates[name];

        let frame = self.screen.capture(None).context("screen capture failed")?;
        let screen = imageops::grayscale(&frame.image);

        let Some(((x, y), score)) = locate(&screen, template, self.coarse_scale) else {
            self.log.debug(format!("{}: no candidate", name));
            return Ok(None);
        };
        if score < threshold {
            self.log.debug(format!("{}: best score {:.3} below {:.2}", name, score, threshold));
            return Ok(None);
        }

        let center = Point::new(
            frame.origin.x + (x + template.width() / 2) as i32,
            frame.origin.y + (y + template.height() / 2) as i32,
        );
        self.log.debug(format!("{} at ({}, {}) score {:.3}", name, center.x, center.y, score));
        self.locations.insert(name.to_string(), center);
        Ok(Some(center))
    }

    /// Forget one remembered location, or all of them.
    pub fn clear(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.locations.remove(name);
            }
            None => self.locations.clear(),
        }
    }
}
