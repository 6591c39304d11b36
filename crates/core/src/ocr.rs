use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, GrayImage};
use rusty_tesseract::{image_to_data, Args, Image};

use crate::logger::Logger;
use crate::platform::Screen;
use crate::types::{Point, Region, Word};

/// Turns a greyscale image into words with pixel boxes.
pub trait TextRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<Vec<Word>>;
}

/// Make the Tesseract binary at `exe` reachable for the OCR wrapper by
/// putting its directory in front of `PATH`. Called once at startup.
pub fn configure_tesseract(exe: &Path, log: &Logger) {
    if !exe.exists() {
        log.warn(format!("tesseract not found at {}, text scanning will fail", exe.display()));
        return;
    }
    let Some(dir) = exe.parent() else { return };

    let mut dirs = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&existing));
    }
    match std::env::join_paths(dirs) {
        Ok(path) => {
            std::env::set_var("PATH", path);
            log.debug(format!("tesseract dir {} added to PATH", dir.display()));
        }
        Err(e) => log.warn(format!("could not extend PATH with {}: {}", dir.display(), e)),
    }
}

/// Tesseract through `rusty-tesseract`, which shells out to the binary.
pub struct TesseractRecognizer {
    lang: String,
}

impl TesseractRecognizer {
    pub fn new(lang: &str) -> Self {
        Self { lang: lang.to_string() }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&mut self, image: &GrayImage) -> Result<Vec<Word>> {
        let file = tempfile::Builder::new().prefix("tapper-ocr-").suffix(".png").tempfile()?;
        image.save(file.path()).context("failed to write OCR input")?;

        let path = file.path().to_str().ok_or_else(|| anyhow!("non UTF-8 temp path"))?;
        let input = Image::from_path(path).map_err(|e| anyhow!("failed to load OCR input: {:?}", e))?;
        let args = Args { lang: self.lang.clone(), ..Args::default() };
        let output = image_to_data(&input, &args).map_err(|e| anyhow!("tesseract failed: {:?}", e))?;

        Ok(output
            .data
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| Word {
                text: d.text,
                left: d.left,
                top: d.top,
                width: d.width,
                height: d.height,
                conf: d.conf,
            })
            .collect())
    }
}

/// Finds words inside a screen region.
pub struct TextScanner {
    screen: Box<dyn Screen>,
    recognizer: Box<dyn TextRecognizer>,
    log: Logger,
}

impl TextScanner {
    pub fn new(screen: Box<dyn Screen>, recognizer: Box<dyn TextRecognizer>, log: Logger) -> Self {
        Self { screen, recognizer, log }
    }

    /// Absolute center of the first recognized word (engine order) whose
    /// lowercased text satisfies `pred`. `None` without a region.
    pub fn find_word<F>(&mut self, region: Option<Region>, pred: F) -> Result<Option<Point>>
    where
        F: Fn(&str) -> bool,
    {
        let Some(region) = region else {
            return Ok(None);
        };

        let frame = self.screen.capture(Some(region)).context("region capture failed")?;
        let gray = imageops::grayscale(&frame.image);
        let words = self.recognizer.recognize(&gray)?;
        self.log.debug(format!("{} words in {}x{}", words.len(), gray.width(), gray.height()));

        let hit = words.iter().find(|w| pred(&w.text.to_lowercase()));
        Ok(hit.map(|w| {
            let c = w.center();
            Point::new(frame.origin.x + c.x, frame.origin.y + c.y)
        }))
    }
}

/// Matches the label of a modal's dismiss button.
pub fn is_dismiss(word: &str) -> bool {
    word.contains("dismiss")
}
