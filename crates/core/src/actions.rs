use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::input::InputDriver;
use crate::logger::Logger;
use crate::matcher::TemplateMatcher;
use crate::settings::Settings;

/// Click-a-named-button on top of the matcher and the input driver.
pub struct ButtonActions {
    matcher: TemplateMatcher,
    input: InputDriver,
    offsets: HashMap<String, (i32, i32)>,
    log: Logger,
}

impl ButtonActions {
    pub fn new(matcher: TemplateMatcher, input: InputDriver, settings: &Settings, log: Logger) -> Self {
        let offsets = settings.buttons.iter().map(|(name, b)| (name.clone(), b.offset)).collect();
        Self { matcher, input, offsets, log }
    }

    pub fn input(&mut self) -> &mut InputDriver {
        &mut self.input
    }

    /// Find `name` and click it, shifted by `offset` (configured offset when
    /// `None`). A miss returns `false` with one warning.
    pub fn click_button(&mut self, name: &str, offset: Option<(i32, i32)>, confidence: Option<f32>) -> Result<bool> {
        let clicked = self.try_click(name, offset, confidence)?;
        if !clicked {
            self.log.warn(format!("{} button not found", name));
        }
        Ok(clicked)
    }

    /// Like `click_button`, for buttons that are usually absent.
    pub fn click_button_if_visible(&mut self, name: &str, offset: Option<(i32, i32)>) -> Result<bool> {
        let clicked = self.try_click(name, offset, None)?;
        if !clicked {
            self.log.debug(format!("{} not visible", name));
        }
        Ok(clicked)
    }

    fn try_click(&mut self, name: &str, offset: Option<(i32, i32)>, confidence: Option<f32>) -> Result<bool> {
        let configured = *self.offsets.get(name).ok_or_else(|| anyhow!("unknown button '{}'", name))?;
        // Always rescan: a cached hit would click a button that is gone
        let Some(center) = self.matcher.find(name, confidence, false)? else {
            return Ok(false);
        };

        let p = center.offset(offset.unwrap_or(configured));
        self.input.click(p.x, p.y)?;
        self.log.info(format!("clicked {} at ({}, {})", name, p.x, p.y));
        Ok(true)
    }
}
