use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

use crate::logger::Logger;
use crate::platform::Platform;
use crate::settings::Target;
use crate::sleep::Sleeper;
use crate::types::*;

/// Finds and focuses the target client's main window.
pub struct WindowLocator {
    platform: Box<dyn Platform>,
    process_re: Regex,
    title_re: Regex,
    launch_command: String,
    startup_wait: Duration,
    focus_delay: Duration,
    sleeper: Rc<dyn Sleeper>,
    log: Logger,
}

impl WindowLocator {
    pub fn new(platform: Box<dyn Platform>, target: &Target, sleeper: Rc<dyn Sleeper>, log: Logger) -> Result<Self> {
        let process_re = Regex::new(&format!("(?i){}", target.process_pattern))
            .with_context(|| format!("invalid process pattern '{}'", target.process_pattern))?;
        let title_re = Regex::new(&format!("(?i){}", target.title_pattern))
            .with_context(|| format!("invalid title pattern '{}'", target.title_pattern))?;

        Ok(Self {
            platform,
            process_re,
            title_re,
            launch_command: target.launch_command.clone(),
            startup_wait: Duration::from_secs_f64(target.startup_wait_secs.max(0.0)),
            focus_delay: Duration::from_millis(target.focus_delay_ms),
            sleeper,
            log,
        })
    }

    /// The authoritative target window: among visible windows whose process
    /// image and title both match, the lowest pid wins, then the lowest id.
    pub fn find_target_window(&self) -> Option<WindowInfo> {
        let windows = match self.platform.windows() {
            Ok(w) => w,
            Err(e) => {
                self.log.error(format!("window enumeration failed: {:#}", e));
                return None;
            }
        };

        let mut matches: Vec<WindowInfo> = windows
            .into_iter()
            .filter(|w| !w.title.is_empty() && self.title_re.is_match(&w.title))
            .filter(|w| !w.exe.is_empty() && self.process_re.is_match(&w.exe))
            .collect();
        matches.sort_by_key(|w| (w.pid, w.id));

        if matches.len() > 1 {
            self.log.debug(format!(
                "{} candidate windows, using pid {} ({:#x})",
                matches.len(),
                matches[0].pid,
                matches[0].id
            ));
        }
        matches.into_iter().next()
    }

    /// Current (left, top, width, height) of `id`, or `None` if it is gone.
    pub fn get_region(&self, id: WindowId) -> Option<Region> {
        let region = self.platform.window_rect(id).filter(|r| !r.is_empty());
        if region.is_none() {
            self.log.debug(format!("no region for window {:#x}", id));
        }
        region
    }

    /// Region of the current target window.
    pub fn target_region(&self) -> Option<Region> {
        let win = self.find_target_window()?;
        self.get_region(win.id)
    }

    pub fn focus(&self, id: WindowId, maximize: bool) -> bool {
        match self.platform.focus(id, maximize) {
            Ok(()) => {
                self.sleeper.sleep(self.focus_delay);
                true
            }
            Err(e) => {
                self.log.error(format!("failed to focus window: {:#}", e));
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.find_target_window().is_some()
    }

    /// Locate (launching the client first when allowed), then focus and
    /// maximize.
    pub fn ensure_focused(&self, start_if_missing: bool) -> bool {
        let win = match self.find_target_window() {
            Some(w) => w,
            None if start_if_missing => {
                self.log.info(format!("target not found, starting {}", self.launch_command));
                if let Err(e) = self.platform.launch(&self.launch_command) {
                    self.log.error(format!("{:#}", e));
                    return false;
                }
                self.sleeper.sleep(self.startup_wait);
                match self.find_target_window() {
                    Some(w) => w,
                    None => {
                        self.log.error("target still not found after starting it");
                        return false;
                    }
                }
            }
            None => {
                self.log.error("target window not found");
                return false;
            }
        };

        if !self.focus(win.id, true) {
            return false;
        }
        self.log.info(format!("focused \"{}\" (pid {})", win.title, win.pid));
        true
    }
}
