use std::cell::Cell;

use anyhow::{bail, Context, Result};
use xcap::Window;

use crate::logger::Logger;
use crate::types::*;
use super::{spawn_detached, Platform};

/// Window discovery through xcap. Focusing is not available here.
pub struct XcapPlatform {
    log: Logger,
    focus_warned: Cell<bool>,
}

impl XcapPlatform {
    pub fn new(log: Logger) -> Self {
        Self { log, focus_warned: Cell::new(false) }
    }

    fn warn_focus_unsupported(&self) {
        if !self.focus_warned.replace(true) {
            self.log.warn("focusing windows is not supported on this platform, keep the client in front yourself");
        }
    }
}

fn find(id: WindowId) -> Option<Window> {
    Window::all()
        .ok()?
        .into_iter()
        .find(|w| w.id().map(|wid| wid as WindowId == id).unwrap_or(false))
}

impl Platform for XcapPlatform {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        let mut out = Vec::new();
        for w in Window::all().context("failed to enumerate windows")? {
            if w.is_minimized().unwrap_or(false) {
                continue;
            }
            let (Ok(id), Ok(pid), Ok(title)) = (w.id(), w.pid(), w.title()) else { continue };
            let exe = std::fs::read_link(format!("/proc/{}/exe", pid))
                .map(|p| p.to_string_lossy().into_owned())
                .or_else(|_| w.app_name())
                .unwrap_or_default();
            out.push(WindowInfo { id: id as WindowId, pid, exe, title });
        }
        Ok(out)
    }

    fn window_rect(&self, id: WindowId) -> Option<Region> {
        let w = find(id)?;
        Some(Region::from_ltwh(w.x().ok()?, w.y().ok()?, w.width().ok()? as i32, w.height().ok()? as i32))
    }

    fn focus(&self, id: WindowId, _maximize: bool) -> Result<()> {
        if find(id).is_none() {
            bail!("window {} no longer exists", id);
        }
        self.warn_focus_unsupported();
        Ok(())
    }

    fn launch(&self, command: &str) -> Result<()> {
        spawn_detached(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Level;

    #[test]
    fn unsupported_focus_is_reported_once() {
        let (log, records) = Logger::capture();
        let p = XcapPlatform::new(log);
        p.warn_focus_unsupported();
        p.warn_focus_unsupported();
        let warns: Vec<_> = records.try_iter().filter(|r| r.level == Level::Warn).collect();
        assert_eq!(warns.len(), 1);
        assert!(warns[0].message.contains("not supported"));
    }
}
