use std::process::Command as ProcessCommand;

use anyhow::{bail, Result};
use core_foundation::array::CFArray;
use core_foundation::base::TCFType;
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::window::*;

use crate::logger::Logger;
use crate::types::*;
use super::{spawn_detached, Platform};

pub struct DarwinPlatform {
    log: Logger,
}

impl DarwinPlatform {
    pub fn new(log: Logger) -> Self {
        DarwinPlatform { log }
    }
}

/// One on-screen window from the CG window list.
struct CgWindow {
    id: WindowId,
    pid: i32,
    owner: String,
    name: String,
    layer: Option<i64>,
    bounds: Option<Region>,
}

fn list_windows() -> Option<Vec<CgWindow>> {
    let mut out = Vec::new();
    unsafe {
        let option = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;
        let window_list_ref = CGWindowListCopyWindowInfo(option, kCGNullWindowID);
        if window_list_ref.is_null() {
            return None;
        }

        let list: CFArray = CFArray::wrap_under_create_rule(window_list_ref as _);
        let values = list.get_all_values();

        for dict_ptr in &values {
            let dict: CFDictionary<CFString, *const std::ffi::c_void> =
                CFDictionary::wrap_under_get_rule(*dict_ptr as _);

            let Some(id) = get_cf_number(&dict, "kCGWindowNumber") else { continue };
            let bounds = get_cf_dict(&dict, "kCGWindowBounds").map(|b| {
                let x = get_cf_number(&b, "X").unwrap_or(0) as i32;
                let y = get_cf_number(&b, "Y").unwrap_or(0) as i32;
                let w = get_cf_number(&b, "Width").unwrap_or(0) as i32;
                let h = get_cf_number(&b, "Height").unwrap_or(0) as i32;
                Region::from_ltwh(x, y, w, h)
            });

            out.push(CgWindow {
                id: id as WindowId,
                pid: get_cf_number(&dict, "kCGWindowOwnerPID").unwrap_or(0) as i32,
                owner: get_cf_string(&dict, "kCGWindowOwnerName").unwrap_or_default(),
                name: get_cf_string(&dict, "kCGWindowName").unwrap_or_default(),
                layer: get_cf_number(&dict, "kCGWindowLayer"),
                bounds,
            });
        }
    }
    Some(out)
}

/// Executable path of `pid`, via proc_pidpath.
fn process_path(pid: i32) -> Option<String> {
    let mut buf = vec![0u8; libc::PROC_PIDPATHINFO_MAXSIZE as usize];
    let len = unsafe { libc::proc_pidpath(pid, buf.as_mut_ptr() as *mut _, buf.len() as u32) };
    if len <= 0 {
        return None;
    }
    buf.truncate(len as usize);
    String::from_utf8(buf).ok()
}

impl Platform for DarwinPlatform {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        let Some(list) = list_windows() else {
            bail!("failed to get window list");
        };

        Ok(list
            .into_iter()
            .filter(|w| w.layer == Some(0) && w.pid > 0)
            .map(|w| {
                let title = if !w.name.is_empty() { w.name } else { w.owner.clone() };
                let exe = process_path(w.pid).unwrap_or(w.owner);
                WindowInfo { id: w.id, pid: w.pid as u32, exe, title }
            })
            .collect())
    }

    fn window_rect(&self, id: WindowId) -> Option<Region> {
        list_windows()?.into_iter().find(|w| w.id == id)?.bounds
    }

    fn focus(&self, id: WindowId, maximize: bool) -> Result<()> {
        let Some(win) = list_windows().and_then(|l| l.into_iter().find(|w| w.id == id)) else {
            bail!("window {} no longer exists", id);
        };
        if maximize {
            // No scriptable maximize that works across apps
            self.log.debug("maximize not supported on macOS, focusing only");
        }

        let script = format!(
            "tell application \"System Events\" to set frontmost of first process whose unix id is {} to true",
            win.pid
        );
        let status = ProcessCommand::new("osascript")
            .arg("-e")
            .arg(&script)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;
        if !status.success() {
            bail!("osascript failed to activate pid {} ({})", win.pid, status);
        }
        Ok(())
    }

    fn launch(&self, command: &str) -> Result<()> {
        spawn_detached(command)
    }
}

// --- CF Dictionary helpers ---

unsafe fn get_cf_string(
    dict: &CFDictionary<CFString, *const std::ffi::c_void>,
    key: &str,
) -> Option<String> {
    let cf_key = CFString::new(key);
    let value = dict.find(&cf_key)?;
    let cf_str: CFString = CFString::wrap_under_get_rule(*value as _);
    Some(cf_str.to_string())
}

unsafe fn get_cf_number(
    dict: &CFDictionary<CFString, *const std::ffi::c_void>,
    key: &str,
) -> Option<i64> {
    let cf_key = CFString::new(key);
    let value = dict.find(&cf_key)?;
    let cf_num: CFNumber = CFNumber::wrap_under_get_rule(*value as _);
    cf_num.to_i64()
}

unsafe fn get_cf_dict(
    dict: &CFDictionary<CFString, *const std::ffi::c_void>,
    key: &str,
) -> Option<CFDictionary<CFString, *const std::ffi::c_void>> {
    let cf_key = CFString::new(key);
    let value = dict.find(&cf_key)?;
    Some(CFDictionary::wrap_under_get_rule(*value as _))
}
