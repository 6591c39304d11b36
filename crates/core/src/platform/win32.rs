use std::ffi::c_void;

use anyhow::{bail, Result};
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextW, GetWindowThreadProcessId, IsIconic, IsWindow,
    IsWindowVisible, SetForegroundWindow, ShowWindow, SHOW_WINDOW_CMD, SW_MAXIMIZE, SW_RESTORE, SW_SHOW,
};

use crate::logger::Logger;
use crate::types::*;
use super::{spawn_detached, Platform};

pub struct Win32Platform {
    log: Logger,
}

/// SW_RESTORE would also un-maximize, so it is only used on minimized windows.
fn show_command(maximize: bool, minimized: bool) -> SHOW_WINDOW_CMD {
    match (maximize, minimized) {
        (true, _) => SW_MAXIMIZE,
        (false, true) => SW_RESTORE,
        (false, false) => SW_SHOW,
    }
}

impl Win32Platform {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }
}

fn to_hwnd(id: WindowId) -> HWND {
    HWND(id as usize as *mut c_void)
}

unsafe extern "system" fn collect_visible(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let out = &mut *(lparam.0 as *mut Vec<HWND>);
    if IsWindowVisible(hwnd).as_bool() {
        out.push(hwnd);
    }
    BOOL(1)
}

fn window_title(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn process_image(pid: u32) -> Option<String> {
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buf = [0u16; 1024];
        let mut size = buf.len() as u32;
        let res = QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut size);
        let _ = CloseHandle(handle);
        res.ok()?;
        Some(String::from_utf16_lossy(&buf[..size as usize]))
    }
}

impl Platform for Win32Platform {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        let mut handles: Vec<HWND> = Vec::new();
        unsafe {
            EnumWindows(Some(collect_visible), LPARAM(&mut handles as *mut Vec<HWND> as isize))?;
        }

        let mut windows = Vec::new();
        for hwnd in handles {
            let title = window_title(hwnd);
            if title.is_empty() {
                continue;
            }
            let mut pid = 0u32;
            unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
            if pid == 0 {
                continue;
            }
            // Access denied for elevated/system processes; skip them
            let Some(exe) = process_image(pid) else { continue };
            windows.push(WindowInfo { id: hwnd.0 as usize as WindowId, pid, exe, title });
        }
        Ok(windows)
    }

    fn window_rect(&self, id: WindowId) -> Option<Region> {
        let hwnd = to_hwnd(id);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return None;
            }
            let mut rect = RECT::default();
            GetWindowRect(hwnd, &mut rect).ok()?;
            Some(Region::from_ltrb(rect.left, rect.top, rect.right, rect.bottom))
        }
    }

    fn focus(&self, id: WindowId, maximize: bool) -> Result<()> {
        let hwnd = to_hwnd(id);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                bail!("window {:#x} no longer exists", id);
            }
            let _ = ShowWindow(hwnd, show_command(maximize, IsIconic(hwnd).as_bool()));
            if !SetForegroundWindow(hwnd).as_bool() {
                bail!("SetForegroundWindow refused for window {:#x}", id);
            }
        }
        self.log.debug(format!("focused window {:#x}", id));
        Ok(())
    }

    fn launch(&self, command: &str) -> Result<()> {
        spawn_detached(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_focus_keeps_a_maximized_window_maximized() {
        assert_eq!(show_command(false, false), SW_SHOW);
        assert_eq!(show_command(false, true), SW_RESTORE);
        assert_eq!(show_command(true, false), SW_MAXIMIZE);
        assert_eq!(show_command(true, true), SW_MAXIMIZE);
    }
}
