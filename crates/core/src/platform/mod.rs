pub mod desktop;
pub mod hotkey;
pub mod stub;

#[cfg(target_os = "macos")]
pub mod darwin;
#[cfg(target_os = "windows")]
pub mod win32;
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod xwin;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use crate::logger::Logger;
use crate::types::*;

/// Window-manager operations.
pub trait Platform {
    /// Visible top-level windows, in enumeration order.
    fn windows(&self) -> Result<Vec<WindowInfo>>;
    /// Current bounding rectangle, `None` when the window is gone.
    fn window_rect(&self, id: WindowId) -> Option<Region>;
    /// Bring to foreground, maximizing first when asked.
    fn focus(&self, id: WindowId, maximize: bool) -> Result<()>;
    /// Spawn the target program without waiting for it.
    fn launch(&self, command: &str) -> Result<()>;
}

/// Screen capture.
pub trait Screen {
    /// Capture `region`, or the whole primary monitor when `None`.
    fn capture(&mut self, region: Option<Region>) -> Result<Frame>;
}

/// One capture backend used by several components on the poll thread.
pub type SharedScreen = Rc<RefCell<dyn Screen>>;

impl<S: Screen + ?Sized> Screen for Rc<RefCell<S>> {
    fn capture(&mut self, region: Option<Region>) -> Result<Frame> {
        self.borrow_mut().capture(region)
    }
}

/// Synthetic mouse and keyboard events.
pub trait InputBackend {
    fn position(&mut self) -> Result<Point>;
    fn move_to(&mut self, p: Point) -> Result<()>;
    fn move_by(&mut self, dx: i32, dy: i32) -> Result<()>;
    fn mouse_down(&mut self) -> Result<()>;
    fn mouse_up(&mut self) -> Result<()>;
    fn click(&mut self) -> Result<()>;
    fn key_down(&mut self, key: &str) -> Result<()>;
    fn key_up(&mut self, key: &str) -> Result<()>;
}

/// The OS-facing backends a bot needs.
pub struct Backends {
    pub platform: Box<dyn Platform>,
    pub screen: SharedScreen,
    pub input: Box<dyn InputBackend>,
}

/// Create the backends appropriate for the current OS.
pub fn create_platform(force_stub: bool, log: &Logger) -> Result<Backends> {
    if force_stub {
        let log = log.with_prefix("stub");
        return Ok(Backends {
            platform: Box::new(stub::StubPlatform::new(log.clone())),
            screen: Rc::new(RefCell::new(stub::StubScreen::new(log.clone()))),
            input: Box::new(stub::StubInput::new(log)),
        });
    }

    #[cfg(target_os = "macos")]
    let platform: Box<dyn Platform> = Box::new(darwin::DarwinPlatform::new(log.with_prefix("darwin")));
    #[cfg(target_os = "windows")]
    let platform: Box<dyn Platform> = Box::new(win32::Win32Platform::new(log.with_prefix("win32")));
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let platform: Box<dyn Platform> = Box::new(xwin::XcapPlatform::new(log.with_prefix("xcap")));

    Ok(Backends {
        platform,
        screen: Rc::new(RefCell::new(desktop::XcapScreen)),
        input: Box::new(desktop::EnigoInput::new()?),
    })
}

/// Spawn `command` detached; shared by the real backends.
pub(crate) fn spawn_detached(command: &str) -> Result<()> {
    use anyhow::Context;
    std::process::Command::new(command)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start {}", command))?;
    Ok(())
}
