use crate::logger::Logger;
use crate::types::StopSignal;

/// Human-readable stop chord for the current platform.
#[cfg(target_os = "macos")]
pub const STOP_CHORD: &str = "Cmd+Shift+P";
#[cfg(not(target_os = "macos"))]
pub const STOP_CHORD: &str = "Ctrl+Shift+P";

/// Listen for Cmd+Shift+P on a background thread through a listen-only
/// event tap. Needs the Accessibility permission.
#[cfg(target_os = "macos")]
pub fn start_stop_listener(stop: &StopSignal, log: &Logger) {
    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
    use core_graphics::event::{
        CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
        EventField,
    };

    const KEYCODE_P: i64 = 35;

    let stop = stop.clone();
    let log = log.clone();
    std::thread::spawn(move || {
        let tap = CGEventTap::new(
            CGEventTapLocation::HID,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            move |_proxy, _kind, event| {
                let flags = event.get_flags();
                let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                let chord = flags.contains(CGEventFlags::CGEventFlagCommand | CGEventFlags::CGEventFlagShift)
                    && !flags.intersects(CGEventFlags::CGEventFlagAlternate | CGEventFlags::CGEventFlagControl);
                if keycode == KEYCODE_P && chord {
                    stop.trigger();
                }
                None
            },
        );

        let Ok(tap) = tap else {
            log.error("failed to create event tap for the stop hotkey, grant Accessibility permission to your terminal");
            return;
        };
        let Ok(source) = tap.mach_port.create_runloop_source(0) else {
            log.error("failed to attach the stop hotkey to a run loop");
            return;
        };

        unsafe { CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes) };
        tap.enable();
        log.info(format!("stop hotkey {} registered", STOP_CHORD));
        CFRunLoop::run_current();
    });
}

/// Register Ctrl+Shift+P on a background thread that owns the hotkey and
/// pumps its message queue.
#[cfg(target_os = "windows")]
pub fn start_stop_listener(stop: &StopSignal, log: &Logger) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT};
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    const HOTKEY_ID: i32 = 1;
    const VK_P: u32 = 0x50;

    let stop = stop.clone();
    let log = log.clone();
    std::thread::spawn(move || {
        let registered =
            unsafe { RegisterHotKey(HWND::default(), HOTKEY_ID, MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT, VK_P) };
        if let Err(e) = registered {
            log.error(format!("failed to register stop hotkey {}: {}", STOP_CHORD, e));
            return;
        }
        log.info(format!("stop hotkey {} registered", STOP_CHORD));

        let mut msg = MSG::default();
        // Zero means WM_QUIT, -1 an error
        while unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) }.0 > 0 {
            if msg.message == WM_HOTKEY && msg.wParam.0 == HOTKEY_ID as usize {
                stop.trigger();
                log.info("stop hotkey pressed");
            }
        }
    });
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn start_stop_listener(_stop: &StopSignal, log: &Logger) {
    log.warn("global stop hotkey not supported on this platform, stop with Ctrl+C");
}
