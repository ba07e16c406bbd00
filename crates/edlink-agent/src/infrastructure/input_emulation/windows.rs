//! Windows input via `SendInput` and the foreground window's process.
//!
//! The game reads DirectInput, which ignores virtual-key-only events, so
//! keys are injected by *scan code*: the VK code is translated with
//! `MapVirtualKeyW` for the active keyboard layout, then sent with
//! `KEYEVENTF_SCANCODE` (plus `KEYEVENTF_EXTENDEDKEY` where needed).
//!
//! The foreground check resolves `GetForegroundWindow` → owning process id →
//! full image path, and compares the file name case-insensitively.

#![cfg(target_os = "windows")]

use std::path::Path;
use std::time::Duration;

use edlink_core::KeyCode;
use windows::core::PWSTR;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, MAPVK_VK_TO_VSC, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

use crate::application::route_command::{EmulationError, PlatformInput};

/// Windows implementation of [`PlatformInput`].
pub struct WindowsInput;

impl WindowsInput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsInput {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformInput for WindowsInput {
    fn press_key(&self, key: KeyCode, hold: Duration) -> Result<(), EmulationError> {
        // SAFETY: MapVirtualKeyW has no preconditions.
        let scan = unsafe { MapVirtualKeyW(u32::from(key.windows_vk()), MAPVK_VK_TO_VSC) };
        if scan == 0 {
            return Err(EmulationError::UnmappableKey(key));
        }

        let mut flags = KEYEVENTF_SCANCODE;
        if key.is_extended() {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }

        send_scan(scan as u16, flags)?;
        std::thread::sleep(hold);
        send_scan(scan as u16, flags | KEYEVENTF_KEYUP)
    }

    fn is_foreground(&self, process_name: &str) -> bool {
        match foreground_process_name() {
            Some(name) => name.eq_ignore_ascii_case(process_name),
            None => false,
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn send_scan(scan: u16, flags: KEYBD_EVENT_FLAGS) -> Result<(), EmulationError> {
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    // SAFETY: input is a valid KEYBDINPUT structure on the stack
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(EmulationError::Platform(format!(
            "SendInput inserted {sent} events: {}",
            windows::core::Error::from_win32()
        )))
    }
}

/// Executable file name of the process owning the foreground window.
fn foreground_process_name() -> Option<String> {
    // SAFETY: GetForegroundWindow has no preconditions and may return null.
    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.0.is_null() {
        return None;
    }

    let mut pid = 0u32;
    // SAFETY: hwnd is a window handle; pid is a valid out pointer.
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    if pid == 0 {
        return None;
    }

    // SAFETY: OpenProcess returns an owned handle we close below.
    let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;

    let mut buf = [0u16; 1024];
    let mut len = buf.len() as u32;
    // SAFETY: buf outlives the call and len holds its capacity in u16 units.
    let queried = unsafe {
        QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut len)
    };
    // SAFETY: process was opened above and is not used afterwards.
    let _ = unsafe { CloseHandle(process) };
    queried.ok()?;

    let image = String::from_utf16_lossy(&buf[..len as usize]);
    Path::new(&image)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
