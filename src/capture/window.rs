//! Window discovery and placement for the external applications.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindowVisible, PostMessageW, SetForegroundWindow,
    ShowWindow, SW_MAXIMIZE, SW_RESTORE, WM_CLOSE,
};

use crate::desktop::WindowHandle;

pub fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut core::ffi::c_void)
}

pub fn to_handle(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as isize)
}

/// Finds the first visible top-level window whose title contains `needle`
/// (case-insensitive). Windows of this process are ignored so our own GUI,
/// which may mention the application name, never matches.
pub fn find_window_by_title(needle: &str) -> Result<Option<HWND>> {
    struct EnumData {
        needle: String,
        own_pid: u32,
        hwnd: Option<HWND>,
        title: Option<String>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            let title_len = GetWindowTextLengthW(hwnd);
            if title_len <= 0 {
                return TRUE;
            }
            let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
            let copied = GetWindowTextW(hwnd, &mut title_buf);
            let title = OsString::from_wide(&title_buf[..copied.max(0) as usize])
                .to_string_lossy()
                .to_string();

            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == data.own_pid {
                return TRUE;
            }

            if title.to_lowercase().contains(&data.needle) {
                data.hwnd = Some(hwnd);
                data.title = Some(title);
                return BOOL(0); // Stop enumeration
            }

            TRUE
        }
    }

    if needle.is_empty() {
        return Err(anyhow!("Window title to search for is empty"));
    }

    let mut data = EnumData {
        needle: needle.to_lowercase(),
        own_pid: unsafe { GetCurrentProcessId() },
        hwnd: None,
        title: None,
    };
    unsafe {
        // EnumWindows returns FALSE when the callback stops it early, which is not an error
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }

    if let Some(title) = &data.title {
        crate::log(&format!("Found window \"{}\"", title));
    }

    Ok(data.hwnd)
}

/// Restores (if minimized) and brings the window to the foreground.
pub fn focus_window(hwnd: HWND) -> Result<()> {
    unsafe {
        if IsIconic(hwnd).as_bool() {
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }
        if !SetForegroundWindow(hwnd).as_bool() {
            // Windows may refuse focus changes; keystrokes would land elsewhere
            crate::log("SetForegroundWindow refused the focus request");
        }
    }
    Ok(())
}

pub fn maximize_window(hwnd: HWND) -> Result<()> {
    unsafe {
        let _ = ShowWindow(hwnd, SW_MAXIMIZE);
    }
    Ok(())
}

/// Posts `WM_CLOSE`, the same request as clicking the close button.
pub fn close_window(hwnd: HWND) -> Result<()> {
    unsafe { PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0))? };
    Ok(())
}

/// Gets the client area rectangle and its offset relative to the window origin.
///
/// The client area excludes the title bar and borders. The offset is the
/// position of the client area's top-left corner relative to the window's
/// top-left corner, which is where window captures need to be cropped.
pub fn get_client_area_info(hwnd: HWND) -> Result<(RECT, POINT)> {
    let mut client_rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client_rect)? };

    let mut client_origin = POINT { x: 0, y: 0 };
    unsafe {
        if !ClientToScreen(hwnd, &mut client_origin).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }

    let mut window_rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut window_rect)? };

    let offset = POINT {
        x: (client_origin.x - window_rect.left).max(0),
        y: (client_origin.y - window_rect.top).max(0),
    };

    Ok((client_rect, offset))
}
