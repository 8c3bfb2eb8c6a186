//! The seam between the capture pipeline and the operating system.
//!
//! Everything that touches real windows, processes or the keyboard goes
//! through [`Desktop`]. The Windows backend uses Win32 and Windows Graphics
//! Capture; other platforms get a backend that can start processes but
//! refuses every window operation.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, Command};

use crate::config::KeyAction;

/// Opaque top-level window handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// A launched external application.
pub trait AppProcess {
    fn id(&self) -> u32;
    /// Returns true once the process is gone.
    fn has_exited(&mut self) -> Result<bool>;
    fn kill(&mut self) -> Result<()>;
}

/// Native desktop operations used by the driver and the capture engine.
pub trait Desktop {
    fn launch(&self, executable: &Path, args: &[&OsStr]) -> std::io::Result<Box<dyn AppProcess>>;
    /// Finds a visible top-level window whose title contains `title`.
    fn find_window(&self, title: &str) -> Result<Option<WindowHandle>>;
    fn focus(&self, window: WindowHandle) -> Result<()>;
    fn maximize(&self, window: WindowHandle) -> Result<()>;
    /// Sends keystrokes to the foreground window. Waits are honoured in order.
    fn send_keys(&self, actions: &[KeyAction]) -> Result<()>;
    fn capture_window(&self, window: WindowHandle) -> Result<RgbaImage>;
    /// Captures the primary monitor.
    fn capture_screen(&self) -> Result<RgbaImage>;
    /// Asks the window to close (`WM_CLOSE`).
    fn request_close(&self, window: WindowHandle) -> Result<()>;
}

/// [`AppProcess`] backed by `std::process::Child`.
pub struct ChildProcess(Child);

impl AppProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.0.id()
    }

    fn has_exited(&mut self) -> Result<bool> {
        Ok(self.0.try_wait().context("Failed to poll process")?.is_some())
    }

    fn kill(&mut self) -> Result<()> {
        self.0.kill().context("Failed to kill process")?;
        let _ = self.0.wait();
        Ok(())
    }
}

fn spawn(executable: &Path, args: &[&OsStr]) -> std::io::Result<Box<dyn AppProcess>> {
    let child = Command::new(executable).args(args).spawn()?;
    Ok(Box::new(ChildProcess(child)))
}

/// Returns the desktop backend for the current platform.
pub fn native() -> Box<dyn Desktop> {
    #[cfg(windows)]
    {
        Box::new(WindowsDesktop)
    }
    #[cfg(not(windows))]
    {
        Box::new(UnsupportedDesktop)
    }
}

/// Win32 + Windows Graphics Capture backend.
#[cfg(windows)]
pub struct WindowsDesktop;

#[cfg(windows)]
impl Desktop for WindowsDesktop {
    fn launch(&self, executable: &Path, args: &[&OsStr]) -> std::io::Result<Box<dyn AppProcess>> {
        spawn(executable, args)
    }

    fn find_window(&self, title: &str) -> Result<Option<WindowHandle>> {
        Ok(crate::capture::window::find_window_by_title(title)?.map(crate::capture::window::to_handle))
    }

    fn focus(&self, window: WindowHandle) -> Result<()> {
        crate::capture::window::focus_window(crate::capture::window::to_hwnd(window))
    }

    fn maximize(&self, window: WindowHandle) -> Result<()> {
        crate::capture::window::maximize_window(crate::capture::window::to_hwnd(window))
    }

    fn send_keys(&self, actions: &[KeyAction]) -> Result<()> {
        crate::automation::input::send_actions(actions)
    }

    fn capture_window(&self, window: WindowHandle) -> Result<RgbaImage> {
        crate::capture::screenshot::capture_window(crate::capture::window::to_hwnd(window))
    }

    fn capture_screen(&self) -> Result<RgbaImage> {
        crate::capture::screenshot::capture_primary_monitor()
    }

    fn request_close(&self, window: WindowHandle) -> Result<()> {
        crate::capture::window::close_window(crate::capture::window::to_hwnd(window))
    }
}

/// Backend for platforms without a native implementation.
#[cfg(not(windows))]
pub struct UnsupportedDesktop;

#[cfg(not(windows))]
impl Desktop for UnsupportedDesktop {
    fn launch(&self, executable: &Path, args: &[&OsStr]) -> std::io::Result<Box<dyn AppProcess>> {
        spawn(executable, args)
    }

    fn find_window(&self, _title: &str) -> Result<Option<WindowHandle>> {
        anyhow::bail!("window discovery is not supported on this platform")
    }

    fn focus(&self, _window: WindowHandle) -> Result<()> {
        anyhow::bail!("window focus is not supported on this platform")
    }

    fn maximize(&self, _window: WindowHandle) -> Result<()> {
        anyhow::bail!("window placement is not supported on this platform")
    }

    fn send_keys(&self, _actions: &[KeyAction]) -> Result<()> {
        anyhow::bail!("keystroke injection is not supported on this platform")
    }

    fn capture_window(&self, _window: WindowHandle) -> Result<RgbaImage> {
        anyhow::bail!("screen capture is not supported on this platform")
    }

    fn capture_screen(&self) -> Result<RgbaImage> {
        anyhow::bail!("screen capture is not supported on this platform")
    }

    fn request_close(&self, _window: WindowHandle) -> Result<()> {
        anyhow::bail!("window messages are not supported on this platform")
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted desktop used by driver and session tests.

    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Everything the fake desktop was asked to do, in order.
    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Launch(String),
        FindWindow(String),
        Focus,
        Maximize,
        Keys(Vec<KeyAction>),
        CaptureWindow,
        CaptureScreen,
        RequestClose,
        Kill,
    }

    pub struct FakeProcess {
        exited: Rc<Cell<bool>>,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl AppProcess for FakeProcess {
        fn id(&self) -> u32 {
            4242
        }

        fn has_exited(&mut self) -> Result<bool> {
            Ok(self.exited.get())
        }

        fn kill(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(Call::Kill);
            self.exited.set(true);
            Ok(())
        }
    }

    pub struct FakeDesktop {
        pub calls: Rc<RefCell<Vec<Call>>>,
        /// Window appears after this many lookups; `None` never appears
        pub window_after: Option<usize>,
        /// Process exits when asked to close
        pub closes_cleanly: bool,
        pub frame: RgbaImage,
        lookups: Cell<usize>,
        exited: Rc<Cell<bool>>,
    }

    impl FakeDesktop {
        pub fn new(frame: RgbaImage) -> Self {
            Self {
                calls: Rc::new(RefCell::new(Vec::new())),
                window_after: Some(0),
                closes_cleanly: true,
                frame,
                lookups: Cell::new(0),
                exited: Rc::new(Cell::new(false)),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn count(&self, wanted: &Call) -> usize {
            self.calls.borrow().iter().filter(|c| *c == wanted).count()
        }

        pub fn captured_anything(&self) -> bool {
            self.calls
                .borrow()
                .iter()
                .any(|c| matches!(c, Call::CaptureWindow | Call::CaptureScreen))
        }
    }

    impl Desktop for FakeDesktop {
        fn launch(
            &self,
            executable: &Path,
            _args: &[&OsStr],
        ) -> std::io::Result<Box<dyn AppProcess>> {
            self.calls
                .borrow_mut()
                .push(Call::Launch(executable.display().to_string()));
            self.exited.set(false);
            Ok(Box::new(FakeProcess {
                exited: self.exited.clone(),
                calls: self.calls.clone(),
            }))
        }

        fn find_window(&self, title: &str) -> Result<Option<WindowHandle>> {
            self.calls
                .borrow_mut()
                .push(Call::FindWindow(title.to_string()));
            let n = self.lookups.get();
            self.lookups.set(n + 1);
            Ok(match self.window_after {
                Some(after) if n >= after => Some(WindowHandle(7)),
                _ => None,
            })
        }

        fn focus(&self, _window: WindowHandle) -> Result<()> {
            self.calls.borrow_mut().push(Call::Focus);
            Ok(())
        }

        fn maximize(&self, _window: WindowHandle) -> Result<()> {
            self.calls.borrow_mut().push(Call::Maximize);
            Ok(())
        }

        fn send_keys(&self, actions: &[KeyAction]) -> Result<()> {
            self.calls.borrow_mut().push(Call::Keys(actions.to_vec()));
            Ok(())
        }

        fn capture_window(&self, _window: WindowHandle) -> Result<RgbaImage> {
            self.calls.borrow_mut().push(Call::CaptureWindow);
            Ok(self.frame.clone())
        }

        fn capture_screen(&self) -> Result<RgbaImage> {
            self.calls.borrow_mut().push(Call::CaptureScreen);
            Ok(self.frame.clone())
        }

        fn request_close(&self, _window: WindowHandle) -> Result<()> {
            self.calls.borrow_mut().push(Call::RequestClose);
            if self.closes_cleanly {
                self.exited.set(true);
            }
            Ok(())
        }
    }
}
