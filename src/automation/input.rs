//! Keyboard input simulation via `SendInput`.
//!
//! Text is typed as Unicode key events so it does not depend on the active
//! keyboard layout. `\n` is sent as the Enter virtual key because many
//! applications ignore a Unicode carriage return.

use anyhow::{anyhow, Result};
use std::time::Duration;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE,
    VIRTUAL_KEY, VK_ESCAPE, VK_RETURN, VK_TAB,
};

use crate::config::{KeyAction, NamedKey};

/// Delay between consecutive key presses. Some applications drop input
/// delivered faster than their message loop runs.
const KEY_INTERVAL_MS: u64 = 30;

/// Sends a sequence of key actions to the foreground window.
pub fn send_actions(actions: &[KeyAction]) -> Result<()> {
    for action in actions {
        match action {
            KeyAction::Key(key) => press_virtual_key(virtual_key(*key))?,
            KeyAction::Text(text) => type_text(text)?,
            KeyAction::WaitMs(ms) => std::thread::sleep(Duration::from_millis(*ms)),
        }
    }
    Ok(())
}

fn virtual_key(key: NamedKey) -> VIRTUAL_KEY {
    match key {
        NamedKey::Escape => VK_ESCAPE,
        NamedKey::Enter => VK_RETURN,
        NamedKey::Tab => VK_TAB,
    }
}

fn type_text(text: &str) -> Result<()> {
    for ch in text.chars() {
        match ch {
            '\n' => press_virtual_key(VK_RETURN)?,
            '\t' => press_virtual_key(VK_TAB)?,
            '\r' => {}
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    send(&[
                        unicode_input(*unit, false),
                        unicode_input(*unit, true),
                    ])?;
                }
            }
        }
        std::thread::sleep(Duration::from_millis(KEY_INTERVAL_MS));
    }
    Ok(())
}

fn press_virtual_key(vk: VIRTUAL_KEY) -> Result<()> {
    send(&[vk_input(vk, false), vk_input(vk, true)])?;
    std::thread::sleep(Duration::from_millis(KEY_INTERVAL_MS));
    Ok(())
}

fn vk_input(vk: VIRTUAL_KEY, up: bool) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                dwFlags: if up { KEYEVENTF_KEYUP } else { Default::default() },
                ..Default::default()
            },
        },
    }
}

fn unicode_input(unit: u16, up: bool) -> INPUT {
    let flags = if up {
        KEYEVENTF_UNICODE | KEYEVENTF_KEYUP
    } else {
        KEYEVENTF_UNICODE
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wScan: unit,
                dwFlags: flags,
                ..Default::default()
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(anyhow!(
            "SendInput delivered {} of {} events (input blocked by another process?)",
            sent,
            inputs.len()
        ));
    }
    Ok(())
}
