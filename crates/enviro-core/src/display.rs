// ── Status display ──
//
// What the local panel shows: board serial, Wi-Fi state and broker.
// Rendering pixels is the panel driver's job; core only decides the text
// and colours.

use crate::error::CoreError;

pub type Rgb = (u8, u8, u8);

const TEXT: Rgb = (255, 255, 255);
const CONNECTED_BACKGROUND: Rgb = (0, 170, 170);
const DISCONNECTED_BACKGROUND: Rgb = (85, 15, 15);

/// One frame of the status screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusScreen {
    pub message: String,
    pub text: Rgb,
    pub background: Rgb,
}

impl StatusScreen {
    pub fn render(serial: &str, wifi_connected: bool, broker: &str) -> Self {
        let (wifi, background) = if wifi_connected {
            ("connected", CONNECTED_BACKGROUND)
        } else {
            ("disconnected", DISCONNECTED_BACKGROUND)
        };

        Self {
            message: format!("{serial}\nWi-Fi: {wifi}\nmqtt-broker: {broker}"),
            text: TEXT,
            background,
        }
    }
}

/// Panel driver boundary.
pub trait StatusDisplay: Send {
    fn show(&mut self, screen: &StatusScreen) -> Result<(), CoreError>;
}
