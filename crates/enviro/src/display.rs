//! Status display backed by the log.
//!
//! The LCD panel driver is not part of this agent; the screen contents go
//! to the log instead, once per change.

use tracing::info;

use enviro_core::{CoreError, StatusDisplay, StatusScreen};

#[derive(Debug, Default)]
pub struct LogDisplay {
    last: Option<StatusScreen>,
}

impl StatusDisplay for LogDisplay {
    fn show(&mut self, screen: &StatusScreen) -> Result<(), CoreError> {
        if self.last.as_ref() == Some(screen) {
            return Ok(());
        }
        let (r, g, b) = screen.background;
        info!(
            background = %format!("#{r:02x}{g:02x}{b:02x}"),
            "status: {}",
            screen.message.replace('\n', " | ")
        );
        self.last = Some(screen.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_last_screen() {
        let mut display = LogDisplay::default();
        let screen = StatusScreen::render("1234", true, "broker");
        display.show(&screen).ok();
        assert_eq!(display.last.as_ref(), Some(&screen));

        let red = StatusScreen::render("1234", false, "broker");
        display.show(&red).ok();
        assert_eq!(display.last, Some(red));
    }
}
