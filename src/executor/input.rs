// Physical pointer control through enigo.
use std::cell::RefCell;

use enigo::{Coordinate, Direction, Enigo, Mouse, Settings};
use serde::{Deserialize, Serialize};

use crate::errors::{ClickshotError, ClickshotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    #[default]
    Left,
    Right,
    Middle,
}

impl From<Button> for enigo::Button {
    fn from(button: Button) -> Self {
        match button {
            Button::Left => enigo::Button::Left,
            Button::Right => enigo::Button::Right,
            Button::Middle => enigo::Button::Middle,
        }
    }
}

impl std::str::FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "middle" => Ok(Self::Middle),
            other => Err(format!("unknown mouse button '{other}'")),
        }
    }
}

/// Pointer device: position query, absolute moves and clicks.
pub trait Pointer {
    fn position(&self) -> ClickshotResult<(i32, i32)>;

    fn move_to(&self, x: i32, y: i32) -> ClickshotResult<()>;

    /// Click `button` `count` times at the current position.
    fn click(&self, button: Button, count: u32) -> ClickshotResult<()>;
}

pub struct EnigoPointer {
    enigo: RefCell<Enigo>,
}

impl EnigoPointer {
    pub fn new() -> ClickshotResult<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            ClickshotError::Input(format!("Failed to initialize input backend: {e}"))
        })?;
        Ok(Self {
            enigo: RefCell::new(enigo),
        })
    }
}

impl Pointer for EnigoPointer {
    fn position(&self) -> ClickshotResult<(i32, i32)> {
        self.enigo
            .borrow()
            .location()
            .map_err(|e| ClickshotError::Input(format!("Failed to read mouse position: {e}")))
    }

    fn move_to(&self, x: i32, y: i32) -> ClickshotResult<()> {
        self.enigo
            .borrow_mut()
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| ClickshotError::Input(format!("Failed to move mouse: {e}")))
    }

    fn click(&self, button: Button, count: u32) -> ClickshotResult<()> {
        let mut enigo = self.enigo.borrow_mut();
        for _ in 0..count {
            enigo
                .button(button.into(), Direction::Click)
                .map_err(|e| ClickshotError::Input(format!("Failed to click {button:?}: {e}")))?;
        }
        tracing::debug!(?button, count, "mouse clicked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_button_names() {
        assert_eq!("left".parse::<Button>(), Ok(Button::Left));
        assert_eq!(" Right ".parse::<Button>(), Ok(Button::Right));
        assert_eq!("MIDDLE".parse::<Button>(), Ok(Button::Middle));
        assert!("thumb".parse::<Button>().is_err());
    }

    #[test]
    fn button_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            button: Button,
        }
        let w: Wrapper = toml::from_str("button = \"right\"").unwrap();
        assert_eq!(w.button, Button::Right);
    }
}
