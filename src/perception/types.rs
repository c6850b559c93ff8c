use serde::{Deserialize, Serialize};

/// Screen rectangle in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Centre of the rectangle, rounded down.
    pub fn center(&self) -> (i32, i32) {
        (
            self.left + (self.width / 2) as i32,
            self.top + (self.height / 2) as i32,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same size, shifted by `(dx, dy)`.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.width, self.height)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.left, self.top, self.width, self.height
        )
    }
}

impl std::str::FromStr for Rect {
    type Err = String;

    /// Parses `left,top,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [left, top, width, height] = parts.as_slice() else {
            return Err(format!("expected left,top,width,height but got '{s}'"));
        };
        let num_err = |e: std::num::ParseIntError| format!("invalid rect '{s}': {e}");
        let rect = Rect::new(
            left.parse().map_err(num_err)?,
            top.parse().map_err(num_err)?,
            width.parse().map_err(num_err)?,
            height.parse().map_err(num_err)?,
        );
        if rect.is_empty() {
            return Err(format!("rect '{s}' has zero area"));
        }
        Ok(rect)
    }
}
