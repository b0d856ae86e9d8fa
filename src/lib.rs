pub mod codec;
pub mod config;
pub mod error;
pub mod fill;
pub mod gallery;
pub mod history;
pub mod logging;
pub mod renderer;
pub mod script;
pub mod session;

pub use error::{ApiError, ConfigError, DrawError, StorageError};
pub use session::{DrawingSession, Effects, NoEffects};

use error::DrawResult;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> DrawResult<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(DrawError::InvalidColor(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| DrawError::InvalidColor(hex.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// RGB equality; alpha is not compared.
    pub fn same_rgb(&self, other: &Color) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }

    /// Same color with alpha scaled by an opacity fraction.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

impl From<Rgba<u8>> for Color {
    fn from(pixel: Rgba<u8>) -> Self {
        Self { r: pixel[0], g: pixel[1], b: pixel[2], a: pixel[3] }
    }
}

impl FromStr for Color {
    type Err = DrawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
    Fill,
    Shape,
    Text,
    Stamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampKind {
    Heart,
    #[default]
    Star,
    Flower,
    Cloud,
    Check,
    Fire,
}

impl StampKind {
    pub fn symbol(self) -> char {
        match self {
            StampKind::Heart => '\u{2764}',
            StampKind::Star => '\u{2B50}',
            StampKind::Flower => '\u{1F338}',
            StampKind::Cloud => '\u{2601}',
            StampKind::Check => '\u{2705}',
            StampKind::Fire => '\u{1F525}',
        }
    }
}

/// Ephemeral tool settings. Not persisted.
#[derive(Debug, Clone)]
pub struct ToolState {
    pub tool: Tool,
    pub brush_width: u32,
    pub color: Color,
    pub opacity: f64,
    pub mirror: bool,
    pub stamp: StampKind,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            brush_width: 5,
            color: Color::BLACK,
            opacity: 1.0,
            mirror: false,
            stamp: StampKind::default(),
        }
    }
}

impl ToolState {
    /// Color strokes are painted with: white for the eraser.
    pub fn stroke_color(&self) -> Color {
        match self.tool {
            Tool::Eraser => Color::WHITE,
            _ => self.color,
        }
    }

    pub fn font_size(&self) -> f32 {
        (self.brush_width * 4) as f32
    }
}
