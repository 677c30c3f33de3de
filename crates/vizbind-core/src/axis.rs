#![forbid(unsafe_code)]

//! Display axes and data quantities.

use std::fmt;
use std::sync::Arc;

/// Logical scalar quantity carried by data (e.g. `Temperature`).
///
/// Cloning is cheap: the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantity(Arc<str>);

impl Quantity {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Quantity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A slot of the display a quantity or constant can be bound to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayAxis {
    X,
    Y,
    Z,
    Latitude,
    Longitude,
    Altitude,
    Red,
    Green,
    Blue,
    Rgb,
    Rgba,
    Alpha,
    Hue,
    Saturation,
    Value,
    IsoContour,
    Flow1X,
    Flow1Y,
    Flow1Z,
    Flow2X,
    Flow2Y,
    Flow2Z,
    Animation,
    SelectValue,
    SelectRange,
    Shape,
    Text,
    LineWidth,
    PointSize,
    /// Application-defined slot.
    Custom(Arc<str>),
}

impl DisplayAxis {
    /// Whether this axis positions data in space.
    #[must_use]
    pub const fn is_spatial(&self) -> bool {
        matches!(
            self,
            Self::X | Self::Y | Self::Z | Self::Latitude | Self::Longitude | Self::Altitude
        )
    }

    /// Whether this axis carries colour.
    #[must_use]
    pub const fn is_color(&self) -> bool {
        matches!(
            self,
            Self::Red
                | Self::Green
                | Self::Blue
                | Self::Rgb
                | Self::Rgba
                | Self::Alpha
                | Self::Hue
                | Self::Saturation
                | Self::Value
        )
    }

    /// Whether this axis is one of the flow components.
    #[must_use]
    pub const fn is_flow(&self) -> bool {
        matches!(
            self,
            Self::Flow1X | Self::Flow1Y | Self::Flow1Z | Self::Flow2X | Self::Flow2Y | Self::Flow2Z
        )
    }
}

impl fmt::Display for DisplayAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name) => write!(f, "Custom({name})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Spatial dimensionality of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimensionality {
    Two,
    Three,
}

impl Dimensionality {
    /// 2 or 3.
    #[must_use]
    pub const fn count(self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}
