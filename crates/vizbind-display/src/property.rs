#![forbid(unsafe_code)]

//! Visual properties of a displayable.
//!
//! A property set on a composite is recorded there and pushed to every
//! child. Properties that have a display axis (colour, line width, point
//! size, constant positions) turn into constant bindings on the child's
//! datum; the rest are plain settings the child keeps.

use std::collections::BTreeMap;
use std::sync::Arc;

use vizbind_core::{ConstantMapping, DisplayAxis, Range};

/// Straight RGBA colour, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Self = Self::opaque(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::opaque(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// One constant per colour channel.
    #[must_use]
    pub fn constants(&self) -> [ConstantMapping; 4] {
        [
            ConstantMapping::new(DisplayAxis::Red, f64::from(self.r)),
            ConstantMapping::new(DisplayAxis::Green, f64::from(self.g)),
            ConstantMapping::new(DisplayAxis::Blue, f64::from(self.b)),
            ConstantMapping::new(DisplayAxis::Alpha, f64::from(self.a)),
        ]
    }
}

/// A single visual setting.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Visible(bool),
    Color(Rgba),
    LineWidth(f32),
    PointSize(f32),
    /// Whether the user may drag the rendering.
    Manipulable(bool),
    FastRendering(bool),
    /// Render as points instead of surfaces or lines.
    PointMode(bool),
    /// Scale flow vectors with the display.
    AdjustFlow(bool),
    /// Whether this displayable's times take part in the animation set.
    UseTimesInAnimation(bool),
    /// Name of the unit values are shown in.
    DisplayUnit(Option<Arc<str>>),
    /// Name of the unit the colour scale is expressed in.
    ColorUnit(Option<Arc<str>>),
    /// Restrict rendering to values inside the range.
    SelectedRange(Option<Range>),
    ColorPalette(Arc<[Rgba]>),
    /// Pin the rendering at `value` along `axis`.
    ConstantPosition { axis: DisplayAxis, value: f64 },
}

/// Identity of a property slot; one value per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKey {
    Visible,
    Color,
    LineWidth,
    PointSize,
    Manipulable,
    FastRendering,
    PointMode,
    AdjustFlow,
    UseTimesInAnimation,
    DisplayUnit,
    ColorUnit,
    SelectedRange,
    ColorPalette,
    ConstantPosition(DisplayAxis),
}

impl Property {
    #[must_use]
    pub fn key(&self) -> PropertyKey {
        match self {
            Self::Visible(_) => PropertyKey::Visible,
            Self::Color(_) => PropertyKey::Color,
            Self::LineWidth(_) => PropertyKey::LineWidth,
            Self::PointSize(_) => PropertyKey::PointSize,
            Self::Manipulable(_) => PropertyKey::Manipulable,
            Self::FastRendering(_) => PropertyKey::FastRendering,
            Self::PointMode(_) => PropertyKey::PointMode,
            Self::AdjustFlow(_) => PropertyKey::AdjustFlow,
            Self::UseTimesInAnimation(_) => PropertyKey::UseTimesInAnimation,
            Self::DisplayUnit(_) => PropertyKey::DisplayUnit,
            Self::ColorUnit(_) => PropertyKey::ColorUnit,
            Self::SelectedRange(_) => PropertyKey::SelectedRange,
            Self::ColorPalette(_) => PropertyKey::ColorPalette,
            Self::ConstantPosition { axis, .. } => PropertyKey::ConstantPosition(axis.clone()),
        }
    }

    /// Constant bindings this property stands for, if any.
    #[must_use]
    pub fn constant_maps(&self) -> Vec<ConstantMapping> {
        match self {
            Self::Color(color) => color.constants().to_vec(),
            Self::LineWidth(width) => {
                vec![ConstantMapping::new(DisplayAxis::LineWidth, f64::from(*width))]
            }
            Self::PointSize(size) => {
                vec![ConstantMapping::new(DisplayAxis::PointSize, f64::from(*size))]
            }
            Self::ConstantPosition { axis, value } => {
                vec![ConstantMapping::new(axis.clone(), *value)]
            }
            _ => Vec::new(),
        }
    }
}

/// The properties a displayable has been given.
///
/// Unset properties read as their defaults: visible, and using times in
/// animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayProperties {
    values: BTreeMap<PropertyKey, Property>,
}

impl DisplayProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `property`. Returns `false` if it already had that value.
    pub fn set(&mut self, property: Property) -> bool {
        let key = property.key();
        if self.values.get(&key) == Some(&property) {
            return false;
        }
        self.values.insert(key, property);
        true
    }

    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.values.get(key)
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        !matches!(self.get(&PropertyKey::Visible), Some(Property::Visible(false)))
    }

    #[must_use]
    pub fn use_times_in_animation(&self) -> bool {
        !matches!(
            self.get(&PropertyKey::UseTimesInAnimation),
            Some(Property::UseTimesInAnimation(false))
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.values.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
