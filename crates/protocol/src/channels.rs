use serde::{Deserialize, Serialize};

/// Visual attribute of a map point whose numeric source is configured per search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Size,
    Hue,
    Sat,
    Val,
    Opacity,
    SecondaryHue,
    SecondarySat,
    SecondaryVal,
    SecondaryOpacity,
    Flatness,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Channel::Size,
        Channel::Hue,
        Channel::Sat,
        Channel::Val,
        Channel::Opacity,
        Channel::SecondaryHue,
        Channel::SecondarySat,
        Channel::SecondaryVal,
        Channel::SecondaryOpacity,
        Channel::Flatness,
    ];

    /// Field name used in `per_point_data` and in the rendering settings.
    pub fn field_name(self) -> &'static str {
        match self {
            Channel::Size => "size",
            Channel::Hue => "hue",
            Channel::Sat => "sat",
            Channel::Val => "val",
            Channel::Opacity => "opacity",
            Channel::SecondaryHue => "secondary_hue",
            Channel::SecondarySat => "secondary_sat",
            Channel::SecondaryVal => "secondary_val",
            Channel::SecondaryOpacity => "secondary_opacity",
            Channel::Flatness => "flatness",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.field_name() == name)
    }

    /// Hue wraps around, so the first and last category would alias.
    pub fn is_cyclic(self) -> bool {
        matches!(self, Channel::Hue | Channel::SecondaryHue)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}
