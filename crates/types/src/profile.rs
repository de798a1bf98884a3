//! Output profile handles.
//!
//! Profiles are opaque here: a device carries a handle naming its profile and
//! the number of components it describes. Color transforms are done elsewhere.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_GRAY_ICC: &str = "default_gray.icc";
pub const DEFAULT_RGB_ICC: &str = "default_rgb.icc";
pub const DEFAULT_CMYK_ICC: &str = "default_cmyk.icc";

/// Which slot of the profile manager a profile fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileType {
    DefaultGray,
    DefaultRgb,
    DefaultCmyk,
    Proof,
    Named,
    Linked,
    Lab,
    DeviceN,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("profile type {0} is out of range")]
pub struct InvalidProfileType(pub i32);

impl TryFrom<i32> for ProfileType {
    type Error = InvalidProfileType;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ProfileType::DefaultGray,
            1 => ProfileType::DefaultRgb,
            2 => ProfileType::DefaultCmyk,
            3 => ProfileType::Proof,
            4 => ProfileType::Named,
            5 => ProfileType::Linked,
            6 => ProfileType::Lab,
            7 => ProfileType::DeviceN,
            other => return Err(InvalidProfileType(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub num_components: u8,
    pub profile_type: ProfileType,
}

impl DeviceProfile {
    /// The default profile for a device with `num_components` colorants.
    /// Anything that is not gray or RGB gets CMYK.
    pub fn default_for_components(num_components: u8) -> Self {
        let (name, profile_type, n) = match num_components {
            1 => (DEFAULT_GRAY_ICC, ProfileType::DefaultGray, 1),
            3 => (DEFAULT_RGB_ICC, ProfileType::DefaultRgb, 3),
            _ => (DEFAULT_CMYK_ICC, ProfileType::DefaultCmyk, 4),
        };
        Self { name: name.to_string(), num_components: n, profile_type }
    }

    pub fn named(name: impl Into<String>, num_components: u8) -> Self {
        Self {
            name: name.into(),
            num_components,
            profile_type: ProfileType::Named,
        }
    }
}

/// Shared handle; wrapper and child point at the same profile after a resync.
pub type ProfileHandle = Arc<DeviceProfile>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_component_count() {
        assert_eq!(DeviceProfile::default_for_components(1).name, DEFAULT_GRAY_ICC);
        assert_eq!(DeviceProfile::default_for_components(3).name, DEFAULT_RGB_ICC);
        assert_eq!(DeviceProfile::default_for_components(4).name, DEFAULT_CMYK_ICC);
        assert_eq!(DeviceProfile::default_for_components(6).name, DEFAULT_CMYK_ICC);
    }

    #[test]
    fn profile_type_rejects_unknown_values() {
        assert_eq!(ProfileType::try_from(6), Ok(ProfileType::Lab));
        assert_eq!(ProfileType::try_from(8), Err(InvalidProfileType(8)));
        assert_eq!(ProfileType::try_from(-1), Err(InvalidProfileType(-1)));
    }
}
