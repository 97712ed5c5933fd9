//! Pose keys identifying filters in the store
//!
//! A pose key is a 9-integer tuple: listener orientation, listener position,
//! and three free "custom" values. Legacy 6-value keys leave the custom
//! triplet at zero. Keys are plain value types and serve directly as map
//! keys in the filter store.

use std::fmt;
use std::str::FromStr;

use crate::error::PoseError;
use crate::POSE_KEY_LEN;

/// Listener orientation in integer units (typically degrees)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Orientation {
    pub yaw: i32,
    pub pitch: i32,
    pub roll: i32,
}

impl Orientation {
    pub fn new(yaw: i32, pitch: i32, roll: i32) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// Listener position on the measurement grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Free-form key extension (source index, condition id, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CustomValues {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl CustomValues {
    pub fn new(a: i32, b: i32, c: i32) -> Self {
        Self { a, b, c }
    }
}

/// Canonical filter-selection key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pose {
    pub orientation: Orientation,
    pub position: Position,
    pub custom: CustomValues,
}

impl Pose {
    pub fn new(orientation: Orientation, position: Position, custom: CustomValues) -> Self {
        Self {
            orientation,
            position,
            custom,
        }
    }

    /// Build a pose from 6 (legacy) or 9 integers.
    pub fn from_values(values: &[i32]) -> Result<Self, PoseError> {
        match values.len() {
            6 => Ok(Self {
                orientation: Orientation::new(values[0], values[1], values[2]),
                position: Position::new(values[3], values[4], values[5]),
                custom: CustomValues::default(),
            }),
            9 => Ok(Self {
                orientation: Orientation::new(values[0], values[1], values[2]),
                position: Position::new(values[3], values[4], values[5]),
                custom: CustomValues::new(values[6], values[7], values[8]),
            }),
            n => Err(PoseError::InvalidLength(n)),
        }
    }

    /// Flatten to the canonical 9-integer form.
    pub fn to_values(&self) -> [i32; POSE_KEY_LEN] {
        [
            self.orientation.yaw,
            self.orientation.pitch,
            self.orientation.roll,
            self.position.x,
            self.position.y,
            self.position.z,
            self.custom.a,
            self.custom.b,
            self.custom.c,
        ]
    }

    /// Overwrite a contiguous slice of the key, keeping the other indices.
    ///
    /// `offset + values.len()` must stay within the 9-value key.
    pub fn apply_slice(&mut self, offset: usize, values: &[i32]) {
        debug_assert!(offset + values.len() <= POSE_KEY_LEN);
        let mut all = self.to_values();
        all[offset..offset + values.len()].copy_from_slice(values);
        // from_values on a full 9-element array cannot fail
        *self = Self::from_values(&all).unwrap_or_default();
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.to_values();
        let mut first = true;
        for v in values {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", v)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Pose {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = Vec::with_capacity(POSE_KEY_LEN);
        for token in s.split(',') {
            let token = token.trim();
            values.push(
                token
                    .parse::<i32>()
                    .map_err(|_| PoseError::InvalidToken(token.to_string()))?,
            );
        }
        Self::from_values(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_key() {
        let pose = Pose::new(
            Orientation::new(10, 20, 30),
            Position::new(1, 2, 3),
            CustomValues::default(),
        );

        assert_eq!(pose.orientation.pitch, 20);
        assert_eq!(pose.position.z, 3);
        assert_eq!(pose.to_string(), "10,20,30,1,2,3,0,0,0");
    }

    #[test]
    fn test_from_values_6() {
        let pose = Pose::from_values(&[10, 20, 30, 1, 2, 3]).unwrap();
        assert_eq!(pose.orientation.yaw, 10);
        assert_eq!(pose.position.x, 1);
        assert_eq!(pose.custom, CustomValues::default());
    }

    #[test]
    fn test_from_values_9() {
        let pose = Pose::from_values(&[10, 20, 30, 1, 2, 3, 11, 22, 33]).unwrap();
        assert_eq!(pose.orientation.yaw, 10);
        assert_eq!(pose.position.x, 1);
        assert_eq!(pose.custom.b, 22);
    }

    #[test]
    fn test_from_values_invalid() {
        assert!(matches!(
            Pose::from_values(&[1, 2, 3]),
            Err(PoseError::InvalidLength(3))
        ));
    }

    #[test]
    fn test_parse_format_roundtrip() {
        let pose = Pose::from_values(&[-5, 0, 12, 3, -4, 9, 1, 0, 7]).unwrap();
        let parsed: Pose = pose.to_string().parse().unwrap();
        assert_eq!(parsed, pose);

        let legacy: Pose = "10,20,30,1,2,3".parse().unwrap();
        assert_eq!(legacy, Pose::from_values(&[10, 20, 30, 1, 2, 3]).unwrap());
    }

    #[test]
    fn test_apply_slice() {
        let mut pose = Pose::default();
        pose.apply_slice(3, &[7, 8, 9]);
        assert_eq!(pose.position, Position::new(7, 8, 9));
        assert_eq!(pose.orientation, Orientation::default());

        pose.apply_slice(0, &[1, 2, 3]);
        assert_eq!(pose.orientation, Orientation::new(1, 2, 3));
        assert_eq!(pose.position, Position::new(7, 8, 9));
    }
}
