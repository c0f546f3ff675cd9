//! Small 3-float vector used for positions, rotations and velocities

use serde::{Deserialize, Serialize};

/// A 3-component vector.
///
/// Missing components on the wire decode as zero, so a sparse
/// `{"x": 1.0}` from the server is still a usable vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length of the x/z projection (ground-plane speed)
    pub fn horizontal_length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        self.sub(other).length()
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scaled(&self, factor: f32) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Unit vector, or `None` when the length is too small to divide by
    pub fn normalized(&self) -> Option<Vec3> {
        let len = self.length();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self.scaled(1.0 / len))
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn add_assign(&mut self, other: &Vec3) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }

    pub fn add_scaled(&mut self, other: &Vec3, factor: f32) {
        self.x += other.x * factor;
        self.y += other.y * factor;
        self.z += other.z * factor;
    }

    pub fn scale_assign(&mut self, factor: f32) {
        self.x *= factor;
        self.y *= factor;
        self.z *= factor;
    }

    /// Move `fraction` of the way toward `target`
    pub fn approach(&mut self, target: &Vec3, fraction: f32) {
        self.x += (target.x - self.x) * fraction;
        self.y += (target.y - self.y) * fraction;
        self.z += (target.z - self.z) * fraction;
    }
}
