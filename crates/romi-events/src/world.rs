use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer block coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Middle of the block in world space
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// Entity position in world space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: Vec3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

/// Block returned by a world lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub pos: BlockPos,
}

impl Block {
    pub fn is_container(&self) -> bool {
        matches!(self.name.as_str(), "chest" | "trapped_chest" | "barrel")
    }
}

/// A stack of items in a container or inventory slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub slot: u16,
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(slot: u16, name: impl Into<String>, count: u32) -> Self {
        Self {
            slot,
            name: name.into(),
            count,
        }
    }
}

/// Player vitals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub health: f32,
    pub food: u32,
}

/// Movement controls the session can hold down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Jump,
}
