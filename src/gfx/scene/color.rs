/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const BLACK: Color = Color([0.0, 0.0, 0.0, 1.0]);
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);
    pub const TRANSPARENT: Color = Color([0.0, 0.0, 0.0, 0.0]);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b, 1.0])
    }

    /// Converts 8-bit channels to [0, 1] without any transfer function
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a].map(|c| c as f32 / 255.0))
    }

    pub fn r(&self) -> f32 {
        self.0[0]
    }

    pub fn g(&self) -> f32 {
        self.0[1]
    }

    pub fn b(&self) -> f32 {
        self.0[2]
    }

    pub fn a(&self) -> f32 {
        self.0[3]
    }

    pub fn to_rgb(&self) -> [f32; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// RGB scaled by `factor`, alpha dropped
    pub fn scaled_rgb(&self, factor: f32) -> [f32; 3] {
        [self.0[0] * factor, self.0[1] * factor, self.0[2] * factor]
    }
}

impl From<[f32; 4]> for Color {
    fn from(value: [f32; 4]) -> Self {
        Self(value)
    }
}

impl From<Color> for [f32; 4] {
    fn from(value: Color) -> Self {
        value.0
    }
}
