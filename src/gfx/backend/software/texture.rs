//! Texel storage for the software device
//!
//! Color textures keep RGBA `f32` texels and depth textures a single `f32` per
//! texel. 8-bit formats are quantized on store so rendered output matches what
//! a GPU would write.

use crate::gfx::backend::{TextureDesc, TextureDimension, TextureFormat, TextureState, TextureUsage};
use crate::gfx::error::{RenderError, RenderResult};

#[derive(Debug, Clone)]
pub(crate) enum Texels {
    Color(Vec<[f32; 4]>),
    Depth(Vec<f32>),
}

impl Texels {
    pub(crate) fn take(&mut self) -> Texels {
        match self {
            Texels::Color(data) => Texels::Color(std::mem::take(data)),
            Texels::Depth(data) => Texels::Depth(std::mem::take(data)),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SoftTexture {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub state: TextureState,
    pub texels: Texels,
}

impl SoftTexture {
    pub(crate) fn new(desc: &TextureDesc) -> Self {
        let count = desc.width as usize * desc.height as usize * desc.layers.max(1) as usize;
        let texels = if desc.format.is_depth() {
            Texels::Depth(vec![1.0; count])
        } else {
            Texels::Color(vec![[0.0; 4]; count])
        };
        Self {
            width: desc.width,
            height: desc.height,
            layers: desc.layers.max(1),
            dimension: desc.dimension,
            format: desc.format,
            usage: desc.usage,
            state: TextureState::Undefined,
            texels,
        }
    }

    pub(crate) fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn index(&self, layer: u32, x: u32, y: u32) -> usize {
        layer as usize * self.layer_len() + y as usize * self.width as usize + x as usize
    }

    /// Texel at integer coordinates, clamped to the edge
    pub(crate) fn load(&self, layer: u32, x: i32, y: i32) -> [f32; 4] {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        let layer = layer.min(self.layers - 1);
        let index = self.index(layer, x, y);
        match &self.texels {
            Texels::Color(data) => data.get(index).copied().unwrap_or([0.0; 4]),
            Texels::Depth(data) => {
                let depth = data.get(index).copied().unwrap_or(1.0);
                [depth, 0.0, 0.0, 1.0]
            }
        }
    }

    /// Nearest texel for a normalized coordinate
    pub(crate) fn sample_nearest(&self, layer: u32, uv: [f32; 2]) -> [f32; 4] {
        let x = (uv[0] * self.width as f32).floor() as i32;
        let y = (uv[1] * self.height as f32).floor() as i32;
        self.load(layer, x, y)
    }

    /// Bilinear sample with clamp-to-edge addressing
    pub(crate) fn sample_linear(&self, layer: u32, uv: [f32; 2]) -> [f32; 4] {
        let fx = uv[0] * self.width as f32 - 0.5;
        let fy = uv[1] * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let a = self.load(layer, x0, y0);
        let b = self.load(layer, x0 + 1, y0);
        let c = self.load(layer, x0, y0 + 1);
        let d = self.load(layer, x0 + 1, y0 + 1);
        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * tx;
            let bottom = c[i] + (d[i] - c[i]) * tx;
            out[i] = top + (bottom - top) * ty;
        }
        out
    }

    /// `LessEqual` depth comparison against the nearest texel
    pub(crate) fn compare(&self, layer: u32, uv: [f32; 2], reference: f32) -> f32 {
        let stored = self.sample_nearest(layer, uv)[0];
        if reference <= stored {
            1.0
        } else {
            0.0
        }
    }

    /// Replaces one layer from tightly packed bytes in this texture's format
    pub(crate) fn write_layer(&mut self, layer: u32, bytes: &[u8]) -> RenderResult<()> {
        self.check_layer(layer)?;
        let expected = self.layer_len() * self.format.bytes_per_pixel() as usize;
        if bytes.len() != expected {
            return Err(RenderError::ResourceCreation(format!(
                "texture upload expects {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }
        let start = layer as usize * self.layer_len();
        let format = self.format;
        let stride = format.bytes_per_pixel() as usize;
        match &mut self.texels {
            Texels::Color(data) => {
                for (i, chunk) in bytes.chunks_exact(stride).enumerate() {
                    data[start + i] = decode_texel(format, chunk);
                }
            }
            Texels::Depth(data) => {
                for (i, chunk) in bytes.chunks_exact(4).enumerate() {
                    data[start + i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
            }
        }
        Ok(())
    }

    /// Encodes one layer as tightly packed bytes in this texture's format
    pub(crate) fn read_layer(&self, layer: u32) -> RenderResult<Vec<u8>> {
        self.check_layer(layer)?;
        let start = layer as usize * self.layer_len();
        let end = start + self.layer_len();
        let mut out = Vec::with_capacity(self.layer_len() * self.format.bytes_per_pixel() as usize);
        match &self.texels {
            Texels::Color(data) => {
                for texel in &data[start..end] {
                    encode_texel(self.format, *texel, &mut out);
                }
            }
            Texels::Depth(data) => {
                for depth in &data[start..end] {
                    out.extend_from_slice(&depth.to_le_bytes());
                }
            }
        }
        Ok(out)
    }

    /// Copies layer 0 of `src` into `layer` of this texture
    pub(crate) fn copy_layer_from(&mut self, src: &SoftTexture, layer: u32) -> RenderResult<()> {
        self.check_layer(layer)?;
        if src.dimension != TextureDimension::D2 {
            return Err(RenderError::InvalidState(format!(
                "copy source must be a single 2D image, found {:?}",
                src.dimension
            )));
        }
        if src.width != self.width || src.height != self.height || src.format != self.format {
            return Err(RenderError::InvalidState(format!(
                "copy source {}x{} {:?} does not match destination {}x{} {:?}",
                src.width, src.height, src.format, self.width, self.height, self.format
            )));
        }
        let len = self.layer_len();
        let start = layer as usize * len;
        match (&mut self.texels, &src.texels) {
            (Texels::Color(dst), Texels::Color(from)) => {
                dst[start..start + len].copy_from_slice(&from[..len]);
            }
            (Texels::Depth(dst), Texels::Depth(from)) => {
                dst[start..start + len].copy_from_slice(&from[..len]);
            }
            _ => {
                return Err(RenderError::InvalidState(
                    "copy between color and depth textures".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn check_layer(&self, layer: u32) -> RenderResult<()> {
        if layer >= self.layers {
            return Err(RenderError::InvalidState(format!(
                "layer {} out of range for texture with {} layers",
                layer, self.layers
            )));
        }
        Ok(())
    }
}

/// Rounds a color to what the storage format can represent
pub(crate) fn quantize(format: TextureFormat, texel: [f32; 4]) -> [f32; 4] {
    match format {
        TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => {
            texel.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0)
        }
        _ => texel,
    }
}

fn decode_texel(format: TextureFormat, bytes: &[u8]) -> [f32; 4] {
    match format {
        TextureFormat::Rgba8Unorm => [
            bytes[0] as f32 / 255.0,
            bytes[1] as f32 / 255.0,
            bytes[2] as f32 / 255.0,
            bytes[3] as f32 / 255.0,
        ],
        TextureFormat::Bgra8Unorm => [
            bytes[2] as f32 / 255.0,
            bytes[1] as f32 / 255.0,
            bytes[0] as f32 / 255.0,
            bytes[3] as f32 / 255.0,
        ],
        TextureFormat::Rgba16Float => {
            let mut out = [0.0; 4];
            for (i, half) in bytes.chunks_exact(2).enumerate() {
                out[i] = f16_to_f32(u16::from_le_bytes([half[0], half[1]]));
            }
            out
        }
        TextureFormat::Rgba32Float | TextureFormat::Depth32Float => {
            let mut out = [0.0; 4];
            for (i, word) in bytes.chunks_exact(4).enumerate().take(4) {
                out[i] = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            }
            out
        }
    }
}

fn encode_texel(format: TextureFormat, texel: [f32; 4], out: &mut Vec<u8>) {
    let unorm = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    match format {
        TextureFormat::Rgba8Unorm => out.extend(texel.map(unorm)),
        TextureFormat::Bgra8Unorm => {
            out.extend([unorm(texel[2]), unorm(texel[1]), unorm(texel[0]), unorm(texel[3])])
        }
        TextureFormat::Rgba16Float => {
            for c in texel {
                out.extend_from_slice(&f32_to_f16(c).to_le_bytes());
            }
        }
        TextureFormat::Rgba32Float | TextureFormat::Depth32Float => {
            for c in texel {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
    }
}

fn f16_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1f) as i32;
    let mantissa = (bits & 0x3ff) as f32;
    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        31 => {
            if mantissa == 0.0 {
                sign * f32::INFINITY
            } else {
                f32::NAN
            }
        }
        _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
    }
}

fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    if value.is_nan() {
        return sign | 0x7e00;
    }
    let exponent = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mantissa = bits & 0x007f_ffff;
    if exponent >= 31 {
        sign | 0x7c00
    } else if exponent <= 0 {
        if exponent < -10 {
            sign
        } else {
            let mantissa = (mantissa | 0x0080_0000) >> (14 - exponent);
            sign | mantissa as u16
        }
    } else {
        sign | ((exponent as u16) << 10) | (mantissa >> 13) as u16
    }
}
