//! Triangle rasterizer for the software device
//!
//! Follows the wgpu conventions so both backends produce the same image:
//! clip-space depth in [0, 1], NDC y up, framebuffer y down, counter-clockwise
//! front faces, pixel centers at `+0.5`.

use cgmath::Vector4;

use super::texture::quantize;
use crate::gfx::backend::{BlendMode, CullMode, DepthState, TextureFormat};

pub(crate) const MAX_VARYINGS: usize = 12;
pub(crate) const MAX_COLOR_TARGETS: usize = 4;

/// Vertex shader output
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClipVertex {
    pub clip: Vector4<f32>,
    pub varyings: [f32; MAX_VARYINGS],
}

impl ClipVertex {
    pub(crate) fn new(clip: Vector4<f32>) -> Self {
        Self {
            clip,
            varyings: [0.0; MAX_VARYINGS],
        }
    }

    fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        let mut varyings = [0.0; MAX_VARYINGS];
        for (i, value) in varyings.iter_mut().enumerate() {
            *value = self.varyings[i] + (other.varyings[i] - self.varyings[i]) * t;
        }
        ClipVertex {
            clip: self.clip + (other.clip - self.clip) * t,
            varyings,
        }
    }
}

/// Interpolated fragment shader input
pub(crate) struct FragmentInput {
    /// Pixel center x, y and interpolated depth
    pub frag_coord: [f32; 3],
    pub varyings: [f32; MAX_VARYINGS],
}

/// Fragment shader output
pub(crate) struct FragmentOutput {
    pub colors: [[f32; 4]; MAX_COLOR_TARGETS],
    /// Replaces the interpolated depth when set
    pub depth: Option<f32>,
}

impl FragmentOutput {
    pub(crate) fn color(color: [f32; 4]) -> Self {
        let mut colors = [[0.0; 4]; MAX_COLOR_TARGETS];
        colors[0] = color;
        Self {
            colors,
            depth: None,
        }
    }

    pub(crate) fn depth_only(depth: Option<f32>) -> Self {
        Self {
            colors: [[0.0; 4]; MAX_COLOR_TARGETS],
            depth,
        }
    }
}

/// A prepared shader program for one draw call
pub(crate) trait Kernel {
    fn vertex(&self, input: VertexSource) -> ClipVertex;

    /// `None` discards the fragment
    fn fragment(&self, input: &FragmentInput) -> Option<FragmentOutput>;

    /// Whether `fragment` overrides depth, which disables early depth rejection
    fn writes_depth(&self) -> bool {
        false
    }
}

/// Where a vertex comes from
#[derive(Clone, Copy)]
pub(crate) enum VertexSource<'a> {
    Mesh(&'a crate::gfx::scene::vertex::Vertex3D),
    Index(u32),
}

pub(crate) struct ColorTarget<'a> {
    pub texels: &'a mut [[f32; 4]],
    pub format: TextureFormat,
}

pub(crate) struct RenderTarget<'a> {
    pub width: u32,
    pub height: u32,
    pub colors: Vec<ColorTarget<'a>>,
    pub depth: Option<&'a mut [f32]>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RasterState {
    pub cull_mode: CullMode,
    pub depth: DepthState,
    pub blend: BlendMode,
}

struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
    varyings: [f32; MAX_VARYINGS],
}

/// Clips against the near plane (`z >= 0`), keeping a convex polygon
fn clip_near(triangle: [ClipVertex; 3]) -> Vec<ClipVertex> {
    let mut output = Vec::with_capacity(4);
    for i in 0..3 {
        let current = triangle[i];
        let next = triangle[(i + 1) % 3];
        let current_inside = current.clip.z >= 0.0;
        let next_inside = next.clip.z >= 0.0;
        if current_inside {
            output.push(current);
        }
        if current_inside != next_inside {
            let t = current.clip.z / (current.clip.z - next.clip.z);
            output.push(current.lerp(&next, t));
        }
    }
    output
}

fn to_screen(vertex: &ClipVertex, width: u32, height: u32) -> Option<ScreenVertex> {
    let w = vertex.clip.w;
    if w.abs() < 1e-7 {
        return None;
    }
    let inv_w = 1.0 / w;
    let ndc_x = vertex.clip.x * inv_w;
    let ndc_y = vertex.clip.y * inv_w;
    Some(ScreenVertex {
        x: (ndc_x * 0.5 + 0.5) * width as f32,
        y: (0.5 - ndc_y * 0.5) * height as f32,
        z: vertex.clip.z * inv_w,
        inv_w,
        varyings: vertex.varyings,
    })
}

fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Rasterizes one triangle into the target. Returns the number of shaded fragments.
pub(crate) fn draw_triangle(
    kernel: &dyn Kernel,
    triangle: [ClipVertex; 3],
    state: &RasterState,
    target: &mut RenderTarget,
) -> usize {
    let polygon = clip_near(triangle);
    if polygon.len() < 3 {
        return 0;
    }

    let mut shaded = 0;
    for i in 1..polygon.len() - 1 {
        let screen = [
            to_screen(&polygon[0], target.width, target.height),
            to_screen(&polygon[i], target.width, target.height),
            to_screen(&polygon[i + 1], target.width, target.height),
        ];
        if let [Some(a), Some(b), Some(c)] = screen {
            shaded += rasterize(kernel, [a, b, c], state, target);
        }
    }
    shaded
}

fn rasterize(
    kernel: &dyn Kernel,
    v: [ScreenVertex; 3],
    state: &RasterState,
    target: &mut RenderTarget,
) -> usize {
    // Counter-clockwise in NDC is clockwise once y points down, so front faces
    // have a negative screen-space area.
    let area = edge(&v[0], &v[1], v[2].x, v[2].y);
    if area.abs() < 1e-12 {
        return 0;
    }
    if state.cull_mode == CullMode::Back && area > 0.0 {
        return 0;
    }

    let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0) as i32;
    let max_x = v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil().min(target.width as f32) as i32;
    let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0) as i32;
    let max_y = v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil().min(target.height as f32) as i32;

    let mut shaded = 0;
    for py in min_y..max_y {
        for px in min_x..max_x {
            let cx = px as f32 + 0.5;
            let cy = py as f32 + 0.5;
            let w0 = edge(&v[1], &v[2], cx, cy) / area;
            let w1 = edge(&v[2], &v[0], cx, cy) / area;
            let w2 = edge(&v[0], &v[1], cx, cy) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = w0 * v[0].z + w1 * v[1].z + w2 * v[2].z;
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let pixel = py as usize * target.width as usize + px as usize;

            if state.depth.test && !kernel.writes_depth() {
                if let Some(depth) = target.depth.as_deref() {
                    if z >= depth[pixel] {
                        continue;
                    }
                }
            }

            let p0 = w0 * v[0].inv_w;
            let p1 = w1 * v[1].inv_w;
            let p2 = w2 * v[2].inv_w;
            let sum = p0 + p1 + p2;
            let mut varyings = [0.0; MAX_VARYINGS];
            for (k, value) in varyings.iter_mut().enumerate() {
                *value = (p0 * v[0].varyings[k] + p1 * v[1].varyings[k] + p2 * v[2].varyings[k]) / sum;
            }

            let input = FragmentInput {
                frag_coord: [cx, cy, z],
                varyings,
            };
            let Some(output) = kernel.fragment(&input) else {
                continue;
            };
            let fragment_depth = output.depth.unwrap_or(z);

            if let Some(depth) = target.depth.as_deref_mut() {
                if state.depth.test && fragment_depth >= depth[pixel] {
                    continue;
                }
                if state.depth.write {
                    depth[pixel] = fragment_depth;
                }
            }

            for (slot, color_target) in target.colors.iter_mut().enumerate() {
                let src = output.colors[slot];
                let dst = color_target.texels[pixel];
                let blended = match state.blend {
                    BlendMode::Replace => src,
                    BlendMode::Alpha => {
                        let a = src[3];
                        [
                            src[0] * a + dst[0] * (1.0 - a),
                            src[1] * a + dst[1] * (1.0 - a),
                            src[2] * a + dst[2] * (1.0 - a),
                            a + dst[3] * (1.0 - a),
                        ]
                    }
                };
                color_target.texels[pixel] = quantize(color_target.format, blended);
            }
            shaded += 1;
        }
    }
    shaded
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl Kernel for Flat {
        fn vertex(&self, _input: VertexSource) -> ClipVertex {
            ClipVertex::new(Vector4::new(0.0, 0.0, 0.0, 1.0))
        }

        fn fragment(&self, _input: &FragmentInput) -> Option<FragmentOutput> {
            Some(FragmentOutput::color([1.0, 0.0, 0.0, 1.0]))
        }
    }

    fn triangle(points: [[f32; 3]; 3]) -> [ClipVertex; 3] {
        points.map(|p| ClipVertex::new(Vector4::new(p[0], p[1], p[2], 1.0)))
    }

    fn run(tri: [ClipVertex; 3], cull_mode: CullMode, texels: &mut [[f32; 4]]) -> usize {
        let mut target = RenderTarget {
            width: 4,
            height: 4,
            colors: vec![ColorTarget {
                texels,
                format: TextureFormat::Rgba32Float,
            }],
            depth: None,
        };
        let state = RasterState {
            cull_mode,
            depth: DepthState::DISABLED,
            blend: BlendMode::Replace,
        };
        draw_triangle(&Flat, tri, &state, &mut target)
    }

    #[test]
    fn test_counter_clockwise_triangle_is_front_facing() {
        let mut texels = vec![[0.0; 4]; 16];
        let ccw = triangle([[-1.0, -1.0, 0.5], [1.0, -1.0, 0.5], [-1.0, 1.0, 0.5]]);
        assert!(run(ccw, CullMode::Back, &mut texels) > 0);

        let cw = triangle([[-1.0, -1.0, 0.5], [-1.0, 1.0, 0.5], [1.0, -1.0, 0.5]]);
        assert_eq!(run(cw, CullMode::Back, &mut texels), 0);
        assert!(run(cw, CullMode::None, &mut texels) > 0);
    }

    #[test]
    fn test_triangle_behind_near_plane_is_clipped() {
        let mut texels = vec![[0.0; 4]; 16];
        let behind = triangle([[-1.0, -1.0, -0.5], [1.0, -1.0, -0.5], [-1.0, 1.0, -0.5]]);
        assert_eq!(run(behind, CullMode::None, &mut texels), 0);
    }

    #[test]
    fn test_degenerate_triangle_draws_nothing() {
        let mut texels = vec![[0.0; 4]; 16];
        let flat = triangle([[0.0, 0.0, 0.5], [0.0, 0.0, 0.5], [0.0, 0.0, 0.5]]);
        assert_eq!(run(flat, CullMode::None, &mut texels), 0);
    }
}
