//! Descriptors, flags and enums shared by every graphics backend

use bitflags::bitflags;

use super::handles::*;

bitflags! {
    /// How a buffer is going to be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const TRANSFER_SRC = 1 << 3;
        const TRANSFER_DST = 1 << 4;
    }

    /// Where the buffer memory lives and whether the CPU can see it
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
    }

    /// How a texture is going to be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const TRANSFER_SRC = 1 << 2;
        const TRANSFER_DST = 1 << 3;
    }

    /// Shader stages a descriptor binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

impl MemoryProperties {
    /// Host-visible and coherent memory, written directly from the CPU
    pub const HOST_SHARED: Self = Self::HOST_VISIBLE.union(Self::HOST_COHERENT);
}

/// Buffer creation parameters
#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryProperties,
}

/// Pixel formats supported by both backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
}

impl TextureFormat {
    /// Size of a single texel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Depth32Float => 4,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// Shape of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    Cube,
    D2Array,
    CubeArray,
}

/// Texture creation parameters
///
/// `layers` counts array layers. Cube textures use 6 layers and cube arrays
/// use `6 * cube_count` layers.
#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl<'a> TextureDesc<'a> {
    /// Single-layer 2D texture
    pub fn d2(
        label: &'a str,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label,
            width,
            height,
            layers: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
        }
    }

    /// Size in bytes of one layer
    pub fn layer_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// Faces of a cube map in layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of this face inside a cube array
    pub fn layer(self, cube_index: u32) -> u32 {
        cube_index * 6 + self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

/// Sampler creation parameters
///
/// `compare` turns the sampler into a `LessEqual` depth comparison sampler.
#[derive(Debug, Clone)]
pub struct SamplerDesc<'a> {
    pub label: &'a str,
    pub filter: FilterMode,
    pub address: AddressMode,
    pub compare: bool,
}

/// Identifies which program an embedded shader implements
///
/// The wgpu backend compiles the WGSL text; the software backend executes the
/// CPU kernel registered for the same program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    ShadowDepth,
    PointShadowDepth,
    GeometryPass,
    Lighting,
    Forward,
    PostProcess,
}

/// Embedded shader source text
#[derive(Debug, Clone)]
pub struct ShaderSource<'a> {
    pub label: &'a str,
    pub program: ShaderProgram,
    pub wgsl: &'a str,
}

/// View shape a shader expects for a bound texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewKind {
    D2,
    D2Array,
}

/// What a descriptor binding slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    UniformBuffer,
    Texture {
        view: TextureViewKind,
        depth: bool,
        filterable: bool,
    },
    Sampler {
        comparison: bool,
        filtering: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub stages: ShaderStages,
}

#[derive(Debug, Clone)]
pub struct DescriptorSetLayoutDesc<'a> {
    pub label: &'a str,
    pub bindings: Vec<DescriptorBinding>,
}

/// Resource written into a descriptor set slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    Sampler(SamplerHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

impl DescriptorWrite {
    pub fn buffer(binding: u32, buffer: BufferHandle) -> Self {
        Self {
            binding,
            resource: DescriptorResource::Buffer(buffer),
        }
    }

    pub fn texture(binding: u32, texture: TextureHandle) -> Self {
        Self {
            binding,
            resource: DescriptorResource::Texture(texture),
        }
    }

    pub fn sampler(binding: u32, sampler: SamplerHandle) -> Self {
        Self {
            binding,
            resource: DescriptorResource::Sampler(sampler),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Clear,
    Load,
}

/// Attachment formats and load behavior of a render pass
#[derive(Debug, Clone)]
pub struct RenderPassDesc<'a> {
    pub label: &'a str,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
    pub color_load: LoadOp,
    pub depth_load: LoadOp,
}

/// Concrete single-layer 2D attachments for a render pass
#[derive(Debug, Clone)]
pub struct FramebufferDesc<'a> {
    pub label: &'a str,
    pub render_pass: RenderPassHandle,
    pub color_attachments: Vec<TextureHandle>,
    pub depth_attachment: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

/// Vertex input expected by a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInput {
    /// No vertex buffer; vertices are generated from the vertex index
    None,
    /// Interleaved [`Vertex3D`](crate::gfx::scene::vertex::Vertex3D) data
    Mesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
}

impl DepthState {
    pub const DISABLED: Self = Self {
        test: false,
        write: false,
    };
    pub const READ_WRITE: Self = Self {
        test: true,
        write: true,
    };
    pub const READ_ONLY: Self = Self {
        test: true,
        write: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Replace,
    Alpha,
}

/// Graphics pipeline creation parameters
#[derive(Debug, Clone)]
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub shader: ShaderHandle,
    pub vertex_entry: &'a str,
    pub fragment_entry: Option<&'a str>,
    pub vertex_input: VertexInput,
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub render_pass: RenderPassHandle,
    pub cull_mode: CullMode,
    pub depth: DepthState,
    pub blend: BlendMode,
}

/// A single recorded draw
///
/// `descriptor_sets[i]` is bound at set index `i`. With an index buffer
/// `count` is the index count, otherwise the vertex count.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub pipeline: PipelineHandle,
    pub descriptor_sets: Vec<DescriptorSetHandle>,
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub count: u32,
}

/// One render pass worth of draws against a framebuffer
#[derive(Debug, Clone)]
pub struct PassRecording {
    pub label: String,
    pub framebuffer: FramebufferHandle,
    pub clear_colors: Vec<[f32; 4]>,
    pub clear_depth: f32,
    pub draws: Vec<DrawCall>,
}

impl PassRecording {
    pub fn new(label: impl Into<String>, framebuffer: FramebufferHandle) -> Self {
        Self {
            label: label.into(),
            framebuffer,
            clear_colors: Vec::new(),
            clear_depth: 1.0,
            draws: Vec::new(),
        }
    }

    pub fn with_clear_colors(mut self, colors: Vec<[f32; 4]>) -> Self {
        self.clear_colors = colors;
        self
    }

    pub fn push(&mut self, draw: DrawCall) {
        self.draws.push(draw);
    }
}
