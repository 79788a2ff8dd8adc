//! WGPU binding type utilities
//!
//! Translates the backend-neutral descriptor kinds into `wgpu::BindingType`.

use crate::gfx::backend::{DescriptorKind, TextureViewKind};

pub fn uniform() -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

pub fn sampler(comparison: bool, filtering: bool) -> wgpu::BindingType {
    let ty = if comparison {
        wgpu::SamplerBindingType::Comparison
    } else if filtering {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    wgpu::BindingType::Sampler(ty)
}

pub fn view_dimension(view: TextureViewKind) -> wgpu::TextureViewDimension {
    match view {
        TextureViewKind::D2 => wgpu::TextureViewDimension::D2,
        TextureViewKind::D2Array => wgpu::TextureViewDimension::D2Array,
    }
}

pub fn texture(view: TextureViewKind, depth: bool, filterable: bool) -> wgpu::BindingType {
    let sample_type = if depth {
        wgpu::TextureSampleType::Depth
    } else {
        wgpu::TextureSampleType::Float { filterable }
    };
    wgpu::BindingType::Texture {
        sample_type,
        view_dimension: view_dimension(view),
        multisampled: false,
    }
}

/// Binding type for a layout entry
pub fn from_kind(kind: DescriptorKind) -> wgpu::BindingType {
    match kind {
        DescriptorKind::UniformBuffer => uniform(),
        DescriptorKind::Texture {
            view,
            depth,
            filterable,
        } => texture(view, depth, filterable),
        DescriptorKind::Sampler {
            comparison,
            filtering,
        } => sampler(comparison, filtering),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_array_binding_is_depth_array() {
        let shadow_maps = DescriptorKind::Texture {
            view: TextureViewKind::D2Array,
            depth: true,
            filterable: false,
        };
        match from_kind(shadow_maps) {
            wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                ..
            } => {
                assert_eq!(sample_type, wgpu::TextureSampleType::Depth);
                assert_eq!(view_dimension, wgpu::TextureViewDimension::D2Array);
            }
            other => panic!("unexpected binding type {:?}", other),
        }
    }

    #[test]
    fn test_comparison_sampler_wins_over_filtering() {
        assert_eq!(
            sampler(true, true),
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
        );
    }
}
