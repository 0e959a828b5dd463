//! Hardware backend on top of wgpu.
//!
//! Render textures live on the GPU; every pass is submitted immediately and
//! [`RenderBackend::read_texture`] blocks on the copy.

mod composite_pass;
mod depth_pass;
mod readback;

use std::collections::HashMap;

use anyhow::{Result, anyhow, ensure};

use crate::device::{Gpu, GpuInit};
use crate::mesh::Mesh;
use crate::scene::{Scene, SceneId};
use crate::texture::{RenderTextureDesc, TextureId};

use super::{DepthView, RenderBackend};

use composite_pass::{CompositePass, CompositeTarget, MAX_SOURCES};
use depth_pass::{DepthPass, DepthTarget};
use readback::texture_format;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuTexture {
    desc: RenderTextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    /// Depth attachment, created on first use as a first-pass target.
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

/// wgpu implementation of [`RenderBackend`].
pub struct WgpuBackend {
    gpu: Gpu,
    textures: HashMap<TextureId, GpuTexture>,
    next_texture: u32,
    depth_pass: DepthPass,
    composite_pass: CompositePass,
}

impl WgpuBackend {
    /// Acquires a headless device. Blocks on adapter and device requests.
    pub fn new(init: GpuInit) -> Result<Self> {
        let gpu = Gpu::new_blocking(init)?;
        Ok(Self::with_gpu(gpu))
    }

    pub fn with_gpu(gpu: Gpu) -> Self {
        Self {
            gpu,
            textures: HashMap::new(),
            next_texture: 0,
            depth_pass: DepthPass::default(),
            composite_pass: CompositePass::default(),
        }
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }


    fn ensure_depth_attachment(&mut self, id: TextureId) -> Result<()> {
        let device = self.gpu.device();
        let tex = self
            .textures
            .get_mut(&id)
            .ok_or_else(|| anyhow!("render texture {} does not exist", id.raw()))?;
        if tex.depth.is_some() {
            return Ok(());
        }
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen depth attachment"),
            size: wgpu::Extent3d {
                width: tex.desc.width,
                height: tex.desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        tex.depth = Some((depth, view));
        Ok(())
    }
}

fn lookup(textures: &HashMap<TextureId, GpuTexture>, id: TextureId) -> Result<&GpuTexture> {
    textures
        .get(&id)
        .ok_or_else(|| anyhow!("render texture {} does not exist", id.raw()))
}

/// Grows `slot` to hold at least `required` bytes, doubling capacity.
pub(crate) fn grow_buffer(
    gpu: &Gpu,
    slot: &mut Option<wgpu::Buffer>,
    capacity: &mut u64,
    required: u64,
    usage: wgpu::BufferUsages,
    label: &str,
) {
    if required <= *capacity && slot.is_some() {
        return;
    }
    let size = required.next_power_of_two().max(256);
    *slot = Some(gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage,
        mapped_at_creation: false,
    }));
    *capacity = size;
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_render_texture(&mut self, desc: RenderTextureDesc) -> Result<TextureId> {
        desc.validate()?;
        let max = self.gpu.max_texture_size();
        ensure!(
            desc.width <= max && desc.height <= max,
            "render texture `{}` ({}x{}) exceeds device limit {max}",
            desc.label,
            desc.width,
            desc.height
        );

        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        log::debug!("wgpu: created `{}` {}x{} {}", desc.label, desc.width, desc.height, desc.format);
        self.textures.insert(
            id,
            GpuTexture {
                desc,
                texture,
                view,
                depth: None,
            },
        );
        Ok(id)
    }

    fn destroy_render_texture(&mut self, id: TextureId) {
        if let Some(tex) = self.textures.remove(&id) {
            tex.texture.destroy();
            if let Some((depth, _)) = tex.depth {
                depth.destroy();
            }
        }
    }

    fn texture_desc(&self, id: TextureId) -> Option<&RenderTextureDesc> {
        self.textures.get(&id).map(|t| &t.desc)
    }

    fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn max_texture_size(&self) -> u32 {
        self.gpu.max_texture_size()
    }

    fn release_scene(&mut self, scene: SceneId) {
        self.depth_pass.release_scene(scene);
    }

    fn render_depth(&mut self, scene: &Scene, view: &DepthView, target: TextureId) -> Result<()> {
        self.ensure_depth_attachment(target)?;
        let tex = lookup(&self.textures, target)?;
        let depth = tex
            .depth
            .as_ref()
            .map(|(_, v)| v)
            .ok_or_else(|| anyhow!("render texture `{}` has no depth attachment", tex.desc.label))?;
        self.depth_pass.render(
            &self.gpu,
            scene,
            view,
            DepthTarget {
                color: &tex.view,
                depth,
                format: texture_format(tex.desc.format),
            },
        )
    }

    fn render_composite(
        &mut self,
        mesh: &Mesh,
        sources: &[TextureId],
        target: TextureId,
        background: [f32; 3],
    ) -> Result<()> {
        ensure!(
            sources.len() <= MAX_SOURCES,
            "wgpu compositor binds at most {MAX_SOURCES} source textures"
        );
        ensure!(!sources.contains(&target), "composite target cannot also be a source");
        let views: Vec<&wgpu::TextureView> = sources
            .iter()
            .map(|id| lookup(&self.textures, *id).map(|t| &t.view))
            .collect::<Result<_>>()?;
        let dst = lookup(&self.textures, target)?;
        self.composite_pass.render(
            &self.gpu,
            mesh,
            &views,
            CompositeTarget {
                view: &dst.view,
                format: texture_format(dst.desc.format),
                width: dst.desc.width,
                height: dst.desc.height,
            },
            background,
        )
    }

    fn read_texture(&mut self, id: TextureId, out: &mut Vec<f32>) -> Result<()> {
        let tex = lookup(&self.textures, id)?;
        readback::read_texture(&self.gpu, &tex.texture, &tex.desc, out)
    }
}
