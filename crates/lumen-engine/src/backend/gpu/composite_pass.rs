use std::collections::HashMap;

use anyhow::{Result, ensure};
use bytemuck::{Pod, Zeroable};

use crate::backend::composite::{composite_projection, texture_index};
use crate::device::Gpu;
use crate::mesh::Mesh;

use super::grow_buffer;

/// Source textures the composite shader can bind.
pub(crate) const MAX_SOURCES: usize = 4;

/// Render target of the second pass.
pub(crate) struct CompositeTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Draws the undistortion mesh as points, one per output texel.
#[derive(Default)]
pub(crate) struct CompositePass {
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    uniform: Option<wgpu::Buffer>,

    vbo: Option<wgpu::Buffer>,
    vbo_capacity: u64,
    ibo: Option<wgpu::Buffer>,
    ibo_capacity: u64,
}

impl CompositePass {
    pub(crate) fn render(
        &mut self,
        gpu: &Gpu,
        mesh: &Mesh,
        sources: &[&wgpu::TextureView],
        target: CompositeTarget<'_>,
        background: [f32; 3],
    ) -> Result<()> {
        ensure!(
            (1..=MAX_SOURCES).contains(&sources.len()),
            "composite pass takes 1..={MAX_SOURCES} source textures, got {}",
            sources.len()
        );
        self.ensure_pipeline(gpu, target.format);
        self.ensure_uniform(gpu);

        let (vertices, indices) = flatten(mesh, sources.len());
        let uniform = CompositeUniform {
            proj: composite_projection(target.width, target.height).to_cols_array_2d(),
        };
        if let Some(ubo) = self.uniform.as_ref() {
            gpu.queue().write_buffer(ubo, 0, bytemuck::bytes_of(&uniform));
        }
        if !indices.is_empty() {
            let vbytes: &[u8] = bytemuck::cast_slice(&vertices);
            let ibytes: &[u8] = bytemuck::cast_slice(&indices);
            grow_buffer(
                gpu,
                &mut self.vbo,
                &mut self.vbo_capacity,
                vbytes.len() as u64,
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                "lumen composite vbo",
            );
            grow_buffer(
                gpu,
                &mut self.ibo,
                &mut self.ibo_capacity,
                ibytes.len() as u64,
                wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                "lumen composite ibo",
            );
            if let (Some(vbo), Some(ibo)) = (self.vbo.as_ref(), self.ibo.as_ref()) {
                gpu.queue().write_buffer(vbo, 0, vbytes);
                gpu.queue().write_buffer(ibo, 0, ibytes);
            }
        }

        let bind_group = match (self.bind_group_layout.as_ref(), self.uniform.as_ref()) {
            (Some(bgl), Some(ubo)) => {
                // Unused slots repeat the last source.
                let view = |i: usize| sources[i.min(sources.len() - 1)];
                Some(gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("lumen composite bind group"),
                    layout: bgl,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: ubo.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view(0)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(view(1)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(view(2)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::TextureView(view(3)),
                        },
                    ],
                }))
            }
            _ => None,
        };

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen composite encoder"),
            });
        {
            let [r, g, b] = background;
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(pipeline), Some(bind_group), Some(vbo), Some(ibo)) = (
                self.pipelines.get(&target.format),
                bind_group.as_ref(),
                self.vbo.as_ref(),
                self.ibo.as_ref(),
            ) {
                if !indices.is_empty() {
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, bind_group, &[]);
                    rpass.set_vertex_buffer(0, vbo.slice(..));
                    rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(0..indices.len() as u32, 0, 0..1);
                }
            }
        }
        gpu.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    fn ensure_pipeline(&mut self, gpu: &Gpu, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&format) {
            return;
        }
        if self.bind_group_layout.is_none() {
            self.bind_group_layout = Some(create_layout(gpu));
        }
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };

        let shader = gpu
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("lumen composite shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/composite.wgsl").into()),
            });
        let pipeline_layout = gpu
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lumen composite pipeline layout"),
                bind_group_layouts: &[bgl],
                immediate_size: 0,
            });
        let pipeline = gpu
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("lumen composite pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[CompositeVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!("created composite pipeline for {format:?}");
        self.pipelines.insert(format, pipeline);
    }

    fn ensure_uniform(&mut self, gpu: &Gpu) {
        if self.uniform.is_some() {
            return;
        }
        self.uniform = Some(gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen composite ubo"),
            size: std::mem::size_of::<CompositeUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
    }
}

fn create_layout(gpu: &Gpu) -> wgpu::BindGroupLayout {
    let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    gpu.device()
        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen composite bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<CompositeUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
            ],
        })
}

/// Packs every point of `mesh` into GPU vertices, with the texture index
/// decoded and clamped to the bound sources.
fn flatten(mesh: &Mesh, source_count: usize) -> (Vec<CompositeVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(mesh.vertex_count());
    let mut indices = Vec::with_capacity(mesh.vertex_count());
    for sub in mesh.sub_meshes() {
        let base = vertices.len() as u32;
        let uvs = sub.tex_coords();
        vertices.extend(sub.vertices().iter().enumerate().map(|(k, p)| {
            let uv = uvs.get(k).copied().unwrap_or_default();
            CompositeVertex {
                position: p.to_array(),
                uv: uv.to_array(),
                tex: texture_index(*p).min(source_count - 1) as u32,
            }
        }));
        if sub.indices().is_empty() {
            indices.extend(base..base + sub.vertex_count() as u32);
        } else {
            indices.extend(sub.indices().iter().map(|i| base + i));
        }
    }
    (vertices, indices)
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CompositeUniform {
    proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct CompositeVertex {
    position: [f32; 3],
    uv: [f32; 2],
    tex: u32,
}

impl CompositeVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2, // uv
        2 => Uint32     // texture index
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CompositeVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{PrimitiveType, SubMesh};
    use glam::{Vec2, Vec3};

    #[test]
    fn flatten_clamps_texture_index() {
        let mut sub = SubMesh::new(PrimitiveType::Points);
        sub.add_vertex(Vec3::new(0.003, 0.0, 0.1));
        sub.add_tex_coord(Vec2::new(0.5, 0.5));
        let mut mesh = Mesh::new("m");
        mesh.add_sub_mesh(sub);

        let (vertices, indices) = flatten(&mesh, 2);
        assert_eq!(vertices[0].tex, 1);
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<CompositeVertex>(), 24);
    }
}
