use std::collections::HashMap;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::backend::DepthView;
use crate::device::Gpu;
use crate::math::ray_projection;
use crate::mesh::PrimitiveType;
use crate::scene::{MeshId, Scene, SceneId};

use super::{DEPTH_FORMAT, grow_buffer};

/// Render targets of one first-pass draw.
pub(crate) struct DepthTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

struct GpuMesh {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    index_count: u32,
}

/// Rasterises scene geometry into `(range, retro, 0)` texels.
#[derive(Default)]
pub(crate) struct DepthPass {
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniform: Option<wgpu::Buffer>,

    instance_vbo: Option<wgpu::Buffer>,
    instance_capacity: u64,

    meshes: HashMap<(SceneId, MeshId), GpuMesh>,
}

impl DepthPass {
    pub(crate) fn render(
        &mut self,
        gpu: &Gpu,
        scene: &Scene,
        view: &DepthView,
        target: DepthTarget<'_>,
    ) -> Result<()> {
        self.ensure_pipeline(gpu, target.format);
        self.ensure_bindings(gpu);

        let mut items = Vec::new();
        for item in scene.render_items(view.visibility_mask) {
            if self.ensure_mesh(gpu, scene, item.mesh) {
                items.push(item);
            }
        }
        items.sort_by_key(|i| i.mesh);

        let instances: Vec<DepthInstance> = items
            .iter()
            .map(|i| DepthInstance {
                model: i.transform.to_cols_array_2d(),
                retro: [i.retro, 0.0, 0.0, 0.0],
            })
            .collect();

        let to_camera = view.pose.inverse().to_mat4();
        let proj = ray_projection(view.hfov, view.vfov, view.near, view.far);
        let uniform = DepthUniform {
            view_proj: (proj * to_camera).to_cols_array_2d(),
            view: to_camera.to_cols_array_2d(),
            clip: [view.near, view.far, 0.0, 0.0],
        };
        if let Some(ubo) = self.uniform.as_ref() {
            gpu.queue().write_buffer(ubo, 0, bytemuck::bytes_of(&uniform));
        }
        if !instances.is_empty() {
            let bytes: &[u8] = bytemuck::cast_slice(&instances);
            grow_buffer(
                gpu,
                &mut self.instance_vbo,
                &mut self.instance_capacity,
                bytes.len() as u64,
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                "lumen depth instance vbo",
            );
            if let Some(vbo) = self.instance_vbo.as_ref() {
                gpu.queue().write_buffer(vbo, 0, bytes);
            }
        }

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen depth encoder"),
            });
        {
            let [r, g, b] = view.background;
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen depth pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color,
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
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(pipeline), Some(bind_group), Some(instance_vbo)) = (
                self.pipelines.get(&target.format),
                self.bind_group.as_ref(),
                self.instance_vbo.as_ref(),
            ) {
                if !items.is_empty() {
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, bind_group, &[]);
                    rpass.set_vertex_buffer(1, instance_vbo.slice(..));

                    // One instanced draw per run of items sharing a mesh.
                    let mut i = 0usize;
                    while i < items.len() {
                        let mesh_id = items[i].mesh;
                        let mut j = i + 1;
                        while j < items.len() && items[j].mesh == mesh_id {
                            j += 1;
                        }
                        if let Some(mesh) = self.meshes.get(&(scene.id(), mesh_id)) {
                            rpass.set_vertex_buffer(0, mesh.vbo.slice(..));
                            rpass.set_index_buffer(mesh.ibo.slice(..), wgpu::IndexFormat::Uint32);
                            rpass.draw_indexed(0..mesh.index_count, 0, i as u32..j as u32);
                        }
                        i = j;
                    }
                }
            }
        }
        gpu.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    /// Drops cached meshes of a destroyed scene.
    pub(crate) fn release_scene(&mut self, scene: SceneId) {
        self.meshes.retain(|(s, _), _| *s != scene);
    }

    /// Uploads a scene mesh once. Returns `false` when it has no triangles.
    fn ensure_mesh(&mut self, gpu: &Gpu, scene: &Scene, id: MeshId) -> bool {
        let key = (scene.id(), id);
        if self.meshes.contains_key(&key) {
            return true;
        }
        let Some(mesh) = scene.mesh(id) else { return false };

        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        for sub in mesh
            .sub_meshes()
            .iter()
            .filter(|s| s.primitive_type() == PrimitiveType::Triangles)
        {
            let base = positions.len() as u32;
            positions.extend(sub.vertices().iter().map(|v| v.to_array()));
            indices.extend(sub.indices().iter().map(|i| base + i));
        }
        if indices.is_empty() {
            return false;
        }

        let vbo = gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lumen mesh vbo"),
                contents: bytemuck::cast_slice(&positions),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let ibo = gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lumen mesh ibo"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        log::debug!("uploaded mesh `{}` ({} indices)", mesh.name(), indices.len());
        self.meshes.insert(
            key,
            GpuMesh {
                vbo,
                ibo,
                index_count: indices.len() as u32,
            },
        );
        true
    }

    fn ensure_layout(&mut self, gpu: &Gpu) {
        if self.bind_group_layout.is_some() {
            return;
        }
        let layout = gpu
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lumen depth bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DepthUniform>() as u64,
                        ),
                    },
                    count: None,
                }],
            });
        self.bind_group_layout = Some(layout);
    }

    fn ensure_pipeline(&mut self, gpu: &Gpu, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&format) {
            return;
        }
        self.ensure_layout(gpu);
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };

        let shader = gpu
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("lumen depth shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/depth.wgsl").into()),
            });

        let pipeline_layout = gpu
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lumen depth pipeline layout"),
                bind_group_layouts: &[bgl],
                immediate_size: 0,
            });

        let pipeline = gpu
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("lumen depth pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[MESH_VERTEX_LAYOUT, DepthInstance::layout()],
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
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        log::debug!("created depth pipeline for {format:?}");
        self.pipelines.insert(format, pipeline);
    }

    fn ensure_bindings(&mut self, gpu: &Gpu) {
        if self.bind_group.is_some() && self.uniform.is_some() {
            return;
        }
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };

        let uniform = gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen depth ubo"),
            size: std::mem::size_of::<DepthUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen depth bind group"),
            layout: bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });
        self.uniform = Some(uniform);
        self.bind_group = Some(bind_group);
    }
}

const MESH_VERTEX_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

const MESH_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 12,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &MESH_VERTEX_ATTRS,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DepthUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    clip: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DepthInstance {
    model: [[f32; 4]; 4],
    retro: [f32; 4],
}

impl DepthInstance {
    const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        1 => Float32x4, // model col 0
        2 => Float32x4, // model col 1
        3 => Float32x4, // model col 2
        4 => Float32x4, // model col 3
        5 => Float32x4  // retro
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<DepthInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_matches_shader() {
        // Two mat4x4 plus one vec4.
        assert_eq!(std::mem::size_of::<DepthUniform>(), 144);
        assert_eq!(std::mem::size_of::<DepthInstance>(), 80);
    }
}
