use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use lemuria_instancing::InstancedObjectPool;
use lemuria_render::{DrawItem, Frame, Renderer};
use wgpu::util::DeviceExt;

use crate::shaders;

const HIGHLIGHT_COLOR: [f32; 4] = [1.0, 0.85, 0.0, 1.0];
const GRID_COLOR: [f32; 4] = [0.35, 0.45, 0.35, 1.0];
const MAX_HIGHLIGHT_EDGES: usize = 12;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    fog_color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(model: Mat4, color: [f32; 4]) -> Self {
        let cols = model.to_cols_array_2d();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            color,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct LineVertex {
    position: [f32; 3],
    color: [f32; 4],
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Pool buffers written this frame.
    pub uploads: u32,
    pub draw_calls: u32,
    pub instances: u32,
}

/// Unit cube centred on the origin.
fn box_mesh() -> (Vec<Vertex>, Vec<u16>) {
    let p = 0.5_f32;
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-p, -p, p], [p, -p, p], [p, p, p], [-p, p, p]]),
        ([0.0, 0.0, -1.0], [[p, -p, -p], [-p, -p, -p], [-p, p, -p], [p, p, -p]]),
        ([1.0, 0.0, 0.0], [[p, -p, p], [p, -p, -p], [p, p, -p], [p, p, p]]),
        ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p, p], [-p, p, p], [-p, p, -p]]),
        ([0.0, 1.0, 0.0], [[-p, p, p], [p, p, p], [p, p, -p], [-p, p, -p]]),
        ([0.0, -1.0, 0.0], [[-p, -p, -p], [p, -p, -p], [p, -p, p], [-p, -p, p]]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u16;
        vertices.extend(corners.iter().map(|&position| Vertex { position, normal }));
        indices.extend([base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

/// Floor grid lines on y = 0.
fn grid_mesh(half_extent: i32, spacing: f32) -> Vec<LineVertex> {
    let extent = half_extent as f32 * spacing;
    let mut verts = Vec::with_capacity((half_extent as usize * 2 + 1) * 4);
    for i in -half_extent..=half_extent {
        let offset = i as f32 * spacing;
        for position in [
            [-extent, 0.0, offset],
            [extent, 0.0, offset],
            [offset, 0.0, -extent],
            [offset, 0.0, extent],
        ] {
            verts.push(LineVertex {
                position,
                color: GRID_COLOR,
            });
        }
    }
    verts
}

/// Per-slot instance data for a pool. Vacant slots stay all-zero.
fn pool_instances(pool: &InstancedObjectPool) -> Vec<InstanceData> {
    let geometry = pool.geometry();
    let fit = geometry.bounds.unit_cube_matrix();
    pool.instances()
        .iter()
        .map(|m| {
            if *m == Mat4::ZERO {
                InstanceData::zeroed()
            } else {
                InstanceData::new(*m * fit, geometry.color)
            }
        })
        .collect()
}

fn item_instances(items: &[DrawItem]) -> Vec<InstanceData> {
    items
        .iter()
        .map(|item| {
            let fit = item.renderable.bounds.unit_cube_matrix();
            InstanceData::new(item.model * fit, item.renderable.color)
        })
        .collect()
}

fn wireframe_vertices(edges: &[[Vec3; 2]]) -> Vec<LineVertex> {
    edges
        .iter()
        .take(MAX_HIGHLIGHT_EDGES)
        .flatten()
        .map(|p| LineVertex {
            position: p.to_array(),
            color: HIGHLIGHT_COLOR,
        })
        .collect()
}

/// GPU copy of one pool's instance buffer.
struct PoolBuffer {
    buffer: wgpu::Buffer,
    capacity: u32,
    draw_count: u32,
}

/// wgpu-based scene renderer.
pub struct WgpuRenderer {
    box_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    box_vertex_buffer: wgpu::Buffer,
    box_index_buffer: wgpu::Buffer,
    box_index_count: u32,
    grid_vertex_buffer: wgpu::Buffer,
    grid_vertex_count: u32,
    pools: HashMap<String, PoolBuffer>,
    item_buffer: wgpu::Buffer,
    item_capacity: u32,
    overlay_buffer: wgpu::Buffer,
    depth_texture: wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform_buffer"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                eye: [0.0; 4],
                fog_color: [0.0; 4],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let box_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("box_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BOX_SHADER.into()),
        });

        let box_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("box_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &box_shader,
                entry_point: Some("vs_box"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x3,
                            1 => Float32x3,
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<InstanceData>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4,
                            6 => Float32x4,
                        ],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &box_shader,
                entry_point: Some("fs_box"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("line_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::LINE_SHADER.into()),
        });

        let grid_pipeline = line_pipeline(
            device,
            &pipeline_layout,
            &line_shader,
            surface_format,
            "grid_pipeline",
            depth_state(true, wgpu::CompareFunction::Less),
        );
        // The selection wireframe ignores depth so it shows through walls.
        let overlay_pipeline = line_pipeline(
            device,
            &pipeline_layout,
            &line_shader,
            surface_format,
            "overlay_pipeline",
            depth_state(false, wgpu::CompareFunction::Always),
        );

        let (box_verts, box_indices) = box_mesh();
        let box_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("box_vertex_buffer"),
            contents: bytemuck::cast_slice(&box_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let box_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("box_index_buffer"),
            contents: bytemuck::cast_slice(&box_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let grid_verts = grid_mesh(50, 1.0);
        let grid_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid_vertex_buffer"),
            contents: bytemuck::cast_slice(&grid_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let item_capacity = 64;
        let item_buffer = instance_buffer(device, "item_buffer", item_capacity);

        let overlay_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay_buffer"),
            size: (MAX_HIGHLIGHT_EDGES * 2 * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        tracing::debug!(?surface_format, width, height, "wgpu renderer created");

        Self {
            box_pipeline,
            grid_pipeline,
            overlay_pipeline,
            uniform_buffer,
            uniform_bind_group,
            box_vertex_buffer,
            box_index_buffer,
            box_index_count: box_indices.len() as u32,
            grid_vertex_buffer,
            grid_vertex_count: grid_verts.len() as u32,
            pools: HashMap::new(),
            item_buffer,
            item_capacity,
            overlay_buffer,
            depth_texture: create_depth_texture(device, width, height),
            surface_format,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = create_depth_texture(device, width, height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Number of pools with a live GPU buffer.
    pub fn pool_buffer_count(&self) -> usize {
        self.pools.len()
    }

    /// Bind this renderer to one surface texture for a single frame.
    pub fn target<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        view: &'a wgpu::TextureView,
    ) -> WgpuTarget<'a> {
        WgpuTarget {
            renderer: self,
            device,
            queue,
            view,
        }
    }

    /// Create or refresh GPU buffers for every pool in the frame.
    /// Returns the number of buffers written.
    fn sync_pools(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &Frame<'_>) -> u32 {
        self.pools.retain(|name, _| frame.pools.get(name).is_some());

        let mut uploads = 0;
        for (name, pool) in frame.pools.iter() {
            let known = self
                .pools
                .get(name)
                .is_some_and(|gpu| gpu.capacity == pool.capacity());
            if !known {
                let buffer = instance_buffer(device, name, pool.capacity());
                self.pools.insert(
                    name.to_owned(),
                    PoolBuffer {
                        buffer,
                        capacity: pool.capacity(),
                        draw_count: 0,
                    },
                );
            } else if !frame.is_dirty(name) {
                continue;
            }
            if let Some(gpu) = self.pools.get_mut(name) {
                let data = pool_instances(pool);
                if !data.is_empty() {
                    queue.write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(&data));
                }
                gpu.draw_count = data.len() as u32;
                uploads += 1;
            }
        }
        uploads
    }

    fn sync_items(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, items: &[DrawItem]) -> u32 {
        let data = item_instances(items);
        if data.len() as u32 > self.item_capacity {
            self.item_capacity = (data.len() as u32).next_power_of_two();
            self.item_buffer = instance_buffer(device, "item_buffer", self.item_capacity);
        }
        if !data.is_empty() {
            queue.write_buffer(&self.item_buffer, 0, bytemuck::cast_slice(&data));
        }
        data.len() as u32
    }

    /// Render one frame: grid floor, pools, loose items, selection wireframe.
    pub fn render_to(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        frame: &Frame<'_>,
    ) -> FrameStats {
        let clear = frame.background.clear_color();
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: frame.view.view_proj.to_cols_array_2d(),
                eye: frame.view.eye.extend(1.0).to_array(),
                fog_color: clear,
            }),
        );

        let mut stats = FrameStats {
            uploads: self.sync_pools(device, queue, frame),
            ..FrameStats::default()
        };
        let item_count = self.sync_items(device, queue, frame.items);

        let overlay = wireframe_vertices(frame.highlight);
        if !overlay.is_empty() {
            queue.write_buffer(&self.overlay_buffer, 0, bytemuck::cast_slice(&overlay));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: clear[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            pass.set_pipeline(&self.grid_pipeline);
            pass.set_vertex_buffer(0, self.grid_vertex_buffer.slice(..));
            pass.draw(0..self.grid_vertex_count, 0..1);
            stats.draw_calls += 1;

            pass.set_pipeline(&self.box_pipeline);
            pass.set_vertex_buffer(0, self.box_vertex_buffer.slice(..));
            pass.set_index_buffer(self.box_index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            // One instanced draw per pool, covering every slot ever used.
            for gpu in self.pools.values().filter(|gpu| gpu.draw_count > 0) {
                pass.set_vertex_buffer(1, gpu.buffer.slice(..));
                pass.draw_indexed(0..self.box_index_count, 0, 0..gpu.draw_count);
                stats.draw_calls += 1;
                stats.instances += gpu.draw_count;
            }

            if item_count > 0 {
                pass.set_vertex_buffer(1, self.item_buffer.slice(..));
                pass.draw_indexed(0..self.box_index_count, 0, 0..item_count);
                stats.draw_calls += 1;
                stats.instances += item_count;
            }

            if !overlay.is_empty() {
                pass.set_pipeline(&self.overlay_pipeline);
                pass.set_vertex_buffer(0, self.overlay_buffer.slice(..));
                pass.draw(0..overlay.len() as u32, 0..1);
                stats.draw_calls += 1;
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(
            uploads = stats.uploads,
            draw_calls = stats.draw_calls,
            instances = stats.instances,
            "wgpu frame"
        );
        stats
    }
}

/// A [`WgpuRenderer`] bound to one surface texture, usable as a [`Renderer`].
pub struct WgpuTarget<'a> {
    renderer: &'a mut WgpuRenderer,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    view: &'a wgpu::TextureView,
}

impl Renderer for WgpuTarget<'_> {
    type Output = FrameStats;

    fn render(&mut self, frame: &Frame<'_>) -> FrameStats {
        self.renderer
            .render_to(self.device, self.queue, self.view, frame)
    }
}

fn depth_state(write: bool, compare: wgpu::CompareFunction) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: wgpu::TextureFormat::Depth32Float,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: Default::default(),
        bias: Default::default(),
    }
}

fn line_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
    depth: wgpu::DepthStencilState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_line"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<LineVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x4,
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_line"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineList,
            ..Default::default()
        },
        depth_stencil: Some(depth),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn instance_buffer(device: &wgpu::Device, label: &str, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: capacity.max(1) as u64 * std::mem::size_of::<InstanceData>() as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemuria_assets::RenderableHandle;
    use lemuria_common::{Aabb, ObjectId};

    #[test]
    fn box_mesh_has_six_quads() {
        let (verts, indices) = box_mesh();
        assert_eq!(verts.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < verts.len()));
        for v in &verts {
            assert!(v.position.iter().all(|c| c.abs() == 0.5));
        }
    }

    #[test]
    fn grid_mesh_line_count() {
        let verts = grid_mesh(2, 1.0);
        // 5 offsets, two lines each, two vertices per line
        assert_eq!(verts.len(), 20);
    }

    #[test]
    fn vacant_slots_stay_zero() {
        let geometry = RenderableHandle::placeholder("cone.rwx");
        let mut pool = InstancedObjectPool::new("cone.rwx", geometry, 4).unwrap();
        pool.spawn(ObjectId(1), Mat4::IDENTITY).unwrap();
        pool.spawn(ObjectId(2), Mat4::from_translation(Vec3::X)).unwrap();
        pool.despawn(ObjectId(1)).unwrap();

        let data = pool_instances(&pool);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0], InstanceData::zeroed());
        assert_ne!(data[1], InstanceData::zeroed());
        assert_eq!(data[1].color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn instances_are_fitted_to_bounds() {
        let geometry = RenderableHandle::placeholder("cone.rwx");
        let mut pool = InstancedObjectPool::new("cone.rwx", geometry, 1).unwrap();
        pool.spawn(ObjectId(1), Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        let data = pool_instances(&pool);
        // translation column: instance offset plus the bounds centre
        assert_eq!(data[0].model_3, [10.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn wireframe_is_capped_at_twelve_edges() {
        let edges = Aabb::unit().edges();
        assert_eq!(wireframe_vertices(&edges).len(), 24);
        let doubled: Vec<[Vec3; 2]> = edges.iter().chain(edges.iter()).copied().collect();
        assert_eq!(wireframe_vertices(&doubled).len(), 24);
    }
}
