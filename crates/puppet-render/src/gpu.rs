//! Headless wgpu backend
//!
//! Draws a [`SkeletonMesh`]'s draw list into an offscreen RGBA8 target and
//! reads the pixels back. GPU buffers mirror each slot renderable and are
//! re-uploaded only when its geometry generation changes.

use std::sync::mpsc;

use ahash::AHashMap;
use glam::Vec2;
use wgpu::util::DeviceExt;

use crate::geometry::{SlotRenderable, SlotVertex};
use crate::material::{Material, MaterialKind};
use crate::renderer::SkeletonMesh;
use crate::texture::{TextureHandle, TextureId};
use crate::uniform::{pipeline_key, DrawUniform};
use crate::RenderError;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const COMMON_WGSL: &str = include_str!("../assets/shaders/common.wgsl");
const BASIC_WGSL: &str = include_str!("../assets/shaders/basic.wgsl");
const MASK_WGSL: &str = include_str!("../assets/shaders/mask_recolor.wgsl");
const HUE_WGSL: &str = include_str!("../assets/shaders/hue_recolor.wgsl");

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// GPU mirror of one slot renderable.
struct GpuSlot {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    uniform: wgpu::Buffer,
    uniform_group: wgpu::BindGroup,
    generation: u64,
    index_count: u32,
}

struct DrawCall {
    slot: String,
    pipeline: (MaterialKind, bool),
    textures: (TextureId, Option<TextureId>),
}

pub struct GpuRenderer {
    _instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    padded_row: u32,
    width: u32,
    height: u32,
    sampler: wgpu::Sampler,
    texture_layout: wgpu::BindGroupLayout,
    mask_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    pipelines: AHashMap<(MaterialKind, bool), wgpu::RenderPipeline>,
    textures: AHashMap<TextureId, GpuTexture>,
    texture_groups: AHashMap<(TextureId, Option<TextureId>), wgpu::BindGroup>,
    slots: AHashMap<String, GpuSlot>,
    view: [f32; 4],
    pub clear_color: wgpu::Color,
}

impl GpuRenderer {
    /// Create a headless renderer with a `width` x `height` target.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        log::info!("Initializing offscreen slot renderer ({}x{})", width, height);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("puppet_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            trace: wgpu::Trace::Off,
        }))?;

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("slot_render_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        // Rows in a texture-to-buffer copy must be 256-byte aligned
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = (width * 4).div_ceil(align) * align;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("slot_readback_buffer"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slot_texture_layout"),
            entries: &[texture_entry(0), sampler_entry],
        });
        let mask_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slot_mask_texture_layout"),
            entries: &[texture_entry(0), sampler_entry, texture_entry(2)],
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slot_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut renderer = Self {
            _instance: instance,
            device,
            queue,
            target,
            target_view,
            readback,
            padded_row,
            width,
            height,
            sampler,
            texture_layout,
            mask_layout,
            uniform_layout,
            pipelines: AHashMap::new(),
            textures: AHashMap::new(),
            texture_groups: AHashMap::new(),
            slots: AHashMap::new(),
            view: [1.0, 1.0, 0.0, 0.0],
            clear_color: wgpu::Color::TRANSPARENT,
        };
        for key in [
            (MaterialKind::Basic, true),
            (MaterialKind::Basic, false),
            (MaterialKind::MaskRecolor, true),
            (MaterialKind::MaskRecolor, false),
            (MaterialKind::HueIndexed, true),
        ] {
            let pipeline = renderer.create_pipeline(key);
            renderer.pipelines.insert(key, pipeline);
        }

        log::info!("Offscreen slot renderer initialized");
        Ok(renderer)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Center the view on `center` at `pixels_per_unit` target pixels per
    /// world unit. World y points up.
    pub fn set_view(&mut self, center: Vec2, pixels_per_unit: f32) {
        let sx = 2.0 * pixels_per_unit / self.width as f32;
        let sy = 2.0 * pixels_per_unit / self.height as f32;
        self.view = [sx, sy, -center.x * sx, -center.y * sy];
    }

    fn create_pipeline(&self, (kind, premultiplied): (MaterialKind, bool)) -> wgpu::RenderPipeline {
        let (name, fragment, layout) = match kind {
            MaterialKind::Basic => ("basic", BASIC_WGSL, &self.texture_layout),
            MaterialKind::MaskRecolor => ("mask_recolor", MASK_WGSL, &self.mask_layout),
            MaterialKind::HueIndexed => ("hue_recolor", HUE_WGSL, &self.texture_layout),
        };
        let source = format!("{COMMON_WGSL}\n{fragment}");
        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("slot_pipeline_layout"),
            bind_group_layouts: &[layout, &self.uniform_layout],
            push_constant_ranges: &[],
        });

        let blend = if premultiplied {
            wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING
        } else {
            wgpu::BlendState::ALPHA_BLENDING
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(name),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[SlotVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Flipped bones mirror winding
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    fn upload_texture(&mut self, texture: &TextureHandle) -> bool {
        if self.textures.contains_key(&texture.id()) {
            return true;
        }
        let Some(pixels) = texture.pixels() else {
            log::warn!("Texture '{}' has no pixel data, skipping", texture.name());
            return false;
        };
        let size = wgpu::Extent3d {
            width: texture.width(),
            height: texture.height(),
            depth_or_array_layers: 1,
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(texture.name()),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texture.width() * 4),
                rows_per_image: Some(texture.height()),
            },
            size,
        );
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("Uploaded texture '{}' ({}x{})", texture.name(), texture.width(), texture.height());
        self.textures.insert(
            texture.id(),
            GpuTexture {
                _texture: gpu_texture,
                view,
            },
        );
        true
    }

    fn ensure_texture_group(
        &mut self,
        base: &TextureHandle,
        mask: Option<&TextureHandle>,
    ) -> Option<(TextureId, Option<TextureId>)> {
        if !self.upload_texture(base) {
            return None;
        }
        if let Some(mask) = mask {
            if !self.upload_texture(mask) {
                return None;
            }
        }
        let key = (base.id(), mask.map(|m| m.id()));
        if self.texture_groups.contains_key(&key) {
            return Some(key);
        }
        let base_view = &self.textures.get(&key.0)?.view;
        let group = match key.1 {
            None => self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("slot_texture_group"),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(base_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            }),
            Some(mask_id) => {
                let mask_view = &self.textures.get(&mask_id)?.view;
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("slot_mask_texture_group"),
                    layout: &self.mask_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(base_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(mask_view),
                        },
                    ],
                })
            }
        };
        self.texture_groups.insert(key, group);
        Some(key)
    }

    /// Create or refresh the GPU buffers for one renderable.
    fn sync_slot(&mut self, renderable: &SlotRenderable, uniform: &DrawUniform) {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(renderable.vertices());
        // Buffer writes must be 4-byte multiples
        let mut indices = renderable.indices().to_vec();
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);

        let stale = match self.slots.get(renderable.slot_name()) {
            None => true,
            Some(slot) => {
                slot.vertices.size() < vertex_bytes.len() as u64
                    || slot.indices.size() < index_bytes.len() as u64
            }
        };
        if stale {
            let capacity = |len: usize| (len.max(64) as u64).next_power_of_two();
            let vertices = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("slot_vertex_buffer"),
                size: capacity(vertex_bytes.len()),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let indices = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("slot_index_buffer"),
                size: capacity(index_bytes.len()),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("slot_uniform_buffer"),
                contents: bytemuck::cast_slice(&[*uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("slot_uniform_group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            log::debug!(
                "Allocated GPU buffers for slot '{}' ({} vertex bytes)",
                renderable.slot_name(),
                vertices.size()
            );
            self.slots.insert(
                renderable.slot_name().to_string(),
                GpuSlot {
                    vertices,
                    indices,
                    uniform: uniform_buffer,
                    uniform_group,
                    generation: u64::MAX,
                    index_count: 0,
                },
            );
        }

        let Some(slot) = self.slots.get_mut(renderable.slot_name()) else {
            return;
        };
        if slot.generation != renderable.generation() {
            self.queue.write_buffer(&slot.vertices, 0, vertex_bytes);
            self.queue.write_buffer(&slot.indices, 0, index_bytes);
            slot.generation = renderable.generation();
            slot.index_count = renderable.index_count() as u32;
        }
        self.queue
            .write_buffer(&slot.uniform, 0, bytemuck::cast_slice(&[*uniform]));
    }

    /// Draw the mesh's visible slots in paint order. Returns the draw count.
    pub fn render(&mut self, mesh: &SkeletonMesh) -> Result<usize, RenderError> {
        let mut calls = Vec::new();
        for renderable in mesh.draw_list() {
            let Some(handle) = renderable.material() else {
                continue;
            };
            if renderable.index_count() == 0 {
                continue;
            }
            let material = handle.borrow();
            let mask = match &*material {
                Material::MaskRecolor(m) => Some(m.mask().clone()),
                _ => None,
            };
            let Some(textures) = self.ensure_texture_group(material.texture(), mask.as_ref()) else {
                continue;
            };
            let uniform = DrawUniform::new(&material, renderable.tint, self.view);
            self.sync_slot(renderable, &uniform);
            calls.push(DrawCall {
                slot: renderable.slot_name().to_string(),
                pipeline: pipeline_key(&material),
                textures,
            });
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slot_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("slot_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            for call in &calls {
                let (Some(pipeline), Some(group), Some(slot)) = (
                    self.pipelines.get(&call.pipeline),
                    self.texture_groups.get(&call.textures),
                    self.slots.get(&call.slot),
                ) else {
                    log::warn!("Missing GPU state for slot '{}', skipping draw", call.slot);
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, group, &[]);
                pass.set_bind_group(1, &slot.uniform_group, &[]);
                pass.set_vertex_buffer(0, slot.vertices.slice(..));
                pass.set_index_buffer(slot.indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..slot.index_count, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(calls.len())
    }

    /// Copy the target back to the CPU as tightly packed RGBA8 rows.
    pub fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slot_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.target.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = self.readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        receiver
            .try_recv()
            .map_err(|_| RenderError::ReadbackPending)??;

        let row = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row * self.height as usize);
        {
            let data = slice.get_mapped_range();
            for chunk in data.chunks(self.padded_row as usize) {
                pixels.extend_from_slice(&chunk[..row]);
            }
        }
        self.readback.unmap();
        Ok(pixels)
    }
}
