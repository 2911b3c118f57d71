use crate::pipeline::{self, PipelineKey, RasterState, VertexLayout};
use crate::program::{GpuProgram, GroupEntry};
use crate::target::{RenderTarget, create_depth_texture};
use glam::Vec4;
use lumen_common::{BufferHandle, ProgramHandle, TextureHandle, VertexArrayHandle};
use lumen_gpu::compile::compile_program;
use lumen_gpu::{
    ActiveAttribute, BlendFactor, BufferKind, ColorMask, CullFace, DepthFunc, DeviceError,
    FilterMode, GraphicsDevice, ProgramSource, ShaderError, TextureDesc, UniformValue,
    VertexAttribute, Viewport, WrapMode,
};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Failures while bringing up a device.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

#[derive(Debug, Clone, Copy)]
pub struct WgpuSettings {
    pub power_preference: wgpu::PowerPreference,
    pub present_mode: wgpu::PresentMode,
    /// Initial size in bytes of the per-frame uniform ring. It grows on demand.
    pub uniform_capacity: u64,
}

impl Default for WgpuSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            present_mode: wgpu::PresentMode::AutoVsync,
            uniform_capacity: 64 * 1024,
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct VertexArray {
    vertices: BufferHandle,
    indices: BufferHandle,
    layouts: HashMap<ProgramHandle, VertexLayout>,
}

/// Uniform snapshots for every draw in a frame, uploaded once at frame end
/// and addressed with dynamic offsets.
struct UniformRing {
    buffer: wgpu::Buffer,
    capacity: u64,
    alignment: u64,
    staging: Vec<u8>,
}

impl UniformRing {
    fn new(device: &wgpu::Device, capacity: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        Self {
            buffer: Self::allocate(device, capacity),
            capacity,
            alignment,
            staging: Vec::new(),
        }
    }

    fn allocate(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform_ring"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn push(&mut self, data: &[u8]) -> u32 {
        let offset = (self.staging.len() as u64).next_multiple_of(self.alignment);
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(data);
        offset as u32
    }

    /// Write the staged bytes. Returns true when the buffer had to be
    /// reallocated, which invalidates bind groups referencing it.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let len = (self.staging.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        self.staging.resize(len as usize, 0);
        let grown = len > self.capacity;
        if grown {
            self.capacity = len.next_power_of_two();
            tracing::debug!(capacity = self.capacity, "growing uniform ring");
            self.buffer = Self::allocate(device, self.capacity);
        }
        if len > 0 {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        self.staging.clear();
        grown
    }
}

struct DrawCall {
    pipeline: Arc<wgpu::RenderPipeline>,
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    index_count: u32,
    /// Ring offset per uniform block of the program.
    offsets: Vec<u32>,
    /// Bound texture per texture global of the program; `NONE` for the fallback.
    textures: Vec<TextureHandle>,
}

struct Frame {
    surface_texture: Option<wgpu::SurfaceTexture>,
    view: wgpu::TextureView,
    clear: Vec4,
    draws: Vec<DrawCall>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindGroupKey {
    program: ProgramHandle,
    group: u32,
    textures: Vec<TextureHandle>,
}

/// [`GraphicsDevice`] backed by wgpu.
///
/// The immediate-mode calls are recorded during a frame: each draw captures
/// the current program, its uniform values, bound textures and toggles. The
/// render pass is encoded and submitted in [`GraphicsDevice::end_frame`].
/// Pipelines are created lazily per (program, vertex layout, toggles).
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: RenderTarget,
    depth: wgpu::TextureView,
    next_handle: u32,
    programs: HashMap<ProgramHandle, GpuProgram>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArray>,
    textures: HashMap<TextureHandle, GpuTexture>,
    fallback: GpuTexture,
    units: HashMap<u32, TextureHandle>,
    current: Option<ProgramHandle>,
    raster: RasterState,
    pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
    bind_groups: HashMap<BindGroupKey, Arc<wgpu::BindGroup>>,
    ring: UniformRing,
    frame: Option<Frame>,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: RenderTarget,
        settings: &WgpuSettings,
    ) -> Self {
        let (width, height) = target.size();
        let depth = create_depth_texture(&device, width, height);
        let fallback = upload_texture(&device, &queue, &TextureDesc::solid("white", [255; 4]));
        let ring = UniformRing::new(&device, settings.uniform_capacity);
        Self {
            device,
            queue,
            target,
            depth,
            next_handle: 1,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            fallback,
            units: HashMap::new(),
            current: None,
            raster: RasterState::default(),
            pipelines: HashMap::new(),
            bind_groups: HashMap::new(),
            ring,
            frame: None,
        }
    }

    /// Bring up an adapter and device that can present to `surface`.
    pub fn for_surface(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        settings: &WgpuSettings,
    ) -> Result<Self, SetupError> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: settings.power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(SetupError::NoAdapter)?;
        let (device, queue) = request_device(&adapter)?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .ok_or(SetupError::UnsupportedSurface)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: settings.present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            ?format,
            "GPU initialized"
        );
        Ok(Self::new(
            device,
            queue,
            RenderTarget::Surface { surface, config },
            settings,
        ))
    }

    /// A device rendering into an offscreen texture, for tools and smoke runs.
    pub fn headless(width: u32, height: u32, settings: &WgpuSettings) -> Result<Self, SetupError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: settings.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(SetupError::NoAdapter)?;
        let (device, queue) = request_device(&adapter)?;
        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            width,
            height,
            "headless GPU initialized"
        );
        let target = RenderTarget::offscreen(&device, width, height);
        Ok(Self::new(device, queue, target, settings))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.target.resize(&self.device, width, height);
        let (width, height) = self.target.size();
        self.depth = create_depth_texture(&self.device, width, height);
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Bind groups and dynamic offsets for one recorded draw.
    fn bind_groups_for(&mut self, draw: &DrawCall) -> Option<Vec<(Arc<wgpu::BindGroup>, Vec<u32>)>> {
        let program = self.programs.get(&draw.program)?;
        let mut out = Vec::with_capacity(program.groups.len());
        for (index, group) in program.groups.iter().enumerate() {
            let mut textures = Vec::new();
            let mut offsets = Vec::new();
            for &(_, entry) in &group.entries {
                match entry {
                    GroupEntry::Block(block) => offsets.push(draw.offsets[block]),
                    GroupEntry::Texture(texture) | GroupEntry::Sampler(Some(texture)) => {
                        textures.push(draw.textures[texture])
                    }
                    GroupEntry::Sampler(None) => {}
                }
            }
            let key = BindGroupKey {
                program: draw.program,
                group: index as u32,
                textures,
            };
            let bind_group = match self.bind_groups.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let created = Arc::new(create_bind_group(
                        &self.device,
                        program,
                        index,
                        &self.ring.buffer,
                        &self.textures,
                        &self.fallback,
                        &key.textures,
                    ));
                    self.bind_groups.insert(key, created.clone());
                    created
                }
            };
            out.push((bind_group, offsets));
        }
        Some(out)
    }
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), SetupError> {
    let pair = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("lumen_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
        },
        None,
    ))?;
    Ok(pair)
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, desc: &TextureDesc) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &desc.pixels,
    );
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&desc.label),
        address_mode_u: address_mode(desc.sampler.wrap_u),
        address_mode_v: address_mode(desc.sampler.wrap_v),
        mag_filter: filter_mode(desc.sampler.mag_filter),
        min_filter: filter_mode(desc.sampler.min_filter),
        ..Default::default()
    });
    GpuTexture {
        view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        sampler,
        _texture: texture,
    }
}

fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    program: &GpuProgram,
    group: usize,
    ring: &wgpu::Buffer,
    textures: &HashMap<TextureHandle, GpuTexture>,
    fallback: &GpuTexture,
    bound: &[TextureHandle],
) -> wgpu::BindGroup {
    let layout = &program.groups[group];
    let mut bound = bound.iter();
    let mut next_texture = || {
        bound
            .next()
            .and_then(|handle| textures.get(handle))
            .unwrap_or(fallback)
    };
    let entries: Vec<wgpu::BindGroupEntry> = layout
        .entries
        .iter()
        .map(|&(binding, entry)| {
            let resource = match entry {
                GroupEntry::Block(block) => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: ring,
                    offset: 0,
                    size: NonZeroU64::new(program.blocks[block].size as u64),
                }),
                GroupEntry::Texture(_) => wgpu::BindingResource::TextureView(&next_texture().view),
                GroupEntry::Sampler(Some(_)) => {
                    wgpu::BindingResource::Sampler(&next_texture().sampler)
                }
                GroupEntry::Sampler(None) => wgpu::BindingResource::Sampler(&fallback.sampler),
            };
            wgpu::BindGroupEntry { binding, resource }
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{}_group{group}", program.label)),
        layout: &layout.layout,
        entries: &entries,
    })
}

impl GraphicsDevice for WgpuDevice {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, ShaderError> {
        let compiled = compile_program(source)?;
        let program = GpuProgram::new(&self.device, source, compiled)?;
        let handle = ProgramHandle(self.allocate());
        tracing::info!(program = %source.label, %handle, "program created");
        self.programs.insert(handle, program);
        Ok(handle)
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<ActiveAttribute> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if self.programs.contains_key(&program) {
            self.current = Some(program);
        } else {
            tracing::warn!(%program, "use of unknown program");
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            return;
        }
        self.pipelines.retain(|key, _| key.program != program);
        self.bind_groups.retain(|key, _| key.program != program);
        for vertex_array in self.vertex_arrays.values_mut() {
            vertex_array.layouts.remove(&program);
        }
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.current.and_then(|p| self.programs.get_mut(&p)) {
            Some(program) => program.set_uniform(name, value),
            None => tracing::debug!(uniform = name, "uniform write without a current program"),
        }
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BufferHandle {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(match kind {
                BufferKind::Vertex => "vertex_buffer",
                BufferKind::Index => "index_buffer",
            }),
            contents: data,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        });
        let handle = BufferHandle(self.allocate());
        self.buffers.insert(handle, buffer);
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn create_vertex_array(
        &mut self,
        vertices: BufferHandle,
        indices: BufferHandle,
    ) -> VertexArrayHandle {
        let handle = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(
            handle,
            VertexArray {
                vertices,
                indices,
                layouts: HashMap::new(),
            },
        );
        handle
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn configure_vertex_layout(
        &mut self,
        vertex_array: VertexArrayHandle,
        program: ProgramHandle,
        attributes: &[VertexAttribute],
        stride: u32,
    ) {
        match self.vertex_arrays.get_mut(&vertex_array) {
            Some(va) => {
                va.layouts.insert(
                    program,
                    VertexLayout {
                        stride,
                        attributes: attributes.to_vec(),
                    },
                );
            }
            None => tracing::warn!(%vertex_array, "layout for unknown vertex array"),
        }
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: u32) {
        if self.frame.is_none() {
            tracing::warn!(%vertex_array, "draw outside of a frame ignored");
            return;
        }
        let Some(program_handle) = self.current else {
            tracing::warn!(%vertex_array, "draw without a current program ignored");
            return;
        };
        if self.raster.culls_everything() {
            return;
        }
        let Some(layout) = self
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|va| va.layouts.get(&program_handle))
            .cloned()
        else {
            tracing::warn!(%vertex_array, program = %program_handle, "vertex layout not configured");
            return;
        };
        let Some(program) = self.programs.get(&program_handle) else {
            return;
        };

        let key = PipelineKey {
            program: program_handle,
            layout,
            raster: self.raster,
        };
        let pipeline = match self.pipelines.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                let created = Arc::new(pipeline::create_pipeline(
                    &self.device,
                    program,
                    &key.layout,
                    &key.raster,
                    self.target.format(),
                ));
                self.pipelines.insert(key, created.clone());
                created
            }
        };

        let offsets: Vec<u32> = program
            .blocks
            .iter()
            .map(|block| self.ring.push(&block.data))
            .collect();
        let textures: Vec<TextureHandle> = program
            .textures
            .iter()
            .map(|binding| {
                self.units
                    .get(&binding.unit)
                    .copied()
                    .filter(|handle| self.textures.contains_key(handle))
                    .unwrap_or(TextureHandle::NONE)
            })
            .collect();

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(DrawCall {
                pipeline,
                program: program_handle,
                vertex_array,
                index_count,
                offsets,
                textures,
            });
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError> {
        desc.validate()?;
        let texture = upload_texture(&self.device, &self.queue, desc);
        let handle = TextureHandle(self.allocate());
        tracing::debug!(texture = %desc.label, %handle, width = desc.width, height = desc.height, "texture uploaded");
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.units.insert(unit, texture);
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.units.retain(|_, bound| *bound != texture);
            self.bind_groups.clear();
        }
    }

    fn set_face_culling(&mut self, enabled: bool, face: CullFace) {
        self.raster.face_culling = enabled;
        self.raster.cull_face = face;
    }

    fn set_depth_test(&mut self, enabled: bool, func: DepthFunc) {
        self.raster.depth_test = enabled;
        self.raster.depth_func = func;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.raster.depth_write = enabled;
    }

    fn set_blending(&mut self, enabled: bool, src: BlendFactor, dst: BlendFactor) {
        self.raster.blending = enabled;
        self.raster.blend_src = src;
        self.raster.blend_dst = dst;
    }

    fn set_color_mask(&mut self, mask: ColorMask) {
        self.raster.color_mask = mask;
    }

    fn viewport(&self) -> Viewport {
        let (width, height) = self.target.size();
        Viewport { width, height }
    }

    fn begin_frame(&mut self, clear: Vec4) -> Result<(), DeviceError> {
        if self.frame.take().is_some() {
            tracing::warn!("frame begun while another was open; previous draws dropped");
        }
        let (surface_texture, view) = self.target.acquire(&self.device)?;
        self.ring.staging.clear();
        self.frame = Some(Frame {
            surface_texture,
            view,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        let frame = self.frame.take().ok_or(DeviceError::NoFrame)?;
        if self.ring.upload(&self.device, &self.queue) {
            self.bind_groups.clear();
        }
        let groups: Vec<_> = frame
            .draws
            .iter()
            .map(|draw| self.bind_groups_for(draw))
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: frame.clear.x as f64,
                            g: frame.clear.y as f64,
                            b: frame.clear.z as f64,
                            a: frame.clear.w as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for (draw, groups) in frame.draws.iter().zip(&groups) {
                let Some(groups) = groups else {
                    continue;
                };
                let Some(va) = self.vertex_arrays.get(&draw.vertex_array) else {
                    continue;
                };
                let (Some(vertices), Some(indices)) =
                    (self.buffers.get(&va.vertices), self.buffers.get(&va.indices))
                else {
                    continue;
                };
                pass.set_pipeline(&draw.pipeline);
                for (index, (bind_group, offsets)) in groups.iter().enumerate() {
                    pass.set_bind_group(index as u32, &**bind_group, offsets);
                }
                pass.set_vertex_buffer(0, vertices.slice(..));
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(surface_texture) = frame.surface_texture {
            surface_texture.present();
        }
        tracing::trace!(draws = frame.draws.len(), "frame submitted");
        Ok(())
    }
}
