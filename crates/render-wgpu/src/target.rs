use crate::pipeline::DEPTH_FORMAT;
use lumen_gpu::DeviceError;

/// Where frames are drawn: a window surface or an offscreen texture.
#[derive(Debug)]
pub enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        format: wgpu::TextureFormat,
    },
}

impl RenderTarget {
    pub fn offscreen(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_target"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self::Offscreen { texture, format }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            Self::Surface { config, .. } => config.format,
            Self::Offscreen { format, .. } => *format,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Surface { config, .. } => (config.width, config.height),
            Self::Offscreen { texture, .. } => (texture.width(), texture.height()),
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        match self {
            Self::Surface { surface, config } => {
                config.width = width.max(1);
                config.height = height.max(1);
                surface.configure(device, config);
            }
            Self::Offscreen { .. } => {
                *self = Self::offscreen(device, width, height);
            }
        }
    }

    /// The texture to draw this frame into. A lost or outdated surface is
    /// reconfigured and the frame skipped.
    pub(crate) fn acquire(
        &self,
        device: &wgpu::Device,
    ) -> Result<(Option<wgpu::SurfaceTexture>, wgpu::TextureView), DeviceError> {
        match self {
            Self::Surface { surface, config } => match surface.get_current_texture() {
                Ok(frame) => {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    Ok((Some(frame), view))
                }
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    surface.configure(device, config);
                    Err(DeviceError::Surface("surface lost; reconfigured".into()))
                }
                Err(e) => Err(DeviceError::Surface(e.to_string())),
            },
            Self::Offscreen { texture, .. } => Ok((
                None,
                texture.create_view(&wgpu::TextureViewDescriptor::default()),
            )),
        }
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    }
}

pub(crate) fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}
