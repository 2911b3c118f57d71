use crate::device::{BaseKind, BufferKind, GraphicsDevice, VertexAttribute};
use crate::shader::Shader;
use crate::uniforms::{ATTR_NORMAL, ATTR_POSITION, ATTR_TEX_COORDS};
use bytemuck::{Pod, Zeroable};
use lumen_common::{BufferHandle, ProgramHandle, VertexArrayHandle};
use slotmap::{SlotMap, new_key_type};
use std::collections::HashSet;
use std::mem::{offset_of, size_of};

/// Interleaved vertex: position, normal, texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = size_of::<Vertex>() as u32;

    /// Geometry attribute names with their component counts and byte offsets.
    pub const LAYOUT: [(&'static str, u32, u32); 3] = [
        (ATTR_POSITION, 3, offset_of!(Vertex, position) as u32),
        (ATTR_NORMAL, 3, offset_of!(Vertex, normal) as u32),
        (ATTR_TEX_COORDS, 2, offset_of!(Vertex, tex_coords) as u32),
    ];

    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }
}

/// Indexed triangle geometry resident on the GPU.
///
/// Attribute pointers are configured lazily, once per program that draws
/// the mesh. Release it with [`Mesh::release`]; dropping it unreleased leaks
/// the buffers and logs a warning.
#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_array: VertexArrayHandle,
    vertex_count: u32,
    index_count: u32,
    configured: HashSet<ProgramHandle>,
    released: bool,
}

impl Mesh {
    /// Upload `vertices` and `indices` immediately.
    pub fn new(device: &mut dyn GraphicsDevice, vertices: &[Vertex], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(vertices));
        let index_buffer = device.create_buffer(BufferKind::Index, bytemuck::cast_slice(indices));
        let vertex_array = device.create_vertex_array(vertex_buffer, index_buffer);
        tracing::debug!(
            %vertex_array,
            vertices = vertices.len(),
            indices = indices.len(),
            "mesh uploaded"
        );
        Self {
            vertex_buffer,
            index_buffer,
            vertex_array,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            configured: HashSet::new(),
            released: false,
        }
    }

    /// Vertices uploaded at construction.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Indices per draw; three per triangle.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array
    }

    /// Whether attribute pointers are already bound for `program`.
    pub fn is_configured_for(&self, program: ProgramHandle) -> bool {
        self.configured.contains(&program)
    }

    /// Draw with `shader`, binding attribute pointers on first use.
    ///
    /// `shader` must already be the current program; [`crate::Material::bind`]
    /// or [`Shader::bind`] makes it so.
    pub fn draw(&mut self, device: &mut dyn GraphicsDevice, shader: &Shader) {
        let program = shader.program();
        if self.configured.insert(program) {
            let attributes: Vec<VertexAttribute> = Vertex::LAYOUT
                .iter()
                .filter_map(|&(name, components, offset)| {
                    shader.attribute(name).map(|info| VertexAttribute {
                        location: info.location,
                        components,
                        kind: BaseKind::Float,
                        offset,
                    })
                })
                .collect();
            tracing::debug!(
                vertex_array = %self.vertex_array,
                shader = shader.label(),
                bound = attributes.len(),
                "configuring vertex layout"
            );
            device.configure_vertex_layout(self.vertex_array, program, &attributes, Vertex::STRIDE);
        }

        if self.index_count == 0 {
            return;
        }
        device.draw_indexed(self.vertex_array, self.index_count);
    }

    /// Delete the GPU buffers and vertex array.
    pub fn release(mut self, device: &mut dyn GraphicsDevice) {
        device.delete_vertex_array(self.vertex_array);
        device.delete_buffer(self.vertex_buffer);
        device.delete_buffer(self.index_buffer);
        self.released = true;
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(vertex_array = %self.vertex_array, "mesh dropped without release; GPU buffers leaked");
        }
    }
}

new_key_type! {
    /// Generational key of a mesh in a [`MeshStore`].
    pub struct MeshId;
}

/// Owner of GPU meshes. Scene components refer to meshes by [`MeshId`], so a
/// removed mesh is detected rather than dereferenced.
#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: SlotMap<MeshId, Mesh>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `mesh`; it lives until `remove` or `clear`.
    pub fn insert(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// `None` once the mesh has been removed.
    pub fn get(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id)
    }

    pub fn contains(&self, id: MeshId) -> bool {
        self.meshes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Remove and release one mesh. Returns false for a stale id.
    pub fn remove(&mut self, id: MeshId, device: &mut dyn GraphicsDevice) -> bool {
        match self.meshes.remove(id) {
            Some(mesh) => {
                mesh.release(device);
                true
            }
            None => false,
        }
    }

    /// Release every mesh.
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, mesh) in self.meshes.drain() {
            mesh.release(device);
        }
    }
}
