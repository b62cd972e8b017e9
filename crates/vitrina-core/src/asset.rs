//! glTF asset parsing into a renderer-agnostic model tree
//!
//! The loader hands raw bytes to [`ModelRoot::from_gltf_slice`], which accepts
//! binary glTF (`.glb`) and self-contained `.gltf` documents whose buffers are
//! embedded as base64 data URIs. Only triangle geometry and base color factors
//! are extracted; textures, skins, and animations are ignored.

use base64::Engine;
use glam::{Mat4, Quat, Vec3};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::LoadError;

/// A parsed model: node hierarchy plus the meshes and materials it references
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRoot {
    pub name: Option<String>,
    /// Flat node arena; `children` and `roots` index into it
    pub nodes: Vec<ModelNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    /// Placement of the whole model in the scene
    pub transform: Mat4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: Option<String>,
    pub local: Mat4,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// Indexed triangle list
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    /// Linear RGBA
    pub base_color: [f32; 4],
}

/// Base color used when a primitive references no material (opaque white, as glTF prescribes)
pub const DEFAULT_BASE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// One primitive positioned in world space
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub world: Mat4,
    pub primitive: &'a Primitive,
    pub base_color: [f32; 4],
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

impl ModelRoot {
    /// Parse a `.glb` or embedded `.gltf` document
    pub fn from_gltf_slice(bytes: &[u8]) -> Result<Self, LoadError> {
        let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| LoadError::Parse(e.to_string()))?;
        let buffers = load_buffers(&gltf)?;

        let scene = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .ok_or_else(|| LoadError::Unsupported("asset contains no scenes".to_string()))?;

        let materials = gltf
            .materials()
            .map(|material| Material {
                name: material.name().map(str::to_string),
                base_color: material.pbr_metallic_roughness().base_color_factor(),
            })
            .collect();

        let mut meshes = Vec::new();
        for mesh in gltf.meshes() {
            let mut primitives = Vec::new();
            for primitive in mesh.primitives() {
                if let Some(parsed) = read_primitive(&primitive, &buffers)? {
                    primitives.push(parsed);
                }
            }
            meshes.push(Mesh {
                name: mesh.name().map(str::to_string),
                primitives,
            });
        }

        let nodes = gltf
            .nodes()
            .map(|node| ModelNode {
                name: node.name().map(str::to_string),
                local: Mat4::from_cols_array_2d(&node.transform().matrix()),
                mesh: node.mesh().map(|mesh| mesh.index()),
                children: node.children().map(|child| child.index()).collect(),
            })
            .collect();

        let model = ModelRoot {
            name: scene.name().map(str::to_string),
            nodes,
            roots: scene.nodes().map(|node| node.index()).collect(),
            meshes,
            materials,
            transform: Mat4::IDENTITY,
        };

        if model.triangle_count() == 0 {
            return Err(LoadError::Unsupported("asset has no triangle geometry".to_string()));
        }

        debug!(
            "Parsed glTF scene {:?}: {} nodes, {} meshes, {} triangles",
            model.name,
            model.nodes.len(),
            model.meshes.len(),
            model.triangle_count()
        );
        Ok(model)
    }

    /// Apply the configured offset and uniform scale to the model root
    pub fn with_placement(mut self, placement: &ModelConfig) -> Self {
        self.transform = Mat4::from_scale_rotation_translation(
            Vec3::splat(placement.scale),
            Quat::IDENTITY,
            Vec3::from_array(placement.offset),
        );
        self
    }

    /// Flatten the hierarchy into world-space draw items
    ///
    /// Nodes reachable twice (malformed graphs) are drawn once.
    pub fn draws(&self) -> Vec<DrawItem<'_>> {
        let mut draws = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self.roots.iter().rev().map(|&i| (i, self.transform)).collect();

        while let Some((index, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(index) else { continue };
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }
            let world = parent * node.local;

            if let Some(mesh) = node.mesh.and_then(|m| self.meshes.get(m)) {
                for primitive in &mesh.primitives {
                    let base_color = primitive
                        .material
                        .and_then(|m| self.materials.get(m))
                        .map(|m| m.base_color)
                        .unwrap_or(DEFAULT_BASE_COLOR);
                    draws.push(DrawItem { world, primitive, base_color });
                }
            }

            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }
        draws
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| &m.primitives)
            .map(|p| p.indices.len() / 3)
            .sum()
    }

    /// World-space bounds of everything drawn
    pub fn bounds(&self) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        for draw in self.draws() {
            for &p in &draw.primitive.positions {
                let point = draw.world.transform_point3(Vec3::from_array(p));
                bounds = Some(match bounds {
                    Some(b) => Aabb { min: b.min.min(point), max: b.max.max(point) },
                    None => Aabb { min: point, max: point },
                });
            }
        }
        bounds
    }
}

fn load_buffers(gltf: &gltf::Gltf) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| LoadError::Parse("GLB binary chunk is missing".to_string()))?,
            gltf::buffer::Source::Uri(uri) => decode_data_uri(uri)?,
        };
        if data.len() < buffer.length() {
            return Err(LoadError::Parse(format!(
                "buffer {} holds {} bytes, expected {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffers.push(data);
    }
    Ok(buffers)
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, LoadError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(LoadError::Unsupported(format!("external buffer '{uri}'")));
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::Parse("malformed data URI".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(LoadError::Unsupported("data URI is not base64".to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| LoadError::Parse(format!("data URI: {e}")))
}

fn read_primitive(primitive: &gltf::Primitive<'_>, buffers: &[Vec<u8>]) -> Result<Option<Primitive>, LoadError> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        warn!("Skipping primitive {} with mode {:?}", primitive.index(), primitive.mode());
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.as_slice()));

    let Some(positions) = reader.read_positions() else {
        warn!("Skipping primitive {} without positions", primitive.index());
        return Ok(None);
    };
    let positions: Vec<[f32; 3]> = positions.collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(LoadError::Parse(format!(
            "index {bad} out of range for {} vertices",
            positions.len()
        )));
    }
    let indices = indices[..indices.len() - indices.len() % 3].to_vec();

    let normals = match reader.read_normals() {
        Some(normals) => {
            let normals: Vec<[f32; 3]> = normals.collect();
            if normals.len() == positions.len() {
                normals
            } else {
                generate_normals(&positions, &indices)
            }
        }
        None => generate_normals(&positions, &indices),
    };

    Ok(Some(Primitive {
        positions,
        normals,
        indices,
        material: primitive.material().index(),
    }))
}

/// Area-weighted vertex normals
fn generate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (pa, pb, pc) = (
            Vec3::from_array(positions[a]),
            Vec3::from_array(positions[b]),
            Vec3::from_array(positions[c]),
        );
        let face = (pb - pa).cross(pc - pa);
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }
    accum
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}
