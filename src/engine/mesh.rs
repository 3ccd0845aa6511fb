use nalgebra::Vector3;

use crate::sim::assets::AssetError;

/// Floats per vertex: position, color, texture coordinate.
pub const VERTEX_STRIDE: usize = 8;

pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
}

impl Mesh {
    /// Unit cube centered on the origin. Faces are shaded by a fixed
    /// brightness so boxes read as solid without lighting.
    pub fn cube(r: f32, g: f32, b: f32) -> Self {
        let s = 0.5;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        let mut add_face = |corners: [[f32; 3]; 4], brightness: f32| {
            let base = (vertices.len() / VERTEX_STRIDE) as u16;
            let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
            for (corner, uv) in corners.iter().zip(uvs.iter()) {
                vertices.extend_from_slice(&[
                    corner[0], corner[1], corner[2],
                    r * brightness, g * brightness, b * brightness,
                    uv[0], uv[1],
                ]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        };

        add_face([[-s, -s, s], [s, -s, s], [s, s, s], [-s, s, s]], 0.9);
        add_face([[s, -s, -s], [-s, -s, -s], [-s, s, -s], [s, s, -s]], 0.7);
        add_face([[-s, s, s], [s, s, s], [s, s, -s], [-s, s, -s]], 1.0);
        add_face([[-s, -s, -s], [s, -s, -s], [s, -s, s], [-s, -s, s]], 0.4);
        add_face([[s, -s, s], [s, -s, -s], [s, s, -s], [s, s, s]], 0.8);
        add_face([[-s, -s, -s], [-s, -s, s], [-s, s, s], [-s, s, -s]], 0.6);

        Mesh { vertices, indices }
    }

    /// Parses a binary glTF. Every primitive of every mesh is merged into one
    /// indexed vertex list; vertex colors default to white.
    pub fn from_gltf(path: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let parse_error = |reason: String| AssetError::Parse { path: path.to_string(), reason };
        let (document, buffers, _) = gltf::import_slice(bytes).map_err(|e| parse_error(e.to_string()))?;

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

                let positions: Vec<[f32; 3]> = match reader.read_positions() {
                    Some(iter) => iter.collect(),
                    None => continue,
                };
                let colors: Vec<[f32; 3]> = match reader.read_colors(0) {
                    Some(iter) => iter.into_rgb_f32().collect(),
                    None => vec![[1.0, 1.0, 1.0]; positions.len()],
                };
                let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                    Some(iter) => iter.into_f32().collect(),
                    None => vec![[0.0, 0.0]; positions.len()],
                };

                let base = vertices.len() / VERTEX_STRIDE;
                if base + positions.len() > u16::MAX as usize {
                    return Err(parse_error(format!("more than {} vertices", u16::MAX)));
                }

                for ((pos, color), uv) in positions.iter().zip(colors.iter()).zip(uvs.iter()) {
                    vertices.extend_from_slice(&[
                        pos[0], pos[1], pos[2],
                        color[0], color[1], color[2],
                        uv[0], uv[1],
                    ]);
                }

                match reader.read_indices() {
                    Some(iter) => indices.extend(iter.into_u32().map(|i| (base + i as usize) as u16)),
                    None => indices.extend((0..positions.len()).map(|i| (base + i) as u16)),
                }
            }
        }

        if indices.is_empty() {
            return Err(AssetError::EmptyMesh(path.to_string()));
        }
        Ok(Mesh { vertices, indices })
    }

    /// Smallest and largest vertex position.
    pub fn bounds(&self) -> (Vector3<f32>, Vector3<f32>) {
        let mut min = Vector3::repeat(f32::INFINITY);
        let mut max = Vector3::repeat(f32::NEG_INFINITY);
        for vertex in self.vertices.chunks_exact(VERTEX_STRIDE) {
            let p = Vector3::new(vertex[0], vertex[1], vertex[2]);
            min = min.inf(&p);
            max = max.sup(&p);
        }
        (min, max)
    }

    /// Shifts the vertices so the x/z footprint is centered on the origin.
    /// Heights are left alone.
    pub fn center_footprint(&mut self) {
        let (min, max) = self.bounds();
        let cx = (min.x + max.x) / 2.0;
        let cz = (min.z + max.z) / 2.0;
        for vertex in self.vertices.chunks_exact_mut(VERTEX_STRIDE) {
            vertex[0] -= cx;
            vertex[2] -= cz;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_spans_one_unit() {
        let cube = Mesh::cube(1.0, 0.0, 0.0);
        assert_eq!(cube.vertices.len(), 24 * VERTEX_STRIDE);
        assert_eq!(cube.indices.len(), 36);
        let (min, max) = cube.bounds();
        assert_eq!(min, Vector3::repeat(-0.5));
        assert_eq!(max, Vector3::repeat(0.5));
    }

    #[test]
    fn centering_keeps_heights() {
        let mut cube = Mesh::cube(1.0, 1.0, 1.0);
        for vertex in cube.vertices.chunks_exact_mut(VERTEX_STRIDE) {
            vertex[0] += 3.0;
            vertex[1] += 2.0;
            vertex[2] -= 5.0;
        }
        cube.center_footprint();
        let (min, max) = cube.bounds();
        assert_eq!((min.x, max.x), (-0.5, 0.5));
        assert_eq!((min.z, max.z), (-0.5, 0.5));
        assert_eq!((min.y, max.y), (1.5, 2.5));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        match Mesh::from_gltf("models/bus.glb", b"not a model") {
            Err(AssetError::Parse { path, .. }) => assert_eq!(path, "models/bus.glb"),
            other => panic!("unexpected result {:?}", other.map(|mesh| mesh.indices.len())),
        }
    }
}
