use std::{collections::HashMap, sync::Arc};

use glam::{DMat4, Vec2, Vec3};

use super::{color, material::PbrMaterial, names::UniqueNames};

/// The name of the base frame of a new scene.
pub const DEFAULT_BASE_FRAME: &str = "world";

/// Represents a 3D scene comprised of named geometry placed by a transform graph.
/// It's the intermediary format between conversions.
///
/// The geometry uses the right-handed Y-up coordinate system of glTF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// The geometry of the scene, by name, in insertion order.
    pub geometry: Vec<(String, Geometry)>,
    pub graph: SceneGraph,
    pub camera: Camera,
}

impl Scene {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds geometry to the scene, placed directly under the base frame by `matrix`.
    ///
    /// Returns the name of the geometry, which gets a random suffix if `name` is taken.
    pub fn add_geometry(
        &mut self,
        name: &str,
        geometry: impl Into<Geometry>,
        matrix: DMat4,
    ) -> String {
        let name = self.geometry_names().claim(name);
        let frame = UniqueNames::from_iter(self.graph.frames()).claim(&name);

        self.geometry.push((name.clone(), geometry.into()));
        self.graph.edges.push(GraphEdge {
            frame_from: self.graph.base_frame.clone(),
            frame_to: frame,
            matrix,
            geometry: Some(name.clone()),
        });
        name
    }

    /// Merges two scenes. The base frame of `other` becomes the base frame of `self`, and its
    /// geometry and frames are renamed where they would collide.
    pub fn merge(mut self, other: Scene) -> Scene {
        let mut names = self.geometry_names();
        let geometry_names: HashMap<_, _> = other
            .geometry
            .iter()
            .map(|(name, _)| (name.clone(), names.claim(name)))
            .collect();

        let mut frames = UniqueNames::from_iter(self.graph.frames());

        let mut frame_names = HashMap::new();
        frame_names.insert(other.graph.base_frame.clone(), self.graph.base_frame.clone());
        let mut rename_frame = |frame: &str| {
            frame_names
                .entry(frame.to_string())
                .or_insert_with(|| frames.claim(frame))
                .clone()
        };

        for edge in other.graph.edges {
            self.graph.edges.push(GraphEdge {
                frame_from: rename_frame(&edge.frame_from),
                frame_to: rename_frame(&edge.frame_to),
                matrix: edge.matrix,
                geometry: edge
                    .geometry
                    .map(|name| geometry_names.get(&name).cloned().unwrap_or(name)),
            });
        }
        for (name, geometry) in other.geometry {
            let name = geometry_names.get(&name).cloned().unwrap_or(name);
            self.geometry.push((name, geometry));
        }

        self
    }

    fn geometry_names(&self) -> UniqueNames {
        self.geometry.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// A directed graph of named frames. Each edge places a child frame relative to its parent and
/// may attach geometry to the child.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    /// The frame every other frame is placed relative to.
    pub base_frame: String,
    pub edges: Vec<GraphEdge>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self {
            base_frame: DEFAULT_BASE_FRAME.to_string(),
            edges: Vec::new(),
        }
    }
}

impl SceneGraph {
    /// Returns the edges leaving `frame`, in insertion order.
    pub fn children<'a>(&'a self, frame: &'a str) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges.iter().filter(move |edge| edge.frame_from == frame)
    }

    /// Returns the edge that places `frame`, if any.
    pub fn parent(&self, frame: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|edge| edge.frame_to == frame)
    }

    /// Returns every frame of the graph, starting with the base frame.
    pub fn frames(&self) -> Vec<String> {
        let mut frames = vec![self.base_frame.clone()];
        for edge in &self.edges {
            for frame in [&edge.frame_from, &edge.frame_to] {
                if !frames.contains(frame) {
                    frames.push(frame.clone());
                }
            }
        }
        frames
    }

    /// Returns the transform of `frame` relative to the base frame, or `None` if the frame
    /// isn't connected to it.
    pub fn world_transform(&self, frame: &str) -> Option<DMat4> {
        let mut transform = DMat4::IDENTITY;
        let mut current = frame;
        // Bounded by the number of edges so that cycles can't loop forever.
        for _ in 0..=self.edges.len() {
            if current == self.base_frame {
                return Some(transform);
            }
            let edge = self.parent(current)?;
            transform = edge.matrix * transform;
            current = &edge.frame_from;
        }
        None
    }

    /// Returns the world transform of every instance of the geometry with the given name.
    pub fn instances(&self, geometry: &str) -> Vec<DMat4> {
        self.edges
            .iter()
            .filter(|edge| edge.geometry.as_deref() == Some(geometry))
            .filter_map(|edge| self.world_transform(&edge.frame_to))
            .collect()
    }
}

/// An edge of the [`SceneGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub frame_from: String,
    pub frame_to: String,
    /// The transform of `frame_to` relative to `frame_from`.
    pub matrix: DMat4,
    /// The name of the geometry attached to `frame_to`.
    pub geometry: Option<String>,
}

impl GraphEdge {
    pub fn new(frame_from: &str, frame_to: &str, matrix: DMat4) -> Self {
        Self {
            frame_from: frame_from.to_string(),
            frame_to: frame_to.to_string(),
            matrix,
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: &str) -> Self {
        self.geometry = Some(geometry.to_string());
        self
    }
}

/// A perspective camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: String,
    /// The horizontal and vertical fields of view, in degrees.
    pub fov: [f64; 2],
    /// The distance to the near clipping plane.
    pub z_near: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            name: "camera".to_string(),
            fov: [60., 45.],
            z_near: 0.01,
        }
    }
}

/// Any geometry that can be attached to a frame of the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh(Mesh),
    Path(Path),
}

impl From<Mesh> for Geometry {
    fn from(mesh: Mesh) -> Self {
        Geometry::Mesh(mesh)
    }
}

impl From<Path> for Geometry {
    fn from(path: Path) -> Self {
        Geometry::Path(path)
    }
}

/// Represents a triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    /// The triangles of the mesh, as indexes into `vertices`.
    pub faces: Vec<[u32; 3]>,
    pub visual: Visual,
    /// Explicit vertex normals. When absent, they are computed from the faces if needed.
    pub vertex_normals: Option<Vec<Vec3>>,
    /// The length unit of the vertices, e.g. "meters".
    pub units: Option<String>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            ..Default::default()
        }
    }

    pub fn with_visual(mut self, visual: Visual) -> Self {
        self.visual = visual;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns the minimum and maximum corners of the bounding box of the vertices.
    pub fn bounds(&self) -> Option<[Vec3; 2]> {
        bounds(&self.vertices)
    }

    /// Returns the vertex normals, computing them as the area-weighted average of the normals
    /// of the adjacent faces if they're not set.
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        if let Some(normals) = &self.vertex_normals {
            return normals.clone();
        }

        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for face in &self.faces {
            let cross = self.face_cross(face);
            for &vertex in face {
                if let Some(normal) = normals.get_mut(vertex as usize) {
                    *normal += cross;
                }
            }
        }
        normals.into_iter().map(Vec3::normalize_or_zero).collect()
    }

    /// Returns one color per vertex, if the visual carries colors.
    pub fn vertex_colors(&self) -> Option<Vec<[u8; 4]>> {
        match &self.visual {
            Visual::VertexColor(colors) => Some(colors.clone()),
            Visual::FaceColor(colors) => Some(color::face_to_vertex_colors(
                &self.faces,
                colors,
                self.vertices.len(),
            )),
            _ => None,
        }
    }

    fn face_cross(&self, face: &[u32; 3]) -> Vec3 {
        let vertex = |i: usize| {
            self.vertices
                .get(face[i] as usize)
                .copied()
                .unwrap_or(Vec3::ZERO)
        };
        let (a, b, c) = (vertex(0), vertex(1), vertex(2));
        (b - a).cross(c - a)
    }
}

/// The appearance of a [`Mesh`].
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    None,
    /// One RGBA color per vertex.
    VertexColor(Vec<[u8; 4]>),
    /// One RGBA color per face.
    FaceColor(Vec<[u8; 4]>),
    /// Texture coordinates and a material.
    Textured(TextureVisual),
}

impl Default for Visual {
    fn default() -> Self {
        Visual::None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureVisual {
    /// One texture coordinate per vertex, with the origin at the bottom left of the image.
    pub uv: Option<Vec<Vec2>>,
    pub material: Option<Arc<PbrMaterial>>,
}

/// Represents a set of polylines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub vertices: Vec<Vec3>,
    /// Each polyline is a list of indexes into `vertices`.
    pub polylines: Vec<Vec<usize>>,
    pub units: Option<String>,
}

impl Path {
    pub fn new(vertices: Vec<Vec3>, polylines: Vec<Vec<usize>>) -> Self {
        Self {
            vertices,
            polylines,
            units: None,
        }
    }

    /// Discretizes the polylines into pairs of segment endpoints, as in a line list.
    /// Indexes out of range are skipped.
    pub fn line_segments(&self) -> Vec<Vec3> {
        let mut segments = Vec::new();
        for polyline in &self.polylines {
            let points: Vec<_> = polyline
                .iter()
                .filter_map(|&i| self.vertices.get(i).copied())
                .collect();
            for pair in points.windows(2) {
                segments.extend_from_slice(pair);
            }
        }
        segments
    }
}

/// Returns the minimum and maximum corners of the bounding box of `points`.
pub fn bounds(points: &[Vec3]) -> Option<[Vec3; 2]> {
    let first = *points.first()?;
    Some(
        points
            .iter()
            .fold([first, first], |[min, max], &p| [min.min(p), max.max(p)]),
    )
}
