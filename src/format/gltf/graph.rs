use std::collections::{HashMap, HashSet, VecDeque};

use glam::{DMat4, DQuat, DVec3};

use crate::conversion::{names::UniqueNames, GraphEdge, SceneGraph, DEFAULT_BASE_FRAME};

use super::{
    error::{Error, Result},
    internal::{GltfNode, GltfScene},
};

/// Reorders a glTF quaternion, stored as (x, y, z, w), into (w, x, y, z).
pub fn xyzw_to_wxyz(q: [f64; 4]) -> [f64; 4] {
    [q[3], q[0], q[1], q[2]]
}

/// Returns the rotation matrix of a (w, x, y, z) quaternion, which doesn't need to be
/// normalized. A quaternion of zero length is the identity.
pub fn rotation_matrix(wxyz: [f64; 4]) -> DMat4 {
    let [w, x, y, z] = wxyz;
    let q = DQuat::from_xyzw(x, y, z, w);
    if q.length_squared() < 1e-24 {
        return DMat4::IDENTITY;
    }
    DMat4::from_quat(q.normalize())
}

/// Returns the local transform of a node, `matrix · T · R · S`, where every missing factor
/// is the identity.
pub fn node_matrix(node: &GltfNode) -> DMat4 {
    let mut matrix = node
        .matrix
        .map(|m| DMat4::from_cols_array(&m))
        .unwrap_or(DMat4::IDENTITY);

    if let Some(translation) = node.translation {
        matrix = matrix * DMat4::from_translation(DVec3::from(translation));
    }
    if let Some(rotation) = node.rotation {
        matrix = matrix * rotation_matrix(xyzw_to_wxyz(rotation));
    }
    if let Some(scale) = node.scale {
        matrix = matrix * DMat4::from_scale(DVec3::from(scale));
    }

    matrix
}

/// Flattens a scene graph into glTF nodes, breadth-first from the base frame.
///
/// Node 0 is the base frame. Every other node is named after the frame it represents, and
/// references the mesh of the geometry attached to it through `meshes`, which maps geometry
/// names to mesh indexes. Frames not connected to the base frame are dropped.
pub fn flatten(graph: &SceneGraph, meshes: &HashMap<String, usize>) -> Vec<GltfNode> {
    let mut nodes = vec![GltfNode {
        name: Some(graph.base_frame.clone()),
        ..Default::default()
    }];
    let mut indexes = HashMap::from([(graph.base_frame.as_str(), 0)]);
    let mut queue = VecDeque::from([graph.base_frame.as_str()]);

    while let Some(frame) = queue.pop_front() {
        let parent = indexes[frame];
        for edge in graph.children(frame) {
            if indexes.contains_key(edge.frame_to.as_str()) {
                continue;
            }

            let index = nodes.len();
            nodes.push(GltfNode {
                name: Some(edge.frame_to.clone()),
                matrix: (edge.matrix != DMat4::IDENTITY).then(|| edge.matrix.to_cols_array()),
                mesh: edge
                    .geometry
                    .as_ref()
                    .and_then(|geometry| meshes.get(geometry).copied()),
                ..Default::default()
            });
            nodes[parent]
                .children
                .get_or_insert_with(Vec::new)
                .push(index);

            indexes.insert(&edge.frame_to, index);
            queue.push_back(&edge.frame_to);
        }
    }

    nodes
}

/// The transform hierarchy reconstructed from glTF nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub edges: Vec<GraphEdge>,
    pub base_frame: String,
}

/// Reconstructs the transform hierarchy of glTF nodes, breadth-first from the roots of the
/// selected scene.
///
/// `mesh_geometries` holds the names of the geometry created for each mesh. Every instance of
/// a geometry gets its own frame under the frame of the node that references it.
pub fn reconstruct(
    nodes: &[GltfNode],
    scenes: &[GltfScene],
    scene: Option<usize>,
    mesh_geometries: &[Vec<String>],
) -> Result<Hierarchy> {
    let mut names = UniqueNames::new();
    let node_names: Vec<_> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| match &node.name {
            Some(name) => names.claim(name),
            None => names.claim(&i.to_string()),
        })
        .collect();
    let base_frame = names.claim(DEFAULT_BASE_FRAME);

    let node_at = |index: usize| {
        nodes
            .get(index)
            .ok_or_else(|| Error::format(format!("node {} does not exist", index)))
    };

    let roots = match scenes {
        [] => orphans(nodes)?,
        scenes => {
            let index = scene.unwrap_or(0);
            scenes
                .get(index)
                .ok_or_else(|| Error::format(format!("scene {} does not exist", index)))?
                .nodes
                .clone()
        }
    };

    let mut edges = Vec::new();
    let mut visited = HashSet::new();
    let mut queue: VecDeque<_> = roots
        .into_iter()
        .map(|root| (base_frame.clone(), root))
        .collect();

    while let Some((parent, index)) = queue.pop_front() {
        let node = node_at(index)?;
        if !visited.insert(index) {
            log::debug!("Node {} is referenced more than once, ignoring", index);
            continue;
        }

        let frame = &node_names[index];
        for &child in node.children.iter().flatten() {
            node_at(child)?;
            queue.push_back((frame.clone(), child));
        }

        edges.push(GraphEdge::new(&parent, frame, node_matrix(node)));

        if let Some(mesh) = node.mesh {
            let geometries = mesh_geometries
                .get(mesh)
                .ok_or_else(|| Error::format(format!("mesh {} does not exist", mesh)))?;
            for geometry in geometries {
                let instance = names.claim_suffixed(geometry);
                edges.push(GraphEdge::new(frame, &instance, DMat4::IDENTITY).with_geometry(geometry));
            }
        }
    }

    Ok(Hierarchy { edges, base_frame })
}

/// Returns the nodes that aren't the child of any node.
fn orphans(nodes: &[GltfNode]) -> Result<Vec<usize>> {
    let mut children = HashSet::new();
    for node in nodes {
        for &child in node.children.iter().flatten() {
            if child >= nodes.len() {
                return Err(Error::format(format!("node {} does not exist", child)));
            }
            children.insert(child);
        }
    }
    Ok((0..nodes.len()).filter(|i| !children.contains(i)).collect())
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use pretty_assertions::assert_eq;

    use super::*;

    fn node(name: &str, children: &[usize]) -> GltfNode {
        GltfNode {
            name: Some(name.to_string()),
            children: (!children.is_empty()).then(|| children.to_vec()),
            ..Default::default()
        }
    }

    #[test]
    fn quaternion_order() {
        let q = [0.1, 0.2, 0.3, 0.9];
        assert_eq!([0.9, 0.1, 0.2, 0.3], xyzw_to_wxyz(q));
    }

    #[test]
    fn quarter_turn() {
        let node = GltfNode {
            rotation: Some([0., 0., 0.7071, 0.7071]),
            ..Default::default()
        };

        let expected = DMat4::from_rotation_z(FRAC_PI_2);
        assert!(node_matrix(&node).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn degenerate_rotation() {
        assert_eq!(DMat4::IDENTITY, rotation_matrix([0.; 4]));
    }

    #[test]
    fn composition_order() {
        let node = GltfNode {
            matrix: Some(DMat4::from_translation(DVec3::new(0., 0., 5.)).to_cols_array()),
            translation: Some([1., 0., 0.]),
            rotation: Some([0., 0., 0.7071068, 0.7071068]),
            scale: Some([2., 2., 2.]),
            ..Default::default()
        };

        let point = node_matrix(&node).transform_point3(DVec3::X);

        // Scaled to (2, 0, 0), rotated to (0, 2, 0), then translated twice.
        assert!(point.abs_diff_eq(DVec3::new(1., 2., 5.), 1e-6));
    }

    #[test]
    fn flatten_breadth_first() {
        let translation = DMat4::from_translation(DVec3::new(1., 2., 3.));
        let graph = SceneGraph {
            base_frame: "world".to_string(),
            edges: vec![
                GraphEdge::new("arm", "hand", DMat4::IDENTITY).with_geometry("cube"),
                GraphEdge::new("world", "arm", translation),
                GraphEdge::new("world", "leg", DMat4::IDENTITY),
                GraphEdge::new("nowhere", "lost", DMat4::IDENTITY),
            ],
        };
        let meshes = HashMap::from([("cube".to_string(), 0)]);

        let nodes = flatten(&graph, &meshes);

        let names: Vec<_> = nodes.iter().map(|n| n.name.as_deref().unwrap()).collect();
        assert_eq!(vec!["world", "arm", "leg", "hand"], names);
        assert_eq!(Some(vec![1, 2]), nodes[0].children);
        assert_eq!(Some(vec![3]), nodes[1].children);
        assert_eq!(Some(translation.to_cols_array()), nodes[1].matrix);
        assert_eq!(None, nodes[2].matrix);
        assert_eq!(Some(0), nodes[3].mesh);
        assert_eq!(None, nodes[1].mesh);
    }

    #[test]
    fn reconstruct_scene() {
        let mut nodes = vec![node("arm", &[1]), node("hand", &[])];
        nodes[0].translation = Some([1., 0., 0.]);
        nodes[1].mesh = Some(0);
        let scenes = vec![GltfScene {
            name: None,
            nodes: vec![0],
        }];
        let geometries = vec![vec!["cube".to_string()]];

        let hierarchy = reconstruct(&nodes, &scenes, None, &geometries).unwrap();

        assert_eq!("world", hierarchy.base_frame);
        assert_eq!(3, hierarchy.edges.len());
        assert_eq!(
            GraphEdge::new("world", "arm", DMat4::from_translation(DVec3::X)),
            hierarchy.edges[0]
        );
        assert_eq!(GraphEdge::new("arm", "hand", DMat4::IDENTITY), hierarchy.edges[1]);

        let instance = &hierarchy.edges[2];
        assert_eq!("hand", instance.frame_from);
        assert!(instance.frame_to.starts_with("cube_"));
        assert_eq!("cube_".len() + 6, instance.frame_to.len());
        assert_eq!(Some("cube".to_string()), instance.geometry);
    }

    #[test]
    fn default_and_colliding_names() {
        let nodes = vec![
            node("world", &[]),
            GltfNode::default(),
            node("world", &[]),
        ];

        let hierarchy = reconstruct(&nodes, &[], None, &[]).unwrap();
        let frames: Vec<_> = hierarchy.edges.iter().map(|e| e.frame_to.as_str()).collect();

        assert_eq!("world", frames[0]);
        assert_eq!("1", frames[1]);
        assert!(frames[2].starts_with("world_"));
        assert!(hierarchy.base_frame.starts_with("world_"));
        assert_ne!(frames[2], hierarchy.base_frame);
    }

    #[test]
    fn roots_without_scenes() {
        let nodes = vec![node("child", &[]), node("parent", &[0]), node("alone", &[])];

        let hierarchy = reconstruct(&nodes, &[], None, &[]).unwrap();
        let edges: Vec<_> = hierarchy
            .edges
            .iter()
            .map(|e| (e.frame_from.as_str(), e.frame_to.as_str()))
            .collect();

        assert_eq!(
            vec![("world", "parent"), ("world", "alone"), ("parent", "child")],
            edges
        );
    }

    #[test]
    fn cycles_are_ignored() {
        let nodes = vec![node("a", &[1]), node("b", &[0])];
        let scenes = vec![GltfScene {
            name: None,
            nodes: vec![0],
        }];

        let hierarchy = reconstruct(&nodes, &scenes, Some(0), &[]).unwrap();
        assert_eq!(2, hierarchy.edges.len());
    }

    #[test]
    fn dangling_references() {
        let scenes = vec![GltfScene {
            name: None,
            nodes: vec![0],
        }];

        let missing_child = vec![node("a", &[7])];
        assert!(matches!(
            reconstruct(&missing_child, &scenes, None, &[]),
            Err(Error::Format(_))
        ));

        let missing_mesh = vec![GltfNode {
            mesh: Some(3),
            ..Default::default()
        }];
        assert!(matches!(
            reconstruct(&missing_mesh, &scenes, None, &[]),
            Err(Error::Format(_))
        ));

        assert!(matches!(
            reconstruct(&[], &scenes, None, &[]),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            reconstruct(&missing_mesh, &scenes, Some(2), &[]),
            Err(Error::Format(_))
        ));
    }
}
