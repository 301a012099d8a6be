use crate::conversion::Camera;

use super::internal::{GltfCamera, GltfPerspective};

/// Converts a camera into a glTF perspective camera.
pub fn convert_camera(camera: &Camera) -> GltfCamera {
    let [fov_x, fov_y] = camera.fov;
    GltfCamera {
        name: Some(camera.name.clone()),
        type_: "perspective".to_string(),
        perspective: Some(GltfPerspective {
            aspect_ratio: Some(fov_x / fov_y),
            yfov: fov_y.to_radians(),
            zfar: None,
            znear: camera.z_near,
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn perspective() {
        let camera = Camera {
            name: "eye".to_string(),
            fov: [90., 45.],
            z_near: 0.5,
        };

        let json = serde_json::to_value(convert_camera(&camera)).unwrap();

        assert_eq!(
            serde_json::json!({
                "name": "eye",
                "type": "perspective",
                "perspective": {
                    "aspectRatio": 2.0,
                    "yfov": 45f64.to_radians(),
                    "znear": 0.5,
                },
            }),
            json
        );
    }
}
