/// The color of geometry without any color information.
pub const DEFAULT_COLOR: [u8; 4] = [102, 102, 102, 255];

/// Converts an 8-bit RGBA color into floats in `[0, 1]`.
pub fn to_float(color: [u8; 4]) -> [f64; 4] {
    color.map(|channel| channel as f64 / u8::MAX as f64)
}

/// Converts a float RGBA color in `[0, 1]` into 8-bit channels. Out of range values are clamped.
pub fn to_rgba8(color: [f64; 4]) -> [u8; 4] {
    color.map(|channel| (channel.clamp(0., 1.) * u8::MAX as f64).round() as u8)
}

/// Computes per-vertex colors by averaging the colors of the faces around each vertex.
/// Vertices that don't belong to any face get the [`DEFAULT_COLOR`].
pub fn face_to_vertex_colors(
    faces: &[[u32; 3]],
    face_colors: &[[u8; 4]],
    num_vertices: usize,
) -> Vec<[u8; 4]> {
    let mut sums = vec![[0u32; 4]; num_vertices];
    let mut counts = vec![0u32; num_vertices];

    for (face, color) in faces.iter().zip(face_colors) {
        for &vertex in face {
            let vertex = vertex as usize;
            if vertex >= num_vertices {
                continue;
            }
            for (sum, &channel) in sums[vertex].iter_mut().zip(color) {
                *sum += channel as u32;
            }
            counts[vertex] += 1;
        }
    }

    sums.iter()
        .zip(&counts)
        .map(|(sum, &count)| match count {
            0 => DEFAULT_COLOR,
            _ => sum.map(|channel| ((channel as f64 / count as f64).round()) as u8),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn float_conversion() {
        assert_eq!([1., 0., 0.2, 1.], to_float([255, 0, 51, 255]));
        assert_eq!([255, 0, 51, 255], to_rgba8([1., -1., 0.2, 3.]));
    }

    #[test]
    fn averaged_faces() {
        let faces = [[0, 1, 2], [2, 1, 3]];
        let colors = [[255, 0, 0, 255], [0, 0, 255, 255]];

        let actual = face_to_vertex_colors(&faces, &colors, 5);

        assert_eq!(
            vec![
                [255, 0, 0, 255],
                [128, 0, 128, 255],
                [128, 0, 128, 255],
                [0, 0, 255, 255],
                DEFAULT_COLOR,
            ],
            actual
        );
    }
}
