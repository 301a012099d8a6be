use std::io::Cursor;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use glam::{Vec2, Vec3};

use crate::conversion::color;

use super::{
    error::{Error, Result},
    internal::GltfAccessor,
};

/// The largest array decoded for an accessor that has no buffer view, in bytes.
pub const MAX_ZEROED_BYTES: usize = 1 << 28;

/// The numeric type of each component of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            5120 => Ok(Self::I8),
            5121 => Ok(Self::U8),
            5122 => Ok(Self::I16),
            5123 => Ok(Self::U16),
            5125 => Ok(Self::U32),
            5126 => Ok(Self::F32),
            _ => Err(Error::UnsupportedType(format!("component type {}", code))),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::I8 => 5120,
            Self::U8 => 5121,
            Self::I16 => 5122,
            Self::U16 => 5123,
            Self::U32 => 5125,
            Self::F32 => 5126,
        }
    }

    /// The size of a single component, in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }
}

/// The shape of each element of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementShape {
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "SCALAR" => Ok(Self::Scalar),
            "VEC2" => Ok(Self::Vec2),
            "VEC3" => Ok(Self::Vec3),
            "VEC4" => Ok(Self::Vec4),
            "MAT2" => Ok(Self::Mat2),
            "MAT3" => Ok(Self::Mat3),
            "MAT4" => Ok(Self::Mat4),
            _ => Err(Error::UnsupportedType(format!("element type \"{}\"", tag))),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    /// The number of components per element, e.g. 16 for a 4x4 matrix.
    pub fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

/// The flattened, row-major components of a typed array.
#[derive(Debug, Clone, PartialEq)]
pub enum Components {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl Components {
    pub fn len(&self) -> usize {
        match self {
            Self::I8(values) => values.len(),
            Self::U8(values) => values.len(),
            Self::I16(values) => values.len(),
            Self::U16(values) => values.len(),
            Self::U32(values) => values.len(),
            Self::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::I8(_) => ComponentType::I8,
            Self::U8(_) => ComponentType::U8,
            Self::I16(_) => ComponentType::I16,
            Self::U16(_) => ComponentType::U16,
            Self::U32(_) => ComponentType::U32,
            Self::F32(_) => ComponentType::F32,
        }
    }
}

/// An array of `count` elements of the same shape, e.g. a list of vertex positions.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    pub shape: ElementShape,
    pub components: Components,
    /// Whether integer components map to `[0, 1]` (or `[-1, 1]`) when read as floats.
    pub normalized: bool,
}

impl TypedArray {
    pub fn new(shape: ElementShape, components: Components) -> Self {
        debug_assert_eq!(0, components.len() % shape.components());
        Self {
            shape,
            components,
            normalized: false,
        }
    }

    pub fn from_vec3(values: &[Vec3]) -> Self {
        Self::new(
            ElementShape::Vec3,
            Components::F32(values.iter().flat_map(|v| v.to_array()).collect()),
        )
    }

    pub fn from_vec2(values: &[Vec2]) -> Self {
        Self::new(
            ElementShape::Vec2,
            Components::F32(values.iter().flat_map(|v| v.to_array()).collect()),
        )
    }

    /// RGBA colors, stored as normalized unsigned bytes.
    pub fn from_rgba8(colors: &[[u8; 4]]) -> Self {
        Self {
            normalized: true,
            ..Self::new(
                ElementShape::Vec4,
                Components::U8(colors.iter().flatten().copied().collect()),
            )
        }
    }

    /// Triangle indices, flattened into unsigned 32-bit scalars.
    pub fn from_faces(faces: &[[u32; 3]]) -> Self {
        Self::new(
            ElementShape::Scalar,
            Components::U32(faces.iter().flatten().copied().collect()),
        )
    }

    /// An array filled with zeros, used for accessors that don't reference a buffer view. Fails
    /// if it would take more than [`MAX_ZEROED_BYTES`].
    pub fn zeroed(component_type: ComponentType, shape: ElementShape, count: usize) -> Result<Self> {
        let length = data_length(component_type, shape, count)
            .filter(|&length| length <= MAX_ZEROED_BYTES)
            .ok_or_else(|| {
                Error::format(format!(
                    "accessor of {} {} elements without a buffer view is too large",
                    count,
                    shape.tag()
                ))
            })?;
        let len = length / component_type.size();
        let components = match component_type {
            ComponentType::I8 => Components::I8(vec![0; len]),
            ComponentType::U8 => Components::U8(vec![0; len]),
            ComponentType::I16 => Components::I16(vec![0; len]),
            ComponentType::U16 => Components::U16(vec![0; len]),
            ComponentType::U32 => Components::U32(vec![0; len]),
            ComponentType::F32 => Components::F32(vec![0.; len]),
        };
        Ok(Self::new(shape, components))
    }

    /// Reads exactly `count` elements from the start of `bytes`.
    pub fn from_bytes(
        component_type: ComponentType,
        shape: ElementShape,
        count: usize,
        bytes: &[u8],
    ) -> Result<Self> {
        let expected = match data_length(component_type, shape, count) {
            Some(expected) if expected <= bytes.len() => expected,
            expected => {
                return Err(Error::truncation(
                    "accessor data",
                    expected.unwrap_or(usize::MAX),
                    bytes.len(),
                ))
            }
        };
        let len = expected / component_type.size();

        let mut reader = Cursor::new(&bytes[..expected]);
        let components = match component_type {
            ComponentType::I8 => {
                let mut values = vec![0; len];
                reader.read_i8_into(&mut values)?;
                Components::I8(values)
            }
            ComponentType::U8 => Components::U8(bytes[..expected].to_vec()),
            ComponentType::I16 => {
                let mut values = vec![0; len];
                reader.read_i16_into::<LE>(&mut values)?;
                Components::I16(values)
            }
            ComponentType::U16 => {
                let mut values = vec![0; len];
                reader.read_u16_into::<LE>(&mut values)?;
                Components::U16(values)
            }
            ComponentType::U32 => {
                let mut values = vec![0; len];
                reader.read_u32_into::<LE>(&mut values)?;
                Components::U32(values)
            }
            ComponentType::F32 => {
                let mut values = vec![0.; len];
                reader.read_f32_into::<LE>(&mut values)?;
                Components::F32(values)
            }
        };

        Ok(Self::new(shape, components))
    }

    /// The number of elements.
    pub fn count(&self) -> usize {
        self.components.len() / self.shape.components()
    }

    pub fn component_type(&self) -> ComponentType {
        self.components.component_type()
    }

    /// The size of the array once encoded, in bytes.
    pub fn byte_length(&self) -> usize {
        self.components.len() * self.component_type().size()
    }

    /// Encodes the components as little-endian bytes, in row-major order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.byte_length());
        match &self.components {
            Components::I8(values) => {
                for &value in values {
                    bytes.write_i8(value)?;
                }
            }
            Components::U8(values) => bytes.extend_from_slice(values),
            Components::I16(values) => {
                for &value in values {
                    bytes.write_i16::<LE>(value)?;
                }
            }
            Components::U16(values) => {
                for &value in values {
                    bytes.write_u16::<LE>(value)?;
                }
            }
            Components::U32(values) => {
                for &value in values {
                    bytes.write_u32::<LE>(value)?;
                }
            }
            Components::F32(values) => {
                for &value in values {
                    bytes.write_f32::<LE>(value)?;
                }
            }
        }
        Ok(bytes)
    }

    /// Returns every component as a float, applying normalization if the array is normalized.
    pub fn to_f32(&self) -> Vec<f32> {
        let normalized = self.normalized;
        match &self.components {
            Components::I8(values) if normalized => values
                .iter()
                .map(|&v| (v as f32 / i8::MAX as f32).max(-1.))
                .collect(),
            Components::U8(values) if normalized => {
                values.iter().map(|&v| v as f32 / u8::MAX as f32).collect()
            }
            Components::I16(values) if normalized => values
                .iter()
                .map(|&v| (v as f32 / i16::MAX as f32).max(-1.))
                .collect(),
            Components::U16(values) if normalized => {
                values.iter().map(|&v| v as f32 / u16::MAX as f32).collect()
            }
            Components::I8(values) => values.iter().map(|&v| v as f32).collect(),
            Components::U8(values) => values.iter().map(|&v| v as f32).collect(),
            Components::I16(values) => values.iter().map(|&v| v as f32).collect(),
            Components::U16(values) => values.iter().map(|&v| v as f32).collect(),
            Components::U32(values) => values.iter().map(|&v| v as f32).collect(),
            Components::F32(values) => values.clone(),
        }
    }

    /// Returns every component as an unsigned integer. Only unsigned integer arrays, which are
    /// the only ones valid as indices, are accepted.
    pub fn to_u32(&self) -> Result<Vec<u32>> {
        match &self.components {
            Components::U8(values) => Ok(values.iter().map(|&v| v as u32).collect()),
            Components::U16(values) => Ok(values.iter().map(|&v| v as u32).collect()),
            Components::U32(values) => Ok(values.clone()),
            other => Err(Error::UnsupportedType(format!(
                "{:?} indices",
                other.component_type()
            ))),
        }
    }

    /// Returns the elements as fixed-size float rows. Fails if `N` doesn't match the shape.
    pub fn to_rows<const N: usize>(&self) -> Result<Vec<[f32; N]>> {
        if self.shape.components() != N {
            return Err(Error::UnsupportedType(format!(
                "{} where {} components were expected",
                self.shape.tag(),
                N
            )));
        }
        Ok(self
            .to_f32()
            .chunks_exact(N)
            .map(|chunk| {
                let mut row = [0.; N];
                row.copy_from_slice(chunk);
                row
            })
            .collect())
    }

    /// Returns the elements as RGBA colors. Both RGB and RGBA arrays of any component type are
    /// accepted; missing alpha is opaque.
    pub fn to_rgba8(&self) -> Result<Vec<[u8; 4]>> {
        let width = match self.shape {
            ElementShape::Vec3 => 3,
            ElementShape::Vec4 => 4,
            other => {
                return Err(Error::UnsupportedType(format!(
                    "{} colors",
                    other.tag()
                )))
            }
        };

        if let Components::U8(values) = &self.components {
            return Ok(values
                .chunks_exact(width)
                .map(|chunk| match *chunk {
                    [r, g, b, a] => [r, g, b, a],
                    [r, g, b, ..] => [r, g, b, u8::MAX],
                    _ => [0, 0, 0, u8::MAX],
                })
                .collect());
        }

        let as_float = Self {
            // Float colors are always in [0, 1]; integer ones must be normalized to be.
            normalized: true,
            ..self.clone()
        };
        Ok(as_float
            .to_f32()
            .chunks_exact(width)
            .map(|chunk| {
                let channel = |i: usize| chunk.get(i).map_or(1., |&v| v as f64);
                color::to_rgba8([channel(0), channel(1), channel(2), channel(3)])
            })
            .collect())
    }

    /// Per-component minimum and maximum over all elements, as stored in accessor bounds.
    pub fn bounds(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        let width = self.shape.components();
        let values = self.to_f32();
        let mut rows = values.chunks_exact(width);
        let first = rows.next()?;

        let mut min: Vec<f64> = first.iter().map(|&v| v as f64).collect();
        let mut max = min.clone();
        for row in rows {
            for (axis, &value) in row.iter().enumerate() {
                min[axis] = min[axis].min(value as f64);
                max[axis] = max[axis].max(value as f64);
            }
        }

        Some((min, max))
    }
}

/// The bytes of a buffer view, as referenced by accessors.
#[derive(Debug, Clone, Copy)]
pub struct ViewData<'a> {
    pub bytes: &'a [u8],
    pub stride: Option<usize>,
}

/// Creates the descriptor of an array. The buffer view is left for the caller to assign, since
/// it depends on where the encoded bytes are appended.
pub fn describe(array: &TypedArray, with_bounds: bool) -> GltfAccessor {
    let (min, max) = match array.bounds() {
        Some((min, max)) if with_bounds => (Some(min), Some(max)),
        _ => (None, None),
    };

    GltfAccessor {
        buffer_view: None,
        byte_offset: None,
        component_type: array.component_type().code(),
        normalized: array.normalized,
        count: array.count(),
        type_: array.shape.tag().to_string(),
        max,
        min,
    }
}

/// Reconstructs the typed array an accessor describes. Accessors without a buffer view are
/// filled with zeros.
pub fn decode(accessor: &GltfAccessor, views: &[ViewData]) -> Result<TypedArray> {
    let component_type = ComponentType::from_code(accessor.component_type)?;
    let shape = ElementShape::from_tag(&accessor.type_)?;

    let view = match accessor.buffer_view {
        Some(index) => *views.get(index).ok_or_else(|| {
            Error::format(format!("accessor references missing buffer view {}", index))
        })?,
        None => {
            return Ok(TypedArray {
                normalized: accessor.normalized,
                ..TypedArray::zeroed(component_type, shape, accessor.count)?
            })
        }
    };

    let element_size = shape.components() * component_type.size();
    let start = accessor.byte_offset.unwrap_or(0);
    let bytes = match view.stride {
        Some(stride) if stride > element_size => {
            gather(view.bytes, start, stride, element_size, accessor.count)?
        }
        _ => view.bytes.get(start..).unwrap_or_default().to_vec(),
    };

    let array = TypedArray::from_bytes(component_type, shape, accessor.count, &bytes)?;
    Ok(TypedArray {
        normalized: accessor.normalized,
        ..array
    })
}

/// The size of `count` elements in bytes, or `None` if it overflows.
fn data_length(component_type: ComponentType, shape: ElementShape, count: usize) -> Option<usize> {
    count
        .checked_mul(shape.components())?
        .checked_mul(component_type.size())
}

/// Copies interleaved elements into a tightly packed buffer. `stride` must be larger than
/// `element_size`.
fn gather(
    bytes: &[u8],
    start: usize,
    stride: usize,
    element_size: usize,
    count: usize,
) -> Result<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    // The last element ends `element_size` bytes after its stride slot starts.
    let end = (count - 1)
        .checked_mul(stride)
        .and_then(|last| last.checked_add(start))
        .and_then(|last| last.checked_add(element_size));
    let bytes = match end {
        Some(end) if end <= bytes.len() => &bytes[start..end],
        end => {
            return Err(Error::truncation(
                "strided accessor data",
                end.unwrap_or(usize::MAX),
                bytes.len(),
            ))
        }
    };

    Ok(bytes
        .chunks(stride)
        .flat_map(|element| &element[..element_size])
        .copied()
        .collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn view(bytes: &[u8]) -> ViewData {
        ViewData {
            bytes,
            stride: None,
        }
    }

    #[test]
    fn positions() {
        let positions = [
            Vec3::new(0., 1., 2.),
            Vec3::new(-1., 5., 0.5),
            Vec3::new(3., -2., 1.),
        ];
        let array = TypedArray::from_vec3(&positions);
        let mut accessor = describe(&array, true);
        let bytes = array.to_bytes().unwrap();

        assert_eq!(5126, accessor.component_type);
        assert_eq!("VEC3", accessor.type_);
        assert_eq!(3, accessor.count);
        assert_eq!(36, bytes.len());
        assert_eq!(Some(vec![-1., -2., 0.5]), accessor.min);
        assert_eq!(Some(vec![3., 5., 2.]), accessor.max);

        accessor.buffer_view = Some(0);
        let decoded = decode(&accessor, &[view(&bytes)]).unwrap();

        assert_eq!(
            positions.iter().map(|v| v.to_array()).collect::<Vec<_>>(),
            decoded.to_rows::<3>().unwrap()
        );
    }

    #[test]
    fn byte_length_matches_elements() {
        let arrays = [
            TypedArray::from_faces(&[[0, 1, 2], [2, 1, 3]]),
            TypedArray::from_rgba8(&[[255, 0, 0, 255]; 5]),
            TypedArray::from_vec2(&[Vec2::ZERO; 7]),
            TypedArray::zeroed(ComponentType::I16, ElementShape::Mat3, 2).unwrap(),
        ];
        for array in &arrays {
            let accessor = describe(array, false);
            let shape = ElementShape::from_tag(&accessor.type_).unwrap();
            let component_type = ComponentType::from_code(accessor.component_type).unwrap();

            assert_eq!(
                array.to_bytes().unwrap().len(),
                accessor.count * shape.components() * component_type.size()
            );
        }
    }

    #[test]
    fn unknown_codes() {
        assert!(matches!(
            ComponentType::from_code(5124),
            Err(Error::UnsupportedType(_))
        ));
        assert!(matches!(
            ElementShape::from_tag("VEC5"),
            Err(Error::UnsupportedType(_))
        ));

        let accessor = GltfAccessor {
            buffer_view: Some(0),
            component_type: 1234,
            count: 1,
            type_: String::from("SCALAR"),
            ..Default::default()
        };
        assert!(matches!(
            decode(&accessor, &[view(&[0; 4])]),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn truncated_view() {
        let accessor = GltfAccessor {
            buffer_view: Some(0),
            component_type: 5126,
            count: 2,
            type_: String::from("VEC3"),
            ..Default::default()
        };

        match decode(&accessor, &[view(&[0; 20])]) {
            Err(Error::Truncation {
                expected, actual, ..
            }) => {
                assert_eq!(24, expected);
                assert_eq!(20, actual);
            }
            other => panic!("expected a truncation error, got {:?}", other),
        }
    }

    #[test]
    fn overflowing_count() {
        let accessor = GltfAccessor {
            buffer_view: Some(0),
            component_type: 5126,
            count: 1 << 62,
            type_: String::from("VEC4"),
            ..Default::default()
        };

        match decode(&accessor, &[view(&[0; 4])]) {
            Err(Error::Truncation {
                expected, actual, ..
            }) => {
                assert_eq!(usize::MAX, expected);
                assert_eq!(4, actual);
            }
            other => panic!("expected a truncation error, got {:?}", other),
        }
    }

    #[test]
    fn overflowing_stride() {
        let accessor = GltfAccessor {
            buffer_view: Some(0),
            component_type: 5126,
            count: usize::MAX / 2,
            type_: String::from("VEC2"),
            ..Default::default()
        };
        let views = [ViewData {
            bytes: &[0; 24],
            stride: Some(12),
        }];

        assert!(matches!(
            decode(&accessor, &views),
            Err(Error::Truncation { .. })
        ));
    }

    #[test]
    fn oversized_sparse_fallback() {
        let accessor = GltfAccessor {
            buffer_view: None,
            component_type: 5126,
            count: usize::MAX / 8,
            type_: String::from("MAT4"),
            ..Default::default()
        };
        assert!(matches!(decode(&accessor, &[]), Err(Error::Format(_))));

        let accessor = GltfAccessor {
            count: MAX_ZEROED_BYTES / 64 + 1,
            ..accessor
        };
        assert!(matches!(decode(&accessor, &[]), Err(Error::Format(_))));
    }

    #[test]
    fn sparse_fallback() {
        let accessor = GltfAccessor {
            buffer_view: None,
            component_type: 5123,
            count: 4,
            type_: String::from("VEC2"),
            ..Default::default()
        };
        let array = decode(&accessor, &[]).unwrap();

        assert_eq!(4, array.count());
        assert_eq!(Components::U16(vec![0; 8]), array.components);
    }

    #[test]
    fn offset_and_stride() {
        // Two interleaved VEC2 floats with 4 bytes of other data in between, after an 8 byte
        // accessor offset.
        let mut bytes = vec![0xAA; 8];
        for (x, y) in [(1f32, 2f32), (3., 4.)] {
            bytes.write_f32::<LE>(x).unwrap();
            bytes.write_f32::<LE>(y).unwrap();
            bytes.extend_from_slice(&[0xFF; 4]);
        }
        let accessor = GltfAccessor {
            buffer_view: Some(0),
            byte_offset: Some(8),
            component_type: 5126,
            count: 2,
            type_: String::from("VEC2"),
            ..Default::default()
        };
        let views = [ViewData {
            bytes: &bytes,
            stride: Some(12),
        }];

        let array = decode(&accessor, &views).unwrap();

        assert_eq!(vec![[1., 2.], [3., 4.]], array.to_rows::<2>().unwrap());
    }

    #[test]
    fn colors() {
        let array = TypedArray::from_rgba8(&[[255, 0, 51, 255]]);
        let accessor = describe(&array, false);

        assert!(accessor.normalized);
        assert_eq!(vec![1., 0., 0.2, 1.], array.to_f32());

        let floats = TypedArray::new(
            ElementShape::Vec3,
            Components::F32(vec![1., 0.5, 0.]),
        );
        assert_eq!(vec![[255, 128, 0, 255]], floats.to_rgba8().unwrap());
    }

    #[test]
    fn indices() {
        let array = TypedArray::new(ElementShape::Scalar, Components::U16(vec![0, 1, 2]));
        assert_eq!(vec![0, 1, 2], array.to_u32().unwrap());

        let array = TypedArray::new(ElementShape::Scalar, Components::F32(vec![0., 1., 2.]));
        assert!(array.to_u32().is_err());
    }
}
