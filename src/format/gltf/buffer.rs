use super::internal::{GltfBuffer, GltfBufferView};

/// The byte boundary every blob and chunk is aligned to.
pub const ALIGNMENT: usize = 4;

/// Appends ASCII spaces to `bytes` until its length is a multiple of `boundary`. Already aligned
/// data is returned as is.
pub fn pad(mut bytes: Vec<u8>, boundary: usize) -> Vec<u8> {
    let remainder = bytes.len() % boundary;
    if remainder != 0 {
        bytes.resize(bytes.len() + boundary - remainder, b' ');
    }
    bytes
}

/// A blob of binary data, padded to [`ALIGNMENT`], which is described by exactly one buffer view.
#[derive(Debug, Clone, PartialEq)]
struct BufferItem {
    bytes: Vec<u8>,
    /// The length of the data before padding.
    len: usize,
}

/// Accumulates binary blobs in append order. The position of a blob is the index of the buffer
/// view that describes it.
#[derive(Debug, Default, Clone)]
pub struct BufferBuilder {
    items: Vec<BufferItem>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Pads and stores a blob. Returns its buffer view index.
    pub fn append(&mut self, bytes: Vec<u8>) -> usize {
        let len = bytes.len();
        self.items.push(BufferItem {
            bytes: pad(bytes, ALIGNMENT),
            len,
        });
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Concatenates every blob into a single buffer, as stored in the binary chunk of a GLB.
    /// Returns the buffer and one view per blob, where each view starts at the padded running
    /// offset of the blob.
    pub fn assemble(self) -> (Vec<u8>, Vec<GltfBufferView>) {
        let mut views = Vec::with_capacity(self.items.len());
        let mut data = Vec::with_capacity(self.items.iter().map(|item| item.bytes.len()).sum());

        for item in self.items {
            views.push(GltfBufferView {
                buffer: 0,
                byte_offset: data.len(),
                byte_length: item.len,
                byte_stride: None,
            });
            data.extend(item.bytes);
        }

        (data, views)
    }

    /// Splits the blobs into one buffer file each. Returns the files as `(name, bytes)` pairs along
    /// with the buffers and views that reference them.
    pub fn files(self) -> (Vec<(String, Vec<u8>)>, Vec<GltfBuffer>, Vec<GltfBufferView>) {
        let mut files = Vec::with_capacity(self.items.len());
        let mut buffers = Vec::with_capacity(self.items.len());
        let mut views = Vec::with_capacity(self.items.len());

        for (index, item) in self.items.into_iter().enumerate() {
            let name = buffer_file_name(index);
            views.push(GltfBufferView {
                buffer: index,
                byte_offset: 0,
                byte_length: item.len,
                byte_stride: None,
            });
            buffers.push(GltfBuffer {
                byte_length: item.bytes.len(),
                uri: Some(name.clone()),
            });
            files.push((name, item.bytes));
        }

        (files, buffers, views)
    }
}

pub fn buffer_file_name(index: usize) -> String {
    format!("gltf_buffer_{}.bin", index)
}
