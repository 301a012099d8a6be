use std::io::Read;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use super::{
    buffer::{pad, ALIGNMENT},
    error::{Error, Result},
};

/// "glTF" in little-endian.
pub const MAGIC: u32 = 0x46546C67;
pub const VERSION: u32 = 2;
/// "JSON" in little-endian.
pub const CHUNK_JSON: u32 = 0x4E4F534A;
/// "BIN\0" in little-endian.
pub const CHUNK_BIN: u32 = 0x004E4942;

const HEADER_SIZE: usize = 12;
const CHUNK_HEADER_SIZE: usize = 8;

/// The content of a GLB file: the JSON header and the binary chunks that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct Glb {
    pub json: Vec<u8>,
    pub chunks: Vec<Vec<u8>>,
}

/// Frames a JSON document and an optional binary payload as a GLB file.
///
/// The JSON is padded with spaces to a 4-byte boundary. The binary payload is expected to be
/// aligned already, which is always the case for buffers assembled by the
/// [`BufferBuilder`](super::buffer::BufferBuilder).
pub fn write(json: Vec<u8>, bin: Option<&[u8]>) -> Result<Vec<u8>> {
    let json = pad(json, ALIGNMENT);
    let bin_len = bin.map(|bin| CHUNK_HEADER_SIZE + bin.len()).unwrap_or(0);
    let length = HEADER_SIZE + CHUNK_HEADER_SIZE + json.len() + bin_len;

    let mut bytes = Vec::with_capacity(length);
    bytes.write_u32::<LE>(MAGIC)?;
    bytes.write_u32::<LE>(VERSION)?;
    bytes.write_u32::<LE>(length_field(length, "GLB file")?)?;
    bytes.write_u32::<LE>(length_field(json.len(), "GLB JSON chunk")?)?;
    bytes.write_u32::<LE>(CHUNK_JSON)?;
    bytes.extend(json);

    if let Some(bin) = bin {
        debug_assert_eq!(0, bin.len() % ALIGNMENT);
        bytes.write_u32::<LE>(length_field(bin.len(), "GLB binary chunk")?)?;
        bytes.write_u32::<LE>(CHUNK_BIN)?;
        bytes.extend_from_slice(bin);
    }

    debug_assert_eq!(length, bytes.len());
    Ok(bytes)
}

/// Parses a GLB file from a stream positioned at its header.
///
/// Chunks are read until the length declared in the header is consumed, so a stream that ends
/// early is a truncation error. Every chunk after the first must be binary.
pub fn read(reader: &mut dyn Read) -> Result<Glb> {
    let mut header = [0; HEADER_SIZE + CHUNK_HEADER_SIZE];
    let read = read_up_to(reader, &mut header)?;
    if read < header.len() {
        return Err(Error::truncation("GLB header", header.len(), read));
    }

    let mut fields = [0; 5];
    (&header[..]).read_u32_into::<LE>(&mut fields)?;
    let [magic, version, length, json_length, json_type] = fields;

    if magic != MAGIC {
        return Err(Error::format(format!(
            "invalid GLB magic 0x{:08X}",
            magic
        )));
    }
    if version != VERSION {
        return Err(Error::format(format!(
            "unsupported GLB version {}",
            version
        )));
    }
    if json_type != CHUNK_JSON {
        return Err(Error::format(format!(
            "the first GLB chunk must be JSON, got type 0x{:08X}",
            json_type
        )));
    }

    let json = read_chunk(reader, json_length as usize, "GLB JSON chunk")?;
    let mut position = header.len() + json.len();

    let mut chunks = Vec::new();
    while position < length as usize {
        let mut chunk_header = [0; CHUNK_HEADER_SIZE];
        let read = read_up_to(reader, &mut chunk_header)?;
        if read != CHUNK_HEADER_SIZE {
            return Err(Error::truncation("GLB chunk header", CHUNK_HEADER_SIZE, read));
        }

        let chunk_length = (&chunk_header[..4]).read_u32::<LE>()? as usize;
        let chunk_type = (&chunk_header[4..]).read_u32::<LE>()?;
        if chunk_type != CHUNK_BIN {
            return Err(Error::format(format!(
                "expected a binary GLB chunk, got type 0x{:08X}",
                chunk_type
            )));
        }

        chunks.push(read_chunk(reader, chunk_length, "GLB binary chunk")?);
        position += CHUNK_HEADER_SIZE + chunk_length;
    }

    Ok(Glb { json, chunks })
}

/// Converts a length into a header field. GLB lengths are 32-bit.
fn length_field(length: usize, what: &str) -> Result<u32> {
    u32::try_from(length).map_err(|_| {
        Error::format(format!(
            "{} of {} bytes exceeds the GLB size limit",
            what, length
        ))
    })
}

fn read_chunk(reader: &mut dyn Read, length: usize, what: &str) -> Result<Vec<u8>> {
    // The declared length isn't trusted to size the allocation.
    let mut chunk = Vec::new();
    (&mut *reader).take(length as u64).read_to_end(&mut chunk)?;
    if chunk.len() != length {
        return Err(Error::truncation(what, length, chunk.len()));
    }
    Ok(chunk)
}

/// Like `read_exact`, but returns how many bytes were read instead of failing at the end of the
/// stream.
fn read_up_to(reader: &mut dyn Read, buffer: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        match reader.read(&mut buffer[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

/// Returns the JSON text of a chunk without its padding. Some exporters pad the chunk with null
/// bytes instead of spaces, which isn't valid JSON.
pub fn trim_json(json: &[u8]) -> &[u8] {
    let len = memchr::memchr(0, json).unwrap_or(json.len());
    &json[..len]
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn glb(json: &str, bin: Option<&[u8]>) -> Vec<u8> {
        write(json.as_bytes().to_vec(), bin).unwrap()
    }

    #[test]
    fn header() {
        let bytes = glb(r#"{"asset":{"version":"2.0"}}"#, Some(&[1, 2, 3, 4]));

        assert_eq!(b"glTF", &bytes[0..4]);
        assert_eq!(2, u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]));
        assert_eq!(
            bytes.len() as u32,
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])
        );
        assert_eq!(b"JSON", &bytes[16..20]);
        assert_eq!(0, (bytes.len() - 20) % 4);
    }

    #[test]
    fn read_written() {
        let json = r#"{"asset":{"version":"2.0"}}"#;
        let bytes = glb(json, Some(&[9; 8]));

        let glb = read(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(pad(json.as_bytes().to_vec(), ALIGNMENT), glb.json);
        assert_eq!(vec![vec![9; 8]], glb.chunks);
    }

    #[test]
    fn json_only() {
        let bytes = glb("{}", None);
        let glb = read(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(b"{}  ".to_vec(), glb.json);
        assert!(glb.chunks.is_empty());
    }

    #[test]
    fn multiple_chunks() {
        let mut bytes = glb("{}", Some(&[1; 4]));
        bytes.write_u32::<LE>(4).unwrap();
        bytes.write_u32::<LE>(CHUNK_BIN).unwrap();
        bytes.extend_from_slice(&[2; 4]);
        let length = bytes.len() as u32;
        bytes[8..12].copy_from_slice(&length.to_le_bytes());

        let glb = read(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(vec![vec![1; 4], vec![2; 4]], glb.chunks);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = glb("{}", None);
        bytes[0] = b'x';

        assert!(matches!(
            read(&mut Cursor::new(&bytes)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn bad_version() {
        let mut bytes = glb("{}", None);
        bytes[4] = 1;

        assert!(matches!(
            read(&mut Cursor::new(&bytes)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn first_chunk_not_json() {
        let mut bytes = glb("{}", Some(&[0; 4]));
        bytes[16..20].copy_from_slice(&CHUNK_BIN.to_le_bytes());

        assert!(matches!(
            read(&mut Cursor::new(&bytes)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn non_binary_chunk() {
        let mut bytes = glb("{}", Some(&[0; 4]));
        let offset = bytes.len() - 8;
        bytes[offset..offset + 4].copy_from_slice(&CHUNK_JSON.to_le_bytes());

        assert!(matches!(
            read(&mut Cursor::new(&bytes)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn truncated_binary_chunk() {
        let mut bytes = glb("{}", Some(&[0; 8]));
        bytes.truncate(bytes.len() - 3);

        assert!(matches!(
            read(&mut Cursor::new(&bytes)),
            Err(Error::Truncation { .. })
        ));
    }

    #[test]
    fn truncated_json_chunk() {
        let bytes = glb(r#"{"asset":{"version":"2.0"}}"#, None);

        assert!(matches!(
            read(&mut Cursor::new(&bytes[..24])),
            Err(Error::Truncation { .. })
        ));
        assert!(matches!(
            read(&mut Cursor::new(&bytes[..10])),
            Err(Error::Truncation { .. })
        ));
    }

    #[test]
    fn missing_declared_chunk() {
        let json = r#"{"asset":{"version":"2.0"}}"#;
        let bytes = glb(json, Some(&[7; 16]));
        let json_end = bytes.len() - CHUNK_HEADER_SIZE - 16;

        match read(&mut Cursor::new(&bytes[..json_end])) {
            Err(Error::Truncation {
                expected, actual, ..
            }) => {
                assert_eq!(CHUNK_HEADER_SIZE, expected);
                assert_eq!(0, actual);
            }
            other => panic!("expected a truncation error, got {:?}", other),
        }
        assert!(matches!(
            read(&mut Cursor::new(&bytes[..json_end + 5])),
            Err(Error::Truncation { .. })
        ));
    }

    #[test]
    fn oversized_lengths() {
        assert_eq!(12, length_field(12, "GLB file").unwrap());
        assert!(matches!(
            length_field(u32::MAX as usize + 1, "GLB file"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn declared_length_beyond_stream() {
        let mut bytes = glb("{}", Some(&[0; 4]));
        let offset = bytes.len() - 12;
        bytes[offset..offset + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        match read(&mut Cursor::new(&bytes)) {
            Err(Error::Truncation {
                expected, actual, ..
            }) => {
                assert_eq!(u32::MAX as usize, expected);
                assert_eq!(4, actual);
            }
            other => panic!("expected a truncation error, got {:?}", other),
        }
    }

    #[test]
    fn null_padded_json() {
        assert_eq!(b"{}", trim_json(b"{}\0\0"));
        assert_eq!(b"{} ", trim_json(b"{} "));
    }
}
