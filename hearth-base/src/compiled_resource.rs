use crate::b3f::{B3FReader, B3FWriter};
use crate::{ResourceError, ResourceResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const COMPILED_RESOURCE_FILE_TAG: [u8; 4] = *b"HRES";
pub const COMPILED_RESOURCE_VERSION: u32 = 1;

// No real reason this limit needs to exist, just don't want to read corrupt data and try to
// allocate or load based on corrupt data. This is larger than a header is actually expected
// to be.
const MAX_HEADER_SIZE: usize = 1024 * 1024;

const HEADER_BLOCK_INDEX: usize = 0;
const PAYLOAD_BLOCK_INDEX: usize = 1;

/// Data encoded at the front of every compiled resource. This is all the resource system needs to
/// route the bytes and discover what else must be loaded first. Dependencies are paths, in the
/// order the payload expects to find them at install time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHeader {
    pub type_tag: String,
    pub path: String,
    pub dependencies: Vec<String>,
}

impl ResourceHeader {
    pub fn new<T: Into<String>, P: Into<String>>(
        type_tag: T,
        path: P,
    ) -> Self {
        ResourceHeader {
            type_tag: type_tag.into(),
            path: path.into(),
            dependencies: Vec::default(),
        }
    }

    pub fn with_dependency<P: Into<String>>(
        mut self,
        path: P,
    ) -> Self {
        self.dependencies.push(path.into());
        self
    }
}

/// Encodes a header and a typed payload into a single compiled resource blob
pub fn write_compiled_resource<T: Serialize>(
    header: &ResourceHeader,
    payload: &T,
) -> ResourceResult<Vec<u8>> {
    let header_bytes = bincode::serialize(header)?;
    if header_bytes.len() >= MAX_HEADER_SIZE {
        return Err(ResourceError::InvalidArchive(format!(
            "header for {} is {} bytes",
            header.path,
            header_bytes.len()
        )));
    }

    let payload_bytes = bincode::serialize(payload)?;

    let mut writer = B3FWriter::new_from_u8_tag(COMPILED_RESOURCE_FILE_TAG, COMPILED_RESOURCE_VERSION);
    writer.add_block(&header_bytes);
    writer.add_block(&payload_bytes);

    let mut data = Vec::default();
    writer.write(&mut data)?;
    Ok(data)
}

/// Two-step decoding of a compiled resource. The header is decoded eagerly so dependency paths
/// can be surfaced, the payload is only decoded when asked for.
pub struct CompiledResourceReader<'a> {
    header: ResourceHeader,
    payload: &'a [u8],
}

impl<'a> CompiledResourceReader<'a> {
    pub fn new(data: &'a [u8]) -> ResourceResult<Self> {
        let reader = B3FReader::new(data)
            .ok_or_else(|| ResourceError::InvalidArchive("not a B3F file".to_string()))?;

        if reader.file_tag_as_u8() != COMPILED_RESOURCE_FILE_TAG {
            return Err(ResourceError::InvalidArchive(format!(
                "unexpected file tag {:?}",
                reader.file_tag_as_u8()
            )));
        }

        if reader.version() != COMPILED_RESOURCE_VERSION {
            return Err(ResourceError::InvalidArchive(format!(
                "unsupported version {}",
                reader.version()
            )));
        }

        let header_bytes = reader
            .get_block(HEADER_BLOCK_INDEX)
            .ok_or_else(|| ResourceError::InvalidArchive("missing header block".to_string()))?;
        if header_bytes.len() >= MAX_HEADER_SIZE {
            return Err(ResourceError::InvalidArchive(format!(
                "header is {} bytes",
                header_bytes.len()
            )));
        }

        let payload = reader
            .get_block(PAYLOAD_BLOCK_INDEX)
            .ok_or_else(|| ResourceError::InvalidArchive("missing payload block".to_string()))?;

        let header = bincode::deserialize(header_bytes)?;
        Ok(CompiledResourceReader { header, payload })
    }

    pub fn header(&self) -> &ResourceHeader {
        &self.header
    }

    pub fn payload<T: DeserializeOwned>(&self) -> ResourceResult<T> {
        Ok(bincode::deserialize(self.payload)?)
    }

    pub fn into_header(self) -> ResourceHeader {
        self.header
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestPayload {
        values: Vec<u32>,
        name: String,
    }

    #[test]
    fn header_then_payload() {
        let header = ResourceHeader::new("material", "materials/brick.material")
            .with_dependency("textures/brick.texture")
            .with_dependency("pipelines/lit.pipeline");
        let payload = TestPayload {
            values: vec![1, 2, 3],
            name: "brick".to_string(),
        };

        let data = write_compiled_resource(&header, &payload).unwrap();
        let reader = CompiledResourceReader::new(&data).unwrap();
        assert_eq!(reader.header(), &header);
        assert_eq!(
            reader.header().dependencies,
            vec!["textures/brick.texture", "pipelines/lit.pipeline"]
        );
        assert_eq!(reader.payload::<TestPayload>().unwrap(), payload);
    }

    #[test]
    fn wrong_file_tag_is_invalid() {
        let header_bytes = bincode::serialize(&ResourceHeader::new("mesh", "a.mesh")).unwrap();
        let mut writer = B3FWriter::new_from_u8_tag(*b"NOPE", COMPILED_RESOURCE_VERSION);
        writer.add_block(&header_bytes);
        writer.add_block(&[]);
        let data = writer.write_to_vec();

        match CompiledResourceReader::new(&data) {
            Err(ResourceError::InvalidArchive(_)) => {}
            _ => panic!("expected InvalidArchive"),
        }
    }

    #[test]
    fn corrupt_bytes_are_errors_not_panics() {
        assert!(CompiledResourceReader::new(b"definitely not a resource").is_err());

        let header = ResourceHeader::new("mesh", "a.mesh");
        let mut data = write_compiled_resource(&header, &7u64).unwrap();
        data.truncate(data.len() - 16);
        assert!(CompiledResourceReader::new(&data).is_err());
    }
}
