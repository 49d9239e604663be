pub mod b3f;
pub mod hashing;

mod compiled_resource;
pub use compiled_resource::{
    write_compiled_resource, CompiledResourceReader, ResourceHeader, COMPILED_RESOURCE_FILE_TAG,
    COMPILED_RESOURCE_VERSION,
};

mod error;
pub use error::{ResourceError, ResourceResult};

mod resource_id;
pub use resource_id::ResourceId;

mod resource_type_id;
pub use resource_type_id::{ResourceTypeId, ResourceTypeTag};
