use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum ResourceTypeTag {
    Static(&'static str),
    Runtime(Arc<String>),
}

/// Identifies the type of a resource. It is a 128-bit FNV-1a hash of the type tag (the file
/// extension, lower-cased), wide enough that distinct extensions never collide in practice. The
/// tag itself is kept alongside as a debugging aid.
#[derive(Clone)]
pub struct ResourceTypeId {
    hash: u128,
    tag: ResourceTypeTag,
}

impl fmt::Debug for ResourceTypeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ResourceTypeId")
            .field("hash", &format!("{:0>32x}", self.hash))
            .field("tag", &self.tag)
            .finish()
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl PartialEq for ResourceTypeId {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.hash.eq(&other.hash)
    }
}

impl Eq for ResourceTypeId {}

impl Hash for ResourceTypeId {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.hash.hash(state);
    }
}

impl ResourceTypeId {
    /// The extension must already be lower-case, this is not checked in const context
    pub const fn from_static_extension(extension: &'static str) -> Self {
        ResourceTypeId {
            hash: const_fnv1a_hash::fnv1a_hash_str_128(extension) | 1u128,
            tag: ResourceTypeTag::Static(extension),
        }
    }

    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        ResourceTypeId {
            hash: const_fnv1a_hash::fnv1a_hash_str_128(&extension) | 1u128,
            tag: ResourceTypeTag::Runtime(Arc::new(extension)),
        }
    }

    /// Derives the type from the extension of the last component of a resource path. Returns
    /// None if the path has no extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(|c| c == '/' || c == '\\').next()?;
        let (stem, extension) = file_name.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }

        Some(Self::from_extension(extension))
    }

    pub fn hash(&self) -> u128 {
        self.hash
    }

    pub fn tag(&self) -> &str {
        match &self.tag {
            ResourceTypeTag::Static(s) => s,
            ResourceTypeTag::Runtime(s) => s.as_str(),
        }
    }
}
