//! gRPC metadata (headers).

use std::str::FromStr;

use tonic::metadata::{Ascii, Binary, KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue};

use crate::error::{Result, TransportError};

/// gRPC metadata for requests and responses.
///
/// Metadata in gRPC is similar to HTTP headers and is used to pass
/// additional information about the call. A key may carry several values;
/// [`append`](Self::append) and [`merge`](Self::merge) never replace values
/// that are already present.
///
/// # Example
///
/// ```
/// use credgate_net::grpc::GrpcMetadata;
///
/// let mut metadata = GrpcMetadata::new();
/// metadata.insert("authorization", "Bearer token").unwrap();
/// metadata.append("x-request-id", "12345").unwrap();
/// assert_eq!(metadata.get("authorization"), Some("Bearer token"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GrpcMetadata {
    inner: MetadataMap,
}

fn ascii_key(key: &str) -> Result<MetadataKey<Ascii>> {
    MetadataKey::from_str(key)
        .map_err(|e| TransportError::invalid_metadata(format!("Invalid metadata key '{key}': {e}")))
}

fn ascii_value(value: &str) -> Result<MetadataValue<Ascii>> {
    value
        .parse()
        .map_err(|e| TransportError::invalid_metadata(format!("Invalid metadata value: {e}")))
}

fn binary_key(key: &str) -> Result<MetadataKey<Binary>> {
    let key = if key.ends_with("-bin") {
        key.to_string()
    } else {
        format!("{key}-bin")
    };
    MetadataKey::from_str(&key)
        .map_err(|e| TransportError::invalid_metadata(format!("Invalid metadata key '{key}': {e}")))
}

impl GrpcMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            inner: MetadataMap::new(),
        }
    }

    /// Build metadata from ASCII key/value pairs, appending in order.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut metadata = Self::new();
        for (key, value) in pairs {
            metadata.append(key, value)?;
        }
        Ok(metadata)
    }

    /// Insert a metadata entry, replacing any existing values for the key.
    ///
    /// The key must be a valid ASCII header name.
    /// The value must be valid ASCII (use `insert_binary` for binary values).
    pub fn insert(&mut self, key: &str, value: &str) -> Result<()> {
        self.inner.insert(ascii_key(key)?, ascii_value(value)?);
        Ok(())
    }

    /// Append a metadata entry, keeping any existing values for the key.
    pub fn append(&mut self, key: &str, value: &str) -> Result<()> {
        self.inner.append(ascii_key(key)?, ascii_value(value)?);
        Ok(())
    }

    /// Insert a binary metadata entry.
    ///
    /// Binary metadata keys must end with "-bin"; the suffix is added if missing.
    pub fn insert_binary(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.inner
            .insert_bin(binary_key(key)?, MetadataValue::from_bytes(value));
        Ok(())
    }

    /// Append a binary metadata entry, keeping any existing values for the key.
    pub fn append_binary(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.inner
            .append_bin(binary_key(key)?, MetadataValue::from_bytes(value));
        Ok(())
    }

    /// Get the first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = MetadataKey::<Ascii>::from_str(key).ok()?;
        self.inner.get(&key).and_then(|v| v.to_str().ok())
    }

    /// Get every value for a key, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        match MetadataKey::<Ascii>::from_str(key) {
            Ok(key) => self
                .inner
                .get_all(&key)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Get a binary metadata value by key.
    pub fn get_binary(&self, key: &str) -> Option<Vec<u8>> {
        let key = binary_key(key).ok()?;
        self.inner
            .get_bin(&key)
            .and_then(|v| v.to_bytes().ok())
            .map(|bytes| bytes.to_vec())
    }

    /// Remove a metadata entry, returning its first value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let key = MetadataKey::<Ascii>::from_str(key).ok()?;
        self.inner
            .remove(&key)
            .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Check if the metadata is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the number of values (a key with two values counts twice).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Append every entry of `other` to this metadata.
    ///
    /// Existing values are never replaced: a key present in both ends up with
    /// this metadata's values first, followed by `other`'s.
    pub fn merge(&mut self, other: &GrpcMetadata) {
        for entry in other.inner.iter() {
            match entry {
                KeyAndValueRef::Ascii(key, value) => {
                    self.inner.append(key.clone(), value.clone());
                }
                KeyAndValueRef::Binary(key, value) => {
                    self.inner.append_bin(key.clone(), value.clone());
                }
            }
        }
    }

    /// Iterate over ASCII entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().filter_map(|entry| {
            if let KeyAndValueRef::Ascii(key, value) = entry {
                Some((key.as_str(), value.to_str().ok()?))
            } else {
                None
            }
        })
    }

    /// Get the underlying tonic MetadataMap.
    pub fn into_inner(self) -> MetadataMap {
        self.inner
    }

    /// Get a reference to the underlying MetadataMap.
    pub fn inner(&self) -> &MetadataMap {
        &self.inner
    }
}

impl From<MetadataMap> for GrpcMetadata {
    fn from(inner: MetadataMap) -> Self {
        Self { inner }
    }
}

impl From<GrpcMetadata> for MetadataMap {
    fn from(metadata: GrpcMetadata) -> Self {
        metadata.inner
    }
}
