//! Entity kinds and the loader used for everything that is not an HTTP stream.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use log::debug;
use url::Url;

use proxyauth_client::ResourceStream;

use crate::error::ResolveError;

/// The kind of object the caller expects back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EntityKind {
    /// A byte stream.
    #[default]
    Stream,
    /// Any other object type, named by the caller.
    Other(String),
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// What [`EntityResolver::get_entity`](crate::EntityResolver::get_entity)
/// hands back.
pub enum ResolvedEntity {
    Stream(ResourceStream),
    /// An object produced by a custom loader.
    Opaque(Box<dyn Any + Send>),
}

impl ResolvedEntity {
    /// The stream, if this is one.
    pub fn into_stream(self) -> Option<ResourceStream> {
        match self {
            Self::Stream(stream) => Some(stream),
            Self::Opaque(_) => None,
        }
    }
}

impl fmt::Debug for ResolvedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
            Self::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// Loads entities the HTTP path does not handle: non-HTTP schemes and
/// non-stream kinds.
#[async_trait]
pub trait EntityLoader: Send + Sync {
    /// Load `uri` as `expected`. `role` is passed through from the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when nothing exists at `uri` and
    /// [`ResolveError::UnsupportedEntityType`] when `expected` cannot be produced.
    async fn load(
        &self,
        uri: &Url,
        role: Option<&str>,
        expected: &EntityKind,
    ) -> Result<ResolvedEntity, ResolveError>;
}

/// Reads `file://` URIs into memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileEntityLoader;

#[async_trait]
impl EntityLoader for FileEntityLoader {
    async fn load(
        &self,
        uri: &Url,
        _role: Option<&str>,
        expected: &EntityKind,
    ) -> Result<ResolvedEntity, ResolveError> {
        if let EntityKind::Other(kind) = expected {
            return Err(ResolveError::UnsupportedEntityType(kind.clone()));
        }
        if uri.scheme() != "file" {
            return Err(ResolveError::NotFound(uri.to_string()));
        }
        let path = uri
            .to_file_path()
            .map_err(|()| ResolveError::NotFound(uri.to_string()))?;

        debug!("Loading {}", path.display());
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(ResolvedEntity::Stream(ResourceStream::from_bytes(body))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(uri.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_loads_file_uri() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<schema/>").unwrap();
        let uri = Url::from_file_path(file.path()).unwrap();

        let entity = FileEntityLoader
            .load(&uri, None, &EntityKind::Stream)
            .await
            .unwrap();
        let body = entity.into_stream().unwrap().bytes().await.unwrap();
        assert_eq!(&body[..], b"<schema/>");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Url::from_file_path(dir.path().join("missing.xml")).unwrap();

        let err = FileEntityLoader
            .load(&uri, None, &EntityKind::Stream)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_kinds_are_unsupported() {
        let uri = Url::parse("file:///tmp/a.xml").unwrap();
        let err = FileEntityLoader
            .load(&uri, Some("dtd"), &EntityKind::Other("document".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedEntityType(kind) if kind == "document"));
    }

    #[tokio::test]
    async fn test_other_schemes_are_not_found() {
        let uri = Url::parse("ftp://files.example.com/a.xml").unwrap();
        let err = FileEntityLoader
            .load(&uri, None, &EntityKind::Stream)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }
}
