//! Build context assembly
//!
//! A build context is the byte stream submitted with an image build. A
//! directory is archived to tar+gzip on the fly; a gzip archive is passed
//! through unchanged. Anything else is rejected before the engine is called.
//!
//! The Docker client takes the request body as a single buffer, so
//! [`BuildContext::into_bytes`] holds the whole compressed context in memory
//! before submission. The archive pipe bounds only the archiver's own output.

use std::io::{self, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, ReadBuf};
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;
use tracing::debug;

use crate::error::{DockerError, Result};

/// Capacity of the pipe between the directory archiver and its reader
const ARCHIVE_PIPE_CAPACITY: usize = 64 * 1024;

/// Leading bytes of a deflate-compressed gzip stream
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// How a build context was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Directory archived to tar+gzip
    Directory,
    /// Gzip archive read verbatim
    Archive,
}

/// A single consumable build context stream
pub struct BuildContext {
    kind: ContextKind,
    path: PathBuf,
    reader: Pin<Box<dyn AsyncRead + Send>>,
    archiver: Option<JoinHandle<io::Result<()>>>,
}

impl BuildContext {
    /// Assemble the build context for a filesystem path
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        if metadata.is_dir() {
            Ok(Self::archive_directory(path))
        } else if metadata.is_file() {
            Self::open_archive(path).await
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is neither a directory nor a regular file", path.display()),
            )
            .into())
        }
    }

    fn archive_directory(path: &Path) -> Self {
        debug!("Archiving build context directory {}", path.display());

        let (reader, writer) = tokio::io::duplex(ARCHIVE_PIPE_CAPACITY);
        let bridge = SyncIoBridge::new(writer);
        let root = path.to_path_buf();
        let archiver = tokio::task::spawn_blocking(move || write_tar_gz(&root, bridge));

        Self {
            kind: ContextKind::Directory,
            path: path.to_path_buf(),
            reader: Box::pin(reader),
            archiver: Some(archiver),
        }
    }

    async fn open_archive(path: &Path) -> Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;

        let mut signature = [0u8; GZIP_MAGIC.len()];
        let mut filled = 0;
        while filled < signature.len() {
            let n = file.read(&mut signature[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if signature[..filled] != GZIP_MAGIC {
            return Err(DockerError::UnsupportedContext { path: path.to_path_buf() });
        }

        file.seek(SeekFrom::Start(0)).await?;
        debug!("Using gzip archive {} as build context", path.display());

        Ok(Self {
            kind: ContextKind::Archive,
            path: path.to_path_buf(),
            reader: Box::pin(file),
            archiver: None,
        })
    }

    /// How the context was produced
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// Path the context was assembled from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain the stream into memory, releasing the context
    ///
    /// For directories this also waits for the archiver and reports any
    /// error it hit while walking the tree.
    pub async fn into_bytes(mut self) -> Result<Bytes> {
        let mut data = Vec::new();
        let read = self.reader.read_to_end(&mut data).await;

        if let Some(archiver) = self.archiver.take() {
            archiver.await.map_err(|e| DockerError::StreamError {
                reason: format!("Build context archiver failed: {e}"),
            })??;
        }
        read?;

        debug!("Build context {} is {} bytes", self.path.display(), data.len());
        Ok(Bytes::from(data))
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for BuildContext {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

/// Write `root` as a gzip-compressed tar stream into `out`
fn write_tar_gz<W: Write>(root: &Path, out: W) -> io::Result<()> {
    let mut builder = tar::Builder::new(GzEncoder::new(out, Compression::default()));
    builder.follow_symlinks(false);
    builder.append_dir_all(".", root)?;

    let mut out = builder.into_inner()?.finish()?;
    out.flush()
}
