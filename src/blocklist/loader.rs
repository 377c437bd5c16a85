//! File-based blocklist loader.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{ParseError, parse_domain_list};

/// Error type for blocklist file loading operations.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    #[error("I/O error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// Task join error from spawning a blocking task.
    #[error("task join error")]
    Join(#[from] tokio::task::JoinError),
}

/// Loads blocklists from local files.
pub struct FileLoader;

impl FileLoader {
    /// Load a domain list from a local file.
    ///
    /// The file is read asynchronously and parsed in a blocking task, so
    /// large lists do not stall the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotFound`] or [`LoadError::PermissionDenied`]
    /// when the file cannot be opened, [`LoadError::Io`] for other read
    /// failures and [`LoadError::Parse`] for malformed content.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use nfq_dnsfilter::blocklist::loader::FileLoader;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let domains = FileLoader::load(Path::new("/etc/nfq-dnsfilter/blocklist.txt")).await?;
    /// println!("Loaded {} domains", domains.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load(path: &Path) -> Result<Vec<String>, LoadError> {
        let path_buf = path.to_path_buf();

        let mut file = File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(path_buf.clone()),
            std::io::ErrorKind::PermissionDenied => LoadError::PermissionDenied(path_buf.clone()),
            _ => LoadError::Io {
                path: path_buf.clone(),
                source: e,
            },
        })?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| LoadError::Io {
                path: path_buf.clone(),
                source: e,
            })?;

        let domains = tokio::task::spawn_blocking(move || {
            parse_domain_list(&mut BufReader::new(content.as_slice()))
        })
        .await?
        .map_err(|source| LoadError::Parse {
            path: path_buf.clone(),
            source,
        })?;

        debug!(path = %path_buf.display(), count = domains.len(), "Loaded blocklist file");
        Ok(domains)
    }

    /// Load several files and concatenate their entries in order.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be loaded.
    pub async fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<String>, LoadError> {
        let mut domains = Vec::new();
        for path in paths {
            domains.extend(Self::load(path.as_ref()).await?);
        }
        Ok(domains)
    }
}
