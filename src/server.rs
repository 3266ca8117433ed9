//! File Server Module
//!
//! TCP accept loop and per-connection request handling. The server resolves a
//! requested name beneath its root directory, stats it, and hands the snapshot
//! to the shared `FileCache`. Content is fetched before the response header is
//! written, so a failed read becomes a plain `success: false` response.

use crate::config::ServerConfig;
use crate::file_cache::FileCache;
use crate::file_metadata::FileMetadata;
use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::shutdown::ShutdownSignal;
use crate::{FelixError, Result};
use bytes::Bytes;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// State shared by every connection handler
struct ServeContext {
    root_dir: PathBuf,
    file_cache: Arc<FileCache>,
    request_timeout: Duration,
}

/// TCP file server
pub struct FileServer {
    listener: TcpListener,
    context: Arc<ServeContext>,
    connection_limit: Arc<Semaphore>,
}

impl FileServer {
    /// Bind the listener described by `config`
    pub async fn bind(config: &ServerConfig, file_cache: Arc<FileCache>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await.map_err(|e| {
            FelixError::IoError(format!("Cannot listen at '{}': {}", config.listen_addr, e))
        })?;

        let root_dir = tokio::fs::canonicalize(&config.root_dir).await.map_err(|e| {
            FelixError::ConfigError(format!(
                "Cannot use root directory '{}': {}",
                config.root_dir.display(),
                e
            ))
        })?;

        info!(
            "Serving {} on {} (max connections: {})",
            root_dir.display(),
            listener.local_addr()?,
            config.max_concurrent_connections
        );

        Ok(Self {
            listener,
            context: Arc::new(ServeContext {
                root_dir,
                file_cache,
                request_timeout: config.request_timeout,
            }),
            connection_limit: Arc::new(Semaphore::new(config.max_concurrent_connections)),
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown is signalled.
    ///
    /// A connection slot is claimed before accepting, so with every slot busy
    /// the loop still wakes up for shutdown.
    pub async fn run(self, mut shutdown_signal: ShutdownSignal) -> Result<()> {
        loop {
            let permit = tokio::select! {
                permit = self.connection_limit.clone().acquire_owned() => {
                    permit.map_err(|e| FelixError::SystemError(format!("Connection limiter closed: {}", e)))?
                }
                _ = shutdown_signal.wait_for_shutdown() => {
                    info!("File server received shutdown signal while at connection limit");
                    break;
                }
            };

            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, client_addr)) => {
                            let context = self.context.clone();
                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, client_addr, context).await {
                                    warn!("Connection from {} failed: {}", client_addr, e);
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_signal.wait_for_shutdown() => {
                    info!("File server received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        info!("File server stopped");
        Ok(())
    }

    /// Serve one request on `stream`
    async fn handle_connection(
        mut stream: TcpStream,
        client_addr: SocketAddr,
        context: Arc<ServeContext>,
    ) -> Result<()> {
        debug!("Client connected: {}", client_addr);
        let start_time = Instant::now();

        let request: ClientMessage =
            match tokio::time::timeout(context.request_timeout, protocol::read_frame(&mut stream))
                .await
            {
                Ok(request) => request?,
                Err(_) => {
                    return Err(FelixError::TimeoutError(format!(
                        "No request from {} within {:?}",
                        client_addr, context.request_timeout
                    )));
                }
            };

        let response = match Self::fetch(&context, &request.filename).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Cannot serve '{}' to {}: {}", request.filename, client_addr, e);
                None
            }
        };

        // A client that stops reading must not hold its connection slot forever
        match tokio::time::timeout(
            context.request_timeout,
            Self::write_response(&mut stream, response.as_ref()),
        )
        .await
        {
            Ok(written) => written?,
            Err(_) => {
                return Err(FelixError::TimeoutError(format!(
                    "Response to {} not delivered within {:?}",
                    client_addr, context.request_timeout
                )));
            }
        }

        let Some(content) = response else {
            return Ok(());
        };

        info!(
            "Served '{}' to {} ({} bytes in {:.1}ms)",
            request.filename,
            client_addr,
            content.len(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Write the response header and, when found, the content
    async fn write_response(stream: &mut TcpStream, content: Option<&Bytes>) -> Result<()> {
        match content {
            Some(content) => {
                protocol::write_frame(stream, &ServerMessage::found(content.len() as u64)).await?;
                stream.write_all(content).await?;
                stream.flush().await?;
            }
            None => {
                protocol::write_frame(stream, &ServerMessage::not_found()).await?;
            }
        }
        stream.shutdown().await?;
        Ok(())
    }

    /// Resolve, stat and retrieve the requested file
    async fn fetch(context: &ServeContext, filename: &str) -> Result<Bytes> {
        let path = resolve_path(&context.root_dir, filename)?;
        let metadata = FileMetadata::stat(&path).await?;
        context.file_cache.retrieve_file(&metadata).await
    }
}

/// Resolve a requested name beneath `root`.
///
/// Only plain relative names are accepted: absolute paths and `..` components
/// are refused so requests cannot escape the served directory.
pub fn resolve_path(root: &Path, filename: &str) -> Result<PathBuf> {
    let requested = Path::new(filename);
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in requested.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FelixError::InvalidRequest(format!(
                    "Path escapes served directory: '{}'",
                    filename
                )));
            }
        }
    }

    if depth == 0 {
        return Err(FelixError::InvalidRequest(format!(
            "Empty file name: '{}'",
            filename
        )));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_names() {
        let root = Path::new("/srv/files");

        assert_eq!(
            resolve_path(root, "a.txt").unwrap(),
            PathBuf::from("/srv/files/a.txt")
        );
        assert_eq!(
            resolve_path(root, "./docs/b.txt").unwrap(),
            PathBuf::from("/srv/files/docs/b.txt")
        );
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let root = Path::new("/srv/files");

        assert!(resolve_path(root, "../etc/passwd").is_err());
        assert!(resolve_path(root, "docs/../../x").is_err());
        assert!(resolve_path(root, "/etc/passwd").is_err());
        assert!(resolve_path(root, "").is_err());
        assert!(resolve_path(root, ".").is_err());
    }
}
