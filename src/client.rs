//! Client Module
//!
//! Requests a single file from a Felix server and saves it locally.

use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::{FelixError, Result};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Size of each chunk copied from the socket to the output file
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Client for one server address
pub struct FileClient {
    server_addr: String,
}

impl FileClient {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
        }
    }

    /// Fetch `filename` and return its content
    pub async fn fetch(&self, filename: &str) -> Result<Vec<u8>> {
        let (mut stream, header) = self.request(filename).await?;

        let len = usize::try_from(header.filesize).map_err(|_| {
            FelixError::ProtocolError(format!("File too large: {} bytes", header.filesize))
        })?;
        let mut content = vec![0u8; len];
        stream.read_exact(&mut content).await.map_err(|e| {
            FelixError::ProtocolError(format!(
                "Connection closed before {} content bytes arrived: {}",
                len, e
            ))
        })?;

        Ok(content)
    }

    /// Fetch `filename` and stream it into `output`, returning the byte count.
    ///
    /// A transfer that fails part way removes `output` again.
    pub async fn fetch_to_file(&self, filename: &str, output: &Path) -> Result<u64> {
        let (mut stream, header) = self.request(filename).await?;

        let mut file = tokio::fs::File::create(output).await.map_err(|e| {
            FelixError::IoError(format!("Cannot create '{}': {}", output.display(), e))
        })?;

        let copied = copy_content(&mut stream, &mut file, header.filesize).await;
        drop(file);

        let total = match copied {
            Ok(total) => total,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(output).await {
                    warn!(
                        "Cannot remove partial file '{}': {}",
                        output.display(),
                        remove_err
                    );
                }
                return Err(e);
            }
        };

        info!("Saved '{}' to {} ({} bytes)", filename, output.display(), total);
        Ok(total)
    }

    async fn request(&self, filename: &str) -> Result<(TcpStream, ServerMessage)> {
        let mut stream = TcpStream::connect(&self.server_addr).await.map_err(|e| {
            FelixError::IoError(format!("Cannot connect to '{}': {}", self.server_addr, e))
        })?;
        debug!("Connected to '{}'", self.server_addr);

        let request = ClientMessage {
            filename: filename.to_string(),
        };
        protocol::write_frame(&mut stream, &request).await?;

        let header: ServerMessage = protocol::read_frame(&mut stream).await?;
        if !header.success {
            return Err(FelixError::InvalidRequest(format!(
                "Server cannot serve '{}'",
                filename
            )));
        }

        Ok((stream, header))
    }
}

/// Copy exactly `filesize` bytes from `reader` to `writer`
async fn copy_content<R, W>(reader: &mut R, writer: &mut W, filesize: u64) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total: u64 = 0;
    while total < filesize {
        let want = (filesize - total).min(COPY_CHUNK_SIZE as u64) as usize;
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(FelixError::ProtocolError(format!(
                "Connection closed after {} of {} bytes",
                total, filesize
            )));
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_content_exact_length() {
        let source = vec![7u8; COPY_CHUNK_SIZE * 2 + 5];
        let mut out = Vec::new();

        let copied = copy_content(&mut &source[..], &mut out, source.len() as u64)
            .await
            .unwrap();

        assert_eq!(copied, source.len() as u64);
        assert_eq!(out, source);
    }

    #[tokio::test]
    async fn test_copy_content_short_stream() {
        let source = b"only ten b".to_vec();
        let mut out = Vec::new();

        let result = copy_content(&mut &source[..], &mut out, 100).await;
        assert!(matches!(result, Err(FelixError::ProtocolError(_))));
    }
}
