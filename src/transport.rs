#![deny(warnings)]

// Message framing for the stdio transport

use crate::error::{Result, TransportError};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    Stdin, Stdout,
};

/// Largest `Content-Length` body accepted from a peer
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Decided by the first message read
    Auto,
    /// One JSON message per line
    Newline,
    /// `Content-Length: N\r\n\r\n<json bytes>` (LSP style)
    ContentLength,
}

fn trim_crlf(s: &str) -> &str {
    s.trim_end_matches(&['\r', '\n'][..])
}

fn parse_content_length_header(line: &str) -> Option<usize> {
    let line = trim_crlf(line).trim();
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}

/// Reads and writes JSON-RPC messages over any byte stream pair.
/// Replies use whatever framing the peer was detected to speak.
pub struct FramedTransport<R, W> {
    reader: R,
    writer: W,
    framing: Framing,
}

/// The transport the server runs on: process stdin/stdout
pub type StdioTransport = FramedTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        FramedTransport::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            framing: Framing::Auto,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Read the next message. Returns `ConnectionClosed` at end of input.
    pub async fn read_message(&mut self) -> Result<String> {
        match self.framing {
            Framing::Auto => self.read_auto().await,
            Framing::Newline => self.read_newline().await,
            Framing::ContentLength => {
                let first = self.read_line().await?;
                self.read_content_length_body(&first).await
            }
        }
    }

    /// Write one message in the detected framing (newline until detected)
    pub async fn write_message(&mut self, message: &str) -> Result<()> {
        let bytes = message.as_bytes();
        if self.framing == Framing::ContentLength {
            let header = format!("Content-Length: {}\r\n\r\n", bytes.len());
            self.write_all(header.as_bytes()).await?;
            self.write_all(bytes).await?;
        } else {
            self.write_all(bytes).await?;
            self.write_all(b"\n").await?;
        }
        self.writer.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(TransportError::Io)?;
        Ok(())
    }

    /// One raw line without its line ending
    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(TransportError::Io)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed.into());
        }
        Ok(trim_crlf(&line).to_string())
    }

    async fn read_newline(&mut self) -> Result<String> {
        self.read_line().await
    }

    async fn read_auto(&mut self) -> Result<String> {
        loop {
            let line = self.read_line().await?;
            if line.trim().is_empty() {
                continue;
            }

            if parse_content_length_header(&line).is_some() {
                self.framing = Framing::ContentLength;
                tracing::debug!("stdio framing: content-length");
                return self.read_content_length_body(&line).await;
            }

            self.framing = Framing::Newline;
            tracing::debug!("stdio framing: newline");
            return Ok(line);
        }
    }

    async fn read_content_length_body(&mut self, first: &str) -> Result<String> {
        let content_length = parse_content_length_header(first).ok_or_else(|| {
            TransportError::InvalidMessage(format!(
                "Expected Content-Length header, got: {}",
                first
            ))
        })?;
        if content_length > MAX_MESSAGE_BYTES {
            return Err(TransportError::InvalidMessage(format!(
                "Content-Length {} exceeds the {} byte limit",
                content_length, MAX_MESSAGE_BYTES
            ))
            .into());
        }

        // Remaining headers end at a blank line
        loop {
            if self.read_line().await?.is_empty() {
                break;
            }
        }

        let mut buf = vec![0u8; content_length];
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(TransportError::Io)?;

        String::from_utf8(buf).map_err(|e| {
            TransportError::InvalidMessage(format!("Invalid UTF-8 in JSON-RPC message: {}", e))
                .into()
        })
    }
}
