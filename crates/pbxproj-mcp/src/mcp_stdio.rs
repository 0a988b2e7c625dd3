use rmcp::{
    RoleServer,
    service::{RxJsonRpcMessage, TxJsonRpcMessage},
    transport::Transport,
};
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Mutex,
    time::{Duration, sleep},
};

/// Wire framing, fixed by the first bytes the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Framing {
    Unknown = 0,
    Ndjson = 1,
    ContentLength = 2,
}

impl Framing {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Framing::Ndjson,
            2 => Framing::ContentLength,
            _ => Framing::Unknown,
        }
    }

    fn detect(buf: &[u8]) -> Option<Self> {
        let trimmed = trim_leading_ascii_ws(buf);
        match trimmed.first()? {
            b'{' | b'[' => Some(Framing::Ndjson),
            _ if starts_with_ascii_case(trimmed, b"content-length:") => {
                Some(Framing::ContentLength)
            }
            _ => None,
        }
    }
}

/// Stdio transport that answers in whichever framing the client used:
/// newline-delimited JSON or `Content-Length` headers.
pub struct HybridStdioTransport {
    reader: tokio::io::Stdin,
    writer: Arc<Mutex<tokio::io::Stdout>>,
    framing: Arc<AtomicU8>,
    buf: Vec<u8>,
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

impl HybridStdioTransport {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::stdin(),
            writer: Arc::new(Mutex::new(tokio::io::stdout())),
            framing: Arc::new(AtomicU8::new(Framing::Unknown as u8)),
            buf: Vec::with_capacity(16 * 1024),
        }
    }

    fn framing(&self) -> Framing {
        Framing::from_u8(self.framing.load(Ordering::Relaxed))
    }

    fn next_frame(&mut self, framing: Framing) -> io::Result<Option<Vec<u8>>> {
        match framing {
            Framing::ContentLength => take_content_length_frame(&mut self.buf),
            Framing::Ndjson | Framing::Unknown => Ok(take_line(&mut self.buf)),
        }
    }

    fn decode(&mut self, framing: Framing) -> io::Result<Option<RxJsonRpcMessage<RoleServer>>> {
        let Some(body) = self.next_frame(framing)? else {
            return Ok(None);
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| invalid(format!("invalid MCP message JSON: {e}")))
    }
}

impl Default for HybridStdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport<RoleServer> for HybridStdioTransport {
    type Error = io::Error;

    fn send(
        &mut self,
        item: TxJsonRpcMessage<RoleServer>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let writer = self.writer.clone();
        let framing = self.framing.clone();
        async move {
            let payload = serde_json::to_vec(&item)
                .map_err(|e| invalid(format!("failed to encode MCP response JSON: {e}")))?;
            let mut out = writer.lock().await;
            if Framing::from_u8(framing.load(Ordering::Relaxed)) == Framing::ContentLength {
                let header = format!("Content-Length: {}\r\n\r\n", payload.len());
                out.write_all(header.as_bytes()).await?;
                out.write_all(&payload).await?;
            } else {
                out.write_all(&payload).await?;
                out.write_all(b"\n").await?;
            }
            out.flush().await
        }
    }

    async fn receive(&mut self) -> Option<RxJsonRpcMessage<RoleServer>> {
        loop {
            let mut framing = self.framing();
            if framing == Framing::Unknown
                && let Some(detected) = Framing::detect(&self.buf)
            {
                tracing::debug!(framing = ?detected, "mcp framing detected");
                self.framing.store(detected as u8, Ordering::Relaxed);
                framing = detected;
            }
            if framing != Framing::Unknown {
                match self.decode(framing) {
                    Ok(Some(msg)) => return Some(msg),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "mcp transport decode error; dropping buffer");
                        self.buf.clear();
                    }
                }
            }

            let mut tmp = [0u8; 8192];
            let n = match self.reader.read(&mut tmp).await {
                Ok(n) => n,
                Err(err) if is_retryable_read_error(&err) => {
                    sleep(Duration::from_millis(2)).await;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "mcp transport read error");
                    return None;
                }
            };
            if n == 0 {
                // EOF; a final line may lack its newline
                if self.framing() != Framing::ContentLength && !self.buf.is_empty() {
                    self.buf.push(b'\n');
                }
                return self.decode(self.framing()).ok().flatten();
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        let mut out = self.writer.lock().await;
        out.flush().await
    }
}

/// Next non-blank line without its terminator.
fn take_line(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    loop {
        let newline = buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = buf.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            return Some(line);
        }
    }
}

fn take_content_length_frame(buf: &mut Vec<u8>) -> io::Result<Option<Vec<u8>>> {
    let Some((header_end, sep_len)) = find_header_end(buf) else {
        return Ok(None);
    };
    let headers = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| invalid(format!("invalid Content-Length header utf8: {e}")))?;
    let mut content_length = None;
    for line in headers.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((k, v)) = line.split_once(':')
            && k.trim().eq_ignore_ascii_case("content-length")
        {
            let n: usize = v
                .trim()
                .parse()
                .map_err(|e| invalid(format!("invalid Content-Length value: {e}")))?;
            content_length = Some(n);
        }
    }
    let content_length = content_length
        .ok_or_else(|| invalid("missing Content-Length header in MCP frame".to_string()))?;

    let body_start = header_end + sep_len;
    let body_end = body_start
        .checked_add(content_length)
        .ok_or_else(|| invalid(format!("Content-Length {content_length} is out of range")))?;
    if buf.len() < body_end {
        return Ok(None);
    }
    let body = buf[body_start..body_end].to_vec();
    buf.drain(..body_end);
    Ok(Some(body))
}

fn starts_with_ascii_case(haystack: &[u8], needle_lower: &[u8]) -> bool {
    haystack.len() >= needle_lower.len()
        && haystack
            .iter()
            .zip(needle_lower)
            .all(|(a, b)| a.to_ascii_lowercase() == *b)
}

fn trim_leading_ascii_ws(buf: &[u8]) -> &[u8] {
    let start = buf
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(buf.len());
    &buf[start..]
}

fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    find_subslice(buf, b"\r\n\r\n")
        .map(|i| (i, 4))
        .or_else(|| find_subslice(buf, b"\n\n").map(|i| (i, 2)))
}

fn find_subslice(buf: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || buf.len() < needle.len() {
        return None;
    }
    buf.windows(needle.len()).position(|w| w == needle)
}

fn is_retryable_read_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_is_detected_from_first_bytes() {
        assert_eq!(Framing::detect(b"  {\"jsonrpc\""), Some(Framing::Ndjson));
        assert_eq!(
            Framing::detect(b"\r\nContent-Length: 12\r\n"),
            Some(Framing::ContentLength)
        );
        assert_eq!(Framing::detect(b"   "), None);
        assert_eq!(Framing::detect(b"hello"), None);
    }

    #[test]
    fn lines_skip_blanks_and_strip_crlf() {
        let mut buf = b"\r\n  \n{\"a\":1}\r\n{\"b\"".to_vec();
        assert_eq!(take_line(&mut buf), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(buf, b"{\"b\"".to_vec());
    }

    #[test]
    fn content_length_frames_wait_for_full_body() {
        let mut buf = b"Content-Length: 7\r\n\r\n{\"a\":".to_vec();
        assert!(take_content_length_frame(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"1}Content-Length: 2\n\n{}");
        assert_eq!(
            take_content_length_frame(&mut buf).unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
        assert_eq!(
            take_content_length_frame(&mut buf).unwrap(),
            Some(b"{}".to_vec())
        );
        assert!(buf.is_empty());

        let mut bad = b"Content-Type: json\r\n\r\n{}".to_vec();
        assert!(take_content_length_frame(&mut bad).is_err());
    }

    #[test]
    fn oversized_content_length_is_rejected() {
        let mut buf = format!("Content-Length: {}\r\n\r\n{{}}", usize::MAX).into_bytes();
        let err = take_content_length_frame(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn retryable_read_errors_cover_wouldblock_and_interrupted() {
        assert!(is_retryable_read_error(&io::Error::from(
            io::ErrorKind::WouldBlock
        )));
        assert!(is_retryable_read_error(&io::Error::from(
            io::ErrorKind::Interrupted
        )));
        assert!(!is_retryable_read_error(&io::Error::from(
            io::ErrorKind::BrokenPipe
        )));
    }
}
