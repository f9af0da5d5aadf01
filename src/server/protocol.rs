//! Wire format between the CLI and the embedding daemon.
//!
//! Every message is a big-endian `u32` length followed by that many bytes of
//! JSON. A connection carries any number of request/response pairs.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DaemonError;

/// Frames larger than this are rejected before allocation.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Shutdown,
    Status,
    Embed(EmbedRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
    pub is_query: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    ShutdownAck,
    Status(StatusResponse),
    Embed(EmbedResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub pid: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub idle_secs: u64,
    pub idle_timeout_secs: u64,
    pub requests_served: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            message: message.into(),
        })
    }
}

pub fn encode_message(msg: &impl Serialize) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    let len = (json.len() as u32).to_be_bytes();
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len);
    buf.extend_from_slice(&json);
    Ok(buf)
}

pub fn decode_length(buf: &[u8; 4]) -> usize {
    u32::from_be_bytes(*buf) as usize
}

pub async fn write_frame<W>(writer: &mut W, msg: &impl Serialize) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_message(msg).map_err(|e| DaemonError::ProtocolError(e.to_string()))?;
    writer
        .write_all(&encoded)
        .await
        .map_err(|e| DaemonError::SocketError(e.to_string()))
}

/// Read one frame body. `Ok(None)` means the peer closed the connection
/// between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, DaemonError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(DaemonError::SocketError(e.to_string())),
    }

    let len = decode_length(&len_buf);
    if len > MAX_FRAME_LEN {
        return Err(DaemonError::ProtocolError(format!(
            "frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}"
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| DaemonError::SocketError(e.to_string()))?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tagging() {
        let json = serde_json::to_string(&Request::Embed(EmbedRequest {
            texts: vec!["hi".into()],
            is_query: true,
        }))
        .unwrap();
        assert_eq!(json, r#"{"type":"embed","texts":["hi"],"is_query":true}"#);

        let ping: Request = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, Request::Ping));
    }

    #[test]
    fn test_encode_prefixes_length() {
        let encoded = encode_message(&Response::Pong).unwrap();
        let len = decode_length(&[encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len, encoded.len() - 4);
        assert_eq!(&encoded[4..], br#"{"type":"pong"}"#);
    }

    #[tokio::test]
    async fn test_frames_over_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, &Request::Status).await.unwrap();
        write_frame(&mut client, &Request::Shutdown).await.unwrap();
        drop(client);

        let first = read_frame(&mut server).await.unwrap().unwrap();
        assert!(matches!(
            serde_json::from_slice::<Request>(&first).unwrap(),
            Request::Status
        ));
        let second = read_frame(&mut server).await.unwrap().unwrap();
        assert!(matches!(
            serde_json::from_slice::<Request>(&second).unwrap(),
            Request::Shutdown
        ));
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes())
            .await
            .unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, DaemonError::ProtocolError(_)));
    }

    #[test]
    fn test_error_response() {
        let json = serde_json::to_string(&Response::error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"boom"}"#);
    }
}
