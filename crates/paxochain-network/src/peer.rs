//! Length-prefixed framing of [`Envelope`]s over a `TcpStream`.
//!
//! Every frame is a 4-byte big-endian length prefix followed by a
//! version-tagged `bincode` payload (see `paxochain_types::codec`).

use paxochain_types::{decode_envelope, encode_envelope, Envelope};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{NetworkError, NetworkResult};

/// Frames larger than this are refused rather than trusted to allocate.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Read one length-prefixed envelope from `stream`.
///
/// Returns `Ok(None)` on a clean EOF (the peer closed the connection between
/// frames) rather than an error.
pub async fn read_envelope(stream: &mut TcpStream) -> NetworkResult<Option<Envelope>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(NetworkError::Unreachable(format!("invalid frame length {len}")));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    let envelope = decode_envelope(&buf)?;
    Ok(Some(envelope))
}

/// Write one length-prefixed envelope to `stream`.
pub async fn write_envelope(stream: &mut TcpStream, envelope: &Envelope) -> NetworkResult<()> {
    let bytes = encode_envelope(envelope)?;
    stream.write_all(&(bytes.len() as u32).to_be_bytes()).await?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxochain_primitives::NodeKind;
    use paxochain_types::{Message, ProcessId};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn envelope_round_trips_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_envelope(&mut stream).await.unwrap().unwrap()
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let sent = Envelope::new(ProcessId::new(NodeKind::Client, 2), Message::Quit);
        write_envelope(&mut client, &sent).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.sender.pid, 2);
        assert!(matches!(received.body, Message::Quit));
    }

    #[tokio::test]
    async fn clean_close_before_a_frame_is_not_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_envelope(&mut stream).await.unwrap()
        });

        let client = TcpStream::connect(addr).await.unwrap();
        drop(client);

        assert!(server.await.unwrap().is_none());
    }
}
