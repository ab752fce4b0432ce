//! Input pump: forwards a local byte source to the peer as stdin frames.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::error::{ExecError, ExecResult};
use crate::frame::Frame;

/// Drain `source` into `conn` as [`Frame::StdinData`] chunks of at most
/// `chunk_size` bytes, then send a single [`Frame::StdinClose`].
///
/// Returns the number of payload bytes forwarded.
///
/// # Errors
///
/// Returns [`ExecError::Stdin`] if reading `source` fails, or the connection
/// error if a write fails. No close frame is sent in either case.
pub async fn pump<R>(conn: &Connection, mut source: R, chunk_size: usize) -> ExecResult<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;

    loop {
        let n = source
            .read(&mut buf)
            .await
            .map_err(|e| ExecError::Stdin(e.to_string()))?;
        if n == 0 {
            break;
        }

        let frame = Frame::StdinData(Bytes::copy_from_slice(&buf[..n]));
        conn.write_message(frame.encode()?).await?;
        total += n as u64;
        trace!(len = n, "forwarded stdin chunk");
    }

    conn.write_message(Frame::StdinClose.encode()?).await?;
    debug!(bytes = total, "stdin reached end of input");
    Ok(total)
}
