use tokio::net::TcpStream;
use tracing::debug;

use super::{bare_host, ProbeError, TestContext};
use crate::types::{Socket, TestResult};

/// Plain TCP connect: pass once the handshake completes. No data is exchanged
/// and the stream is dropped right away.
pub async fn run_test(ctx: &TestContext, socket: Socket) -> TestResult {
    let host = bare_host(&socket.host);
    let addr = format!("{}:{}", socket.host.trim(), socket.port);
    match ctx.run(TcpStream::connect((host, socket.port))).await {
        Ok(Ok(stream)) => {
            debug!(%addr, peer = ?stream.peer_addr().ok(), "tcp connect ok");
            drop(stream);
            TestResult::passed(socket, None)
        }
        Ok(Err(e)) => TestResult::failed(
            socket,
            None,
            ProbeError::Dial {
                addr,
                message: e.to_string(),
            },
        ),
        Err(e) => TestResult::failed(socket, None, e),
    }
}
