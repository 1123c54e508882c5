// Seam between the lifecycle layer and the broker engine proper.
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Per-connection entry point for the broker engine.
///
/// The lifecycle layer accepts sockets and hands each one to the installed
/// handler on its own task. Routing, protocol, and persistence semantics all
/// live behind this trait.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> BoxFuture<'static, ()>;
}

/// Default handler installed when no engine is plugged in.
///
/// Drains the peer until EOF and discards the bytes, so a started server is
/// genuinely connectable without carrying any protocol logic.
#[derive(Debug, Default)]
pub struct DiscardHandler;

impl ConnectionHandler for DiscardHandler {
    fn handle(&self, mut stream: TcpStream, peer: SocketAddr) -> BoxFuture<'static, ()> {
        async move {
            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(%peer, error = %err, "connection read failed");
                        break;
                    }
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn discard_handler_runs_to_eof() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await?;
            DiscardHandler.handle(stream, peer).await;
            Result::<()>::Ok(())
        });

        let mut client = TcpStream::connect(addr).await?;
        client.write_all(b"ignored payload").await?;
        drop(client);

        server.await??;
        Ok(())
    }
}
