//! Stdio transport — reads JSON-RPC from stdin, writes to stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::notify::{ChannelSender, Outbound};
use crate::protocol::ProtocolHandler;
use crate::types::{McpError, McpResult};

use super::framing;

/// Stdio transport for desktop MCP clients.
///
/// Responses and notifications share stdout. The process has exactly one
/// peer, so notifications are written whichever client id they target.
pub struct StdioTransport {
    handler: Arc<ProtocolHandler>,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Run the transport loop — reads from stdin, writes to stdout.
    pub async fn run(&self) -> McpResult<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.serve(stdin, &mut stdout).await
    }

    async fn serve<R, W>(&self, reader: R, out: &mut W) -> McpResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (sender, mut outbound) = ChannelSender::channel();
        let notifications = self.handler.notifications();
        notifications.set_sender(Arc::new(sender)).await;

        let mut lines = reader.lines();
        tracing::info!("Stdio transport started (client {})", self.handler.client_id());

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.map_err(McpError::Io)? else {
                        tracing::info!("EOF on stdin, shutting down");
                        break;
                    };
                    self.handle_line(&line, out).await?;
                }
                Some(out_msg) = outbound.recv() => {
                    write_notification(out, &out_msg).await?;
                }
            }
        }

        while let Ok(out_msg) = outbound.try_recv() {
            write_notification(out, &out_msg).await?;
        }

        notifications.clear_sender().await;
        self.handler.disconnect().await;
        Ok(())
    }

    async fn handle_line<W>(&self, line: &str, out: &mut W) -> McpResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        if line.trim().is_empty() {
            return Ok(());
        }

        match framing::parse_message(line) {
            Ok(msg) => {
                if let Some(response) = self.handler.handle_message(msg).await {
                    write_line(out, &response).await?;
                }
            }
            Err(e) => {
                tracing::warn!("Parse error: {e}");
                let response = framing::parse_error_response(&e)?;
                write_line(out, &response).await?;
            }
        }
        Ok(())
    }
}

async fn write_notification<W>(out: &mut W, outbound: &Outbound) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    let value = serde_json::to_value(&outbound.notification)?;
    write_line(out, &value).await
}

async fn write_line<W>(out: &mut W, value: &serde_json::Value) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = framing::frame_message(value)?;
    out.write_all(framed.as_bytes())
        .await
        .map_err(McpError::Io)?;
    out.flush().await.map_err(McpError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::notes::NOTES_URI;
    use crate::catalog::BuiltinCatalog;
    use crate::config::ServerConfig;
    use serde_json::Value;

    #[tokio::test]
    async fn test_notifications_for_explicit_client_id_are_written() {
        let catalog = BuiltinCatalog::new("capstan-test", "0.0.1");
        let handler = ProtocolHandler::new(&catalog, ServerConfig::default()).unwrap();
        let transport = StdioTransport::new(handler);
        let handler = transport.handler.clone();

        let (mut client, server) = tokio::io::duplex(4096);
        let mut output: Vec<u8> = Vec::new();

        let drive = async {
            let subscribe = serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "resources/subscribe",
                "params": { "uri": NOTES_URI, "clientId": "other" }
            });
            client
                .write_all(format!("{subscribe}\n").as_bytes())
                .await
                .unwrap();
            loop {
                let subs = handler.subscriptions();
                if subs.lock().await.is_subscribed("other", NOTES_URI) {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(handler.notify_resource_changed(NOTES_URI).await, 1);
            drop(client);
        };

        let (served, ()) = tokio::join!(
            transport.serve(BufReader::new(server), &mut output),
            drive
        );
        served.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"], serde_json::json!({}));
        assert_eq!(lines[1]["method"], "notifications/resources/updated");
        assert_eq!(lines[1]["params"]["uri"], NOTES_URI);
    }
}
