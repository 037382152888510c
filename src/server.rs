use crate::account::controller::AccountController;
use crate::constants::{API_PREFIX, BAD_REQUEST, NOT_FOUND};
use crate::req::Method::{DELETE, GET, PATCH, POST, PUT};
use crate::req::Request;
use crate::utils::api_error;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot::Receiver;
use tracing::{debug, error, info};

pub struct Server {
    controller: Arc<AccountController>,
    addr: String,
}

impl Server {
    pub fn new(controller: Arc<AccountController>, addr: impl Into<String>) -> Self {
        Self {
            controller,
            addr: addr.into(),
        }
    }

    pub async fn start(&self, mut shutdown_rx: Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        info!("Server running on http://{}", self.addr);

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    let (mut stream, peer) = conn?;

                    let controller = Arc::clone(&self.controller);

                    tokio::spawn(async move {
                        let (reader, writer) = stream.split();
                        if let Err(e) = Self::handle_client(reader, writer, &controller).await {
                            error!(%peer, "Connection error: {:#}", e);
                        }
                    });
                }
                // Shutdown signal check
                _ = &mut shutdown_rx => {
                    info!("Shutting down server...");
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn handle_client<Reader, Writer>(
        reader: Reader,
        mut writer: Writer,
        controller: &Arc<AccountController>,
    ) -> Result<()>
    where
        Reader: AsyncRead + Unpin,
        Writer: AsyncWrite + Unpin,
    {
        let (status_line, content) = match Request::new(reader).await {
            Ok(request) => Self::route(&request, controller).await,
            Err(e) => {
                debug!("unreadable request: {:#}", e);
                (BAD_REQUEST.to_string(), api_error("", "Malformed request", 400))
            }
        };

        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            content.len(),
            content
        );
        writer
            .write_all(response.as_bytes())
            .await
            .context("Failed to write")?;
        writer.flush().await.context("Failed to flush")
    }

    async fn route(request: &Request, controller: &AccountController) -> (String, String) {
        debug!(method = ?request.method, path = %request.path, "route");

        let Some(segments) = request.segments_after(API_PREFIX) else {
            return not_found(request);
        };

        match (&request.method, segments.as_slice()) {
            (POST, []) => controller.create_account(request).await,
            (POST, ["deposit"]) => controller.deposit(request).await,
            (POST, ["withdraw"]) => controller.withdraw(request).await,
            (POST, ["credit-limit"]) => controller.update_credit_limit(request).await,
            (GET, [id]) => controller.get_account(request, id).await,
            (GET, [id, "balance"]) => controller.get_balance(request, id).await,
            (GET, [id, "transactions"]) => controller.transaction_history(request, id).await,
            (PUT, [id, "activate"]) => controller.activate_account(request, id).await,
            (PUT, [id, "deactivate"]) => controller.deactivate_account(request, id).await,
            (PATCH, [id]) => controller.update_fields(request, id).await,
            (DELETE, [id]) => controller.delete_account(request, id).await,
            _ => not_found(request),
        }
    }
}

fn not_found(request: &Request) -> (String, String) {
    (
        NOT_FOUND.to_string(),
        api_error(&request.path, "404 Not Found", 404),
    )
}
