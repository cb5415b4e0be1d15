//! ICAP Server
//!
//! One request per connection, no pipelining. The reply is fully built
//! before anything is written back.
//!
//! ## Dispatch
//! - `OPTIONS`: static capability announcement
//! - `REQMOD`: body is leaving the network, tokens are resolved to card numbers
//! - `RESPMOD`: JSON is tokenized, HTML is detokenized, anything else gets a JSON attempt
//! - anything else: 405

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokenizer::{TokenizerResult, Transformed};

use crate::error::{IcapError, IcapResult};
use crate::handler::PayloadHandler;
use crate::parser::{
    EncapsulatedMessage, IcapHeaders, RequestLine, read_encapsulated, read_icap_headers,
    read_line,
};
use crate::response;

/// ICAP server configuration
#[derive(Debug, Clone)]
pub struct IcapConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Largest encapsulated body accepted
    pub max_body_bytes: usize,
    /// Connection count advertised to clients in OPTIONS
    pub max_connections: u32,
}

impl Default for IcapConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1344,
            max_body_bytes: 10 * 1024 * 1024,
            max_connections: 100,
        }
    }
}

impl IcapConfig {
    /// Create config for development (loopback only)
    pub fn development() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ..Default::default()
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    TokenizeJson,
    DetokenizeJson,
    DetokenizeHtml,
}

impl Transform {
    fn for_response(content_type: Option<&str>) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("text/html") {
            Transform::DetokenizeHtml
        } else {
            Transform::TokenizeJson
        }
    }
}

/// ICAP server
pub struct IcapServer<H>
where
    H: PayloadHandler,
{
    handler: Arc<H>,
    config: Arc<IcapConfig>,
}

impl<H> IcapServer<H>
where
    H: PayloadHandler + Sync + 'static,
{
    pub fn new(handler: Arc<H>, config: Arc<IcapConfig>) -> Self {
        Self { handler, config }
    }

    pub fn config(&self) -> &IcapConfig {
        &self.config
    }

    /// Accept connections forever, one task each
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> IcapResult<()> {
        tracing::info!(addr = %listener.local_addr()?, "ICAP server listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept ICAP connection");
                    continue;
                }
            };

            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    tracing::debug!(peer = %peer, error = %e, "ICAP connection ended with error");
                }
            });
        }
    }

    /// Serve exactly one request on `io`, then close it
    pub async fn handle_connection<IO>(&self, io: IO) -> IcapResult<()>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut stream = BufReader::new(io);

        let reply = match self.process(&mut stream).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(()),
            Err(e) if e.is_silent() => {
                tracing::debug!(error = %e, "Closing connection without reply");
                return Ok(());
            }
            Err(e) => {
                e.log();
                response::error(e.kind())
            }
        };

        stream.write_all(&reply).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn process<R>(&self, reader: &mut R) -> IcapResult<Option<Vec<u8>>>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let Some(line) = read_line(reader).await? else {
            return Ok(None);
        };
        let request = RequestLine::parse(&line)?;
        let headers = read_icap_headers(reader).await?;

        tracing::debug!(
            method = %request.method,
            uri = %request.uri,
            headers = headers.len(),
            "ICAP request"
        );

        let reply = match request.method.as_str() {
            "OPTIONS" => response::options(self.config.max_connections),
            "REQMOD" => {
                let message = self.read_message(reader, &headers).await?;
                self.transform(&request, &message, Transform::DetokenizeJson)
                    .await
            }
            "RESPMOD" => {
                let message = self.read_message(reader, &headers).await?;
                let transform = Transform::for_response(message.content_type());
                self.transform(&request, &message, transform).await
            }
            other => return Err(IcapError::MethodNotAllowed(other.to_string())),
        };

        Ok(Some(reply))
    }

    async fn read_message<R>(
        &self,
        reader: &mut R,
        headers: &IcapHeaders,
    ) -> IcapResult<EncapsulatedMessage>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let sections = headers.encapsulated()?;
        read_encapsulated(reader, sections, self.config.max_body_bytes).await
    }

    async fn transform(
        &self,
        request: &RequestLine,
        message: &EncapsulatedMessage,
        transform: Transform,
    ) -> Vec<u8> {
        if message.body.is_empty() {
            return response::no_content();
        }
        let Ok(body) = std::str::from_utf8(&message.body) else {
            tracing::debug!(method = %request.method, "Non UTF-8 body passed through");
            return response::no_content();
        };

        let result: TokenizerResult<Transformed> = match transform {
            Transform::TokenizeJson => self.handler.tokenize_json(body).await,
            Transform::DetokenizeJson => self.handler.detokenize_json(body).await,
            Transform::DetokenizeHtml => self.handler.detokenize_html(body).await,
        };

        match result {
            Ok(out) if out.modified => {
                tracing::info!(
                    method = %request.method,
                    uri = %request.uri,
                    transform = ?transform,
                    bytes = out.body.len(),
                    "ICAP body rewritten"
                );
                response::modified(out.body.as_bytes())
            }
            Ok(_) => response::no_content(),
            Err(e) => {
                // The original content goes through untouched.
                e.log();
                response::no_content()
            }
        }
    }
}
