//! ICAP Request Parser
//!
//! Streaming parser for one ICAP request and its encapsulated HTTP message.
//! Sections named in the `Encapsulated` header are read in order; the
//! numeric offsets are accepted but not relied upon.
//!
//! ```text
//! REQMOD icap://host/service ICAP/1.0\r\n
//! Encapsulated: req-hdr=0, req-body=120\r\n
//! \r\n
//! POST /pay HTTP/1.1\r\n
//! Content-Type: application/json\r\n
//! Transfer-Encoding: chunked\r\n
//! \r\n
//! 1b\r\n{"card_number":"tok_..."}\r\n
//! 0\r\n\r\n
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{IcapError, IcapResult};

/// Longest accepted protocol line, terminator included
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// `METHOD URI VERSION`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

impl RequestLine {
    /// Split on whitespace; fewer than three tokens is malformed
    pub fn parse(line: &str) -> IcapResult<Self> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(uri), Some(version)) => Ok(Self {
                method: method.to_string(),
                uri: uri.to_string(),
                version: version.to_string(),
            }),
            _ => Err(IcapError::MalformedRequestLine(line.to_string())),
        }
    }
}

/// ICAP header fields in arrival order
///
/// Names compare case-insensitively; a repeated name overwrites the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcapHeaders {
    entries: Vec<(String, String)>,
}

impl IcapHeaders {
    pub fn insert(&mut self, name: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Sections announced by the `Encapsulated` header
    pub fn encapsulated(&self) -> IcapResult<Encapsulated> {
        self.get("Encapsulated")
            .map(Encapsulated::parse)
            .ok_or(IcapError::MissingEncapsulated)
    }
}

/// Which encapsulated sections are present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encapsulated {
    pub req_hdr: bool,
    pub req_body: bool,
    pub res_hdr: bool,
    pub res_body: bool,
    pub null_body: bool,
}

impl Encapsulated {
    /// Parse `req-hdr=0, req-body=120`; unknown section names are ignored
    pub fn parse(value: &str) -> Self {
        let mut sections = Self::default();
        for entry in value.split(',') {
            let name = entry.split('=').next().unwrap_or_default().trim();
            match name.to_ascii_lowercase().as_str() {
                "req-hdr" => sections.req_hdr = true,
                "req-body" => sections.req_body = true,
                "res-hdr" => sections.res_hdr = true,
                "res-body" => sections.res_body = true,
                "null-body" => sections.null_body = true,
                _ => {}
            }
        }
        sections
    }

    pub fn has_body(&self) -> bool {
        self.req_body || self.res_body
    }
}

/// Encapsulated HTTP start line and raw header lines
///
/// Header lines are kept verbatim, in order and with original casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHead {
    pub start_line: String,
    pub header_lines: Vec<String>,
}

impl HttpHead {
    /// First header value named `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_lines.iter().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }

    /// Declared length; unparsable values count as absent
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }
}

/// HTTP message carried by one ICAP transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncapsulatedMessage {
    pub request_head: Option<HttpHead>,
    pub response_head: Option<HttpHead>,
    pub body: Vec<u8>,
}

impl EncapsulatedMessage {
    /// Content type of the body, preferring the response head
    pub fn content_type(&self) -> Option<&str> {
        self.response_head
            .as_ref()
            .and_then(HttpHead::content_type)
            .or_else(|| self.request_head.as_ref().and_then(HttpHead::content_type))
    }
}

/// Read one CRLF/LF terminated line without its terminator
///
/// Returns `None` on a clean end of stream.
pub async fn read_line<R>(reader: &mut R) -> IcapResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && read == MAX_LINE_LEN {
        return Err(IcapError::LineTooLong(MAX_LINE_LEN));
    }

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

async fn read_required_line<R>(reader: &mut R) -> IcapResult<String>
where
    R: AsyncBufRead + Unpin,
{
    read_line(reader).await?.ok_or(IcapError::UnexpectedEof)
}

/// Read `Name: value` lines up to the blank line
pub async fn read_icap_headers<R>(reader: &mut R) -> IcapResult<IcapHeaders>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = IcapHeaders::default();
    loop {
        let line = read_required_line(reader).await?;
        if line.is_empty() {
            return Ok(headers);
        }
        match line.split_once(':') {
            Some((name, value)) => headers.insert(name.trim(), value.trim()),
            None => tracing::debug!(line = %line, "Ignoring ICAP header line without colon"),
        }
    }
}

/// Read an HTTP start line and its header lines
pub async fn read_http_head<R>(reader: &mut R) -> IcapResult<HttpHead>
where
    R: AsyncBufRead + Unpin,
{
    let start_line = read_required_line(reader).await?;
    let mut header_lines = Vec::new();
    loop {
        let line = read_required_line(reader).await?;
        if line.is_empty() {
            return Ok(HttpHead {
                start_line,
                header_lines,
            });
        }
        header_lines.push(line);
    }
}

/// Decode a chunked body up to and including the trailer
pub async fn read_chunked<R>(reader: &mut R, limit: usize) -> IcapResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let line = read_required_line(reader).await?;
        let size_field = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| IcapError::InvalidChunkSize(line.clone()))?;

        if size == 0 {
            // trailer fields, if any, end at a blank line
            while let Some(trailer) = read_line(reader).await? {
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(body);
        }

        if body.len().saturating_add(size) > limit {
            return Err(IcapError::BodyTooLarge { limit });
        }
        read_exact_into(reader, &mut body, size).await?;
        read_required_line(reader).await?;
    }
}

/// Read exactly `len` bytes of fixed-length body
pub async fn read_fixed<R>(reader: &mut R, len: usize, limit: usize) -> IcapResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    if len > limit {
        return Err(IcapError::BodyTooLarge { limit });
    }
    let mut body = Vec::with_capacity(len);
    read_exact_into(reader, &mut body, len).await?;
    Ok(body)
}

async fn read_exact_into<R>(reader: &mut R, body: &mut Vec<u8>, len: usize) -> IcapResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let start = body.len();
    body.resize(start + len, 0);
    reader
        .read_exact(&mut body[start..])
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => IcapError::UnexpectedEof,
            _ => IcapError::Io(e),
        })?;
    Ok(())
}

/// Read the sections announced in `sections`, in wire order
///
/// Body framing follows the most recently read HTTP head: chunked when it
/// says `Transfer-Encoding: chunked`, otherwise exactly `Content-Length`
/// bytes, otherwise empty.
pub async fn read_encapsulated<R>(
    reader: &mut R,
    sections: Encapsulated,
    limit: usize,
) -> IcapResult<EncapsulatedMessage>
where
    R: AsyncBufRead + Unpin,
{
    let request_head = if sections.req_hdr {
        Some(read_http_head(reader).await?)
    } else {
        None
    };
    let response_head = if sections.res_hdr {
        Some(read_http_head(reader).await?)
    } else {
        None
    };

    let body = if sections.has_body() {
        match response_head.as_ref().or(request_head.as_ref()) {
            Some(head) if head.is_chunked() => read_chunked(reader, limit).await?,
            Some(head) => match head.content_length() {
                Some(len) if len > 0 => read_fixed(reader, len, limit).await?,
                _ => Vec::new(),
            },
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    Ok(EncapsulatedMessage {
        request_head,
        response_head,
        body,
    })
}
