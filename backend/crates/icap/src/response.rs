//! ICAP Response Serialization
//!
//! Every reply is assembled in memory and written in one go, so a client
//! never sees a partial response.

use kernel::error::kind::ErrorKind;

/// Service description advertised by OPTIONS
pub const SERVICE: &str = "Card Tokenization ICAP Service";

/// Service tag; changes whenever transformation behaviour changes
pub const ISTAG: &str = "\"tokenizer-1.0\"";

/// Seconds an OPTIONS response may be cached
pub const OPTIONS_TTL_SECS: u32 = 3600;

/// Largest chunk emitted when re-framing a body
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Capability announcement for OPTIONS
pub fn options(max_connections: u32) -> Vec<u8> {
    format!(
        "ICAP/1.0 200 OK\r\n\
         Methods: REQMOD, RESPMOD\r\n\
         Service: {SERVICE}\r\n\
         ISTag: {ISTAG}\r\n\
         Max-Connections: {max_connections}\r\n\
         Options-TTL: {OPTIONS_TTL_SECS}\r\n\
         Allow: 204\r\n\
         Preview: 0\r\n\
         Transfer-Complete: *\r\n\
         Encapsulated: null-body=0\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Use the original message unchanged
pub fn no_content() -> Vec<u8> {
    format!(
        "ICAP/1.0 204 No Content\r\n\
         ISTag: {ISTAG}\r\n\
         Encapsulated: null-body=0\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Bodiless error reply
pub fn error(kind: ErrorKind) -> Vec<u8> {
    format!(
        "ICAP/1.0 {} {}\r\nEncapsulated: null-body=0\r\n\r\n",
        kind.status_code(),
        kind.as_str()
    )
    .into_bytes()
}

/// Rewritten message: a synthetic JSON HTTP response with a chunked body
pub fn modified(body: &[u8]) -> Vec<u8> {
    let http_head = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Length: {}\r\n\
         Content-Type: application/json\r\n\
         \r\n",
        body.len()
    );

    let mut out = format!(
        "ICAP/1.0 200 OK\r\n\
         ISTag: {ISTAG}\r\n\
         Encapsulated: res-hdr=0, res-body={}\r\n\
         \r\n",
        http_head.len()
    )
    .into_bytes();
    out.reserve(http_head.len() + body.len() + 32);
    out.extend_from_slice(http_head.as_bytes());
    write_chunked(&mut out, body);
    out
}

/// Append `body` in chunked transfer encoding, terminator included
pub fn write_chunked(out: &mut Vec<u8>, body: &[u8]) {
    for chunk in body.chunks(CHUNK_SIZE) {
        out.extend_from_slice(format!("{:X}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_chunked;

    fn text(bytes: &[u8]) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_options() {
        let reply = options(100);
        let reply = text(&reply);
        assert!(reply.starts_with("ICAP/1.0 200 OK\r\n"));
        assert!(reply.contains("Methods: REQMOD, RESPMOD\r\n"));
        assert!(reply.contains("Max-Connections: 100\r\n"));
        assert!(reply.contains("Preview: 0\r\n"));
        assert!(reply.ends_with("Encapsulated: null-body=0\r\n\r\n"));
    }

    #[test]
    fn test_no_content_and_error() {
        assert!(text(&no_content()).starts_with("ICAP/1.0 204 No Content\r\n"));
        assert_eq!(
            text(&error(ErrorKind::MethodNotAllowed)),
            "ICAP/1.0 405 Method Not Allowed\r\nEncapsulated: null-body=0\r\n\r\n"
        );
    }

    #[test]
    fn test_modified_layout() {
        let reply = modified(br#"{"a":1}"#);
        let reply = text(&reply);
        let (icap_head, rest) = reply.split_once("\r\n\r\n").unwrap();
        assert!(icap_head.starts_with("ICAP/1.0 200 OK"));

        let http_head =
            "HTTP/1.1 200 OK\r\nContent-Length: 7\r\nContent-Type: application/json\r\n\r\n";
        assert!(icap_head.ends_with(&format!("res-body={}", http_head.len())));
        assert_eq!(rest, format!("{http_head}7\r\n{{\"a\":1}}\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_write_chunked_empty() {
        let mut out = Vec::new();
        write_chunked(&mut out, b"");
        assert_eq!(out, b"0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_chunked_round_trip() {
        let large: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        for body in [Vec::new(), b"x".to_vec(), b"\r\n0\r\n\r\n".to_vec(), large] {
            let mut encoded = Vec::new();
            write_chunked(&mut encoded, &body);
            let mut input: &[u8] = &encoded;
            let decoded = read_chunked(&mut input, usize::MAX).await.unwrap();
            assert_eq!(decoded, body);
            assert!(input.is_empty());
        }
    }
}
