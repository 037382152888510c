use anyhow::{Context, Result};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl TryFrom<&str> for Method {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, anyhow::Error> {
        match value {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(anyhow::anyhow!("Method not supported")),
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Reads one HTTP/1.1 request: head up to the blank line, then `Content-Length` bytes of body.
    pub async fn new<R: AsyncRead + Unpin>(reader: R) -> Result<Self> {
        let mut reader = BufReader::new(reader);

        // Method and path
        let mut first = String::new();
        reader
            .read_line(&mut first)
            .await
            .context("Headline Error")?;
        let mut request_parts = first.split_whitespace();
        let method: Method = request_parts
            .next()
            .ok_or(anyhow::anyhow!("missing method"))
            .and_then(TryInto::try_into)
            .context("Missing Method")?;
        let target = request_parts.next().context("No Path")?;
        let path = target.split('?').next().unwrap_or(target);

        // Headers
        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line).await.context("Header Error")?;
            let line = line.trim_end();
            if read == 0 || line.is_empty() {
                break;
            }
            if let Some((k, v)) = line.split_once(':') {
                headers.insert(k.trim().to_lowercase(), v.trim().to_string());
            }
        }

        // Body
        let length = match headers.get("content-length") {
            Some(value) => value
                .parse::<usize>()
                .context("Invalid Content-Length")?,
            None => 0,
        };
        anyhow::ensure!(length <= MAX_BODY_BYTES, "Body too large: {} bytes", length);
        let mut body = vec![0; length];
        reader
            .read_exact(&mut body)
            .await
            .context("Truncated Body")?;

        Ok(Request {
            method,
            path: path.trim_end_matches('/').to_string(),
            headers,
            body: String::from_utf8(body).context("Body is not UTF-8")?,
        })
    }

    /// Path segments after `prefix`, or `None` when the path lies outside it.
    pub fn segments_after<'a>(&'a self, prefix: &str) -> Option<Vec<&'a str>> {
        let rest = self.path.strip_prefix(prefix)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        Some(rest.split('/').filter(|s| !s.is_empty()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_head_and_sized_body() {
        let raw = "POST /api/v1/bank-accounts/deposit?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"amount\":50}";
        let request = Request::new(raw.as_bytes()).await.unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/api/v1/bank-accounts/deposit");
        assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(request.body, "{\"amount\":50}");
    }

    #[tokio::test]
    async fn rejects_unknown_method_and_short_body() {
        let raw = "TRACE / HTTP/1.1\r\n\r\n";
        assert!(Request::new(raw.as_bytes()).await.is_err());

        let raw = "POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        assert!(Request::new(raw.as_bytes()).await.is_err());
    }

    #[tokio::test]
    async fn splits_segments_under_prefix() {
        let raw = "PUT /api/v1/bank-accounts/a@b.com/activate/ HTTP/1.1\r\n\r\n";
        let request = Request::new(raw.as_bytes()).await.unwrap();

        assert_eq!(
            request.segments_after("/api/v1/bank-accounts"),
            Some(vec!["a@b.com", "activate"])
        );
        assert_eq!(request.segments_after("/api/v1/bank"), None);
        assert_eq!(request.segments_after("/other"), None);
    }
}
