//! HTTP transport backed by a blocking `reqwest` client.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::{Method, Params, Response, Transport};
use crate::config::ApiConfig;
use crate::error::TransportError;

/// Sends requests to `<base_url>/<path>` and decodes JSON object bodies.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    key: Option<String>,
    secret: Option<String>,
}

impl HttpTransport {
    /// Build a transport from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
            return Err(TransportError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url,
            key: config.key.clone(),
            secret: config.secret.clone(),
        })
    }

    /// The base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a resource path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Response, TransportError> {
        let url = self.url_for(path);
        debug!(%method, %url, params = params.len(), "Sending request");

        let builder = match method {
            Method::Get => self.client.get(&url).query(params),
            Method::Delete => self.client.delete(&url).query(params),
            Method::Post => self.client.post(&url).form(params),
            Method::Put => self.client.put(&url).form(params),
        };
        let builder = match &self.key {
            Some(key) => builder.basic_auth(key, self.secret.as_deref()),
            None => builder,
        };

        let response = builder.send()?;
        let status = response.status();
        let text = response.text()?;
        debug!(%url, status = status.as_u16(), bytes = text.len(), "Received response");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_body(&text)
    }
}

/// Decode a response body, which must be a JSON object.
pub(crate) fn parse_body(text: &str) -> Result<Response, TransportError> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(TransportError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(TransportError::MalformedResponse(e.to_string())),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve exactly one request with `status` and `body`, returning the raw
    /// request text once the connection is done.
    fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let status = status.to_string();
        let body = body.to_string();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));

            let mut request = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("length");
                    }
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).expect("read body");
            request.push_str(&String::from_utf8_lossy(&payload));

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
            stream.flush().expect("flush");
            request
        });

        (base_url, handle)
    }

    fn discovery_params(email: &str) -> Params {
        Params::from([
            ("email".to_string(), email.to_string()),
            ("source_type".to_string(), "IMAP".to_string()),
        ])
    }

    fn api(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_url_joining() {
        let transport = HttpTransport::new(&api("https://api.example.com/2.0/")).unwrap();
        assert_eq!(transport.base_url(), "https://api.example.com/2.0");
        assert_eq!(
            transport.url_for("discovery"),
            "https://api.example.com/2.0/discovery"
        );
        assert_eq!(
            transport.url_for("/discovery"),
            "https://api.example.com/2.0/discovery"
        );
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        for bad in ["ftp://example.com", "https://", "http://bad host", "example.com"] {
            let err = HttpTransport::new(&api(bad)).err();
            assert!(
                matches!(err, Some(TransportError::InvalidUrl(_))),
                "expected InvalidUrl for {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_body_object() {
        let map = parse_body(r#"{"found": true, "type": "gmail"}"#).unwrap();
        assert_eq!(map["found"], true);
        assert_eq!(map["type"], "gmail");
    }

    #[test]
    fn test_parse_body_rejects_non_object() {
        let err = parse_body("[1, 2]").unwrap_err();
        match err {
            TransportError::MalformedResponse(msg) => assert!(msg.contains("an array")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            parse_body("not json"),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_get_sends_query_string() {
        let (base_url, server) = serve_once("200 OK", r#"{"found": true}"#);
        let transport = HttpTransport::new(&api(&base_url)).unwrap();

        let res = transport
            .request(Method::Get, "discovery", &discovery_params("a+b@x.com"))
            .unwrap();
        assert_eq!(res["found"], true);

        let request = server.join().unwrap();
        let request_line = request.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /discovery?email=a%2Bb%40x.com&source_type=IMAP HTTP/1.1"
        );
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }

    #[test]
    fn test_delete_sends_query_string() {
        let (base_url, server) = serve_once("200 OK", "{}");
        let transport = HttpTransport::new(&api(&base_url)).unwrap();

        transport
            .request(Method::Delete, "discovery", &discovery_params("me@x.com"))
            .unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("DELETE /discovery?email=me%40x.com&source_type=IMAP "));
    }

    #[test]
    fn test_post_sends_form_body() {
        let (base_url, server) = serve_once("200 OK", r#"{"ok": true}"#);
        let transport = HttpTransport::new(&api(&base_url)).unwrap();

        transport
            .request(Method::Post, "discovery", &discovery_params("a+b@x.com"))
            .unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /discovery HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.ends_with("email=a%2Bb%40x.com&source_type=IMAP"));
    }

    #[test]
    fn test_basic_auth_from_key_and_secret() {
        let (base_url, server) = serve_once("200 OK", "{}");
        let config = ApiConfig {
            base_url,
            key: Some("k".to_string()),
            secret: Some("s".to_string()),
            ..ApiConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();

        transport
            .request(Method::Put, "discovery", &Params::new())
            .unwrap();

        // base64("k:s")
        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(request.contains("authorization: basic azpz"), "{request}");
    }

    #[test]
    fn test_non_success_status_maps_to_error() {
        let (base_url, server) = serve_once("401 Unauthorized", r#"{"error": "bad key"}"#);
        let transport = HttpTransport::new(&api(&base_url)).unwrap();

        let err = transport
            .request(Method::Get, "discovery", &discovery_params("me@x.com"))
            .unwrap_err();
        server.join().unwrap();

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
