// Blocking HTTP access. Every call suspends the conversion until it returns.

use crate::error::{Error, Result};
use log::debug;
use reqwest::blocking::{Client, Response};

pub trait Fetcher {
    fn get(&self, url: &str) -> Result<String>;
    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<String>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

fn finish(url: &str, sent: reqwest::Result<Response>) -> Result<String> {
    let transport = |e: reqwest::Error| Error::Transport {
        url: url.to_string(),
        message: e.to_string(),
    };
    let response = sent.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().map_err(transport)
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<String> {
        debug!("GET {url}");
        finish(url, self.client.get(url).send())
    }

    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<String> {
        debug!("POST {url}");
        finish(url, self.client.post(url).form(form).send())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer a single request on a loopback port with `status_line` and `body`.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/r/test/comments/1")
    }

    #[test]
    fn non_success_status_is_a_fetch_error() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", "busy");
        let fetcher = HttpFetcher::new("docx_from_reddit-test").unwrap();
        let err = fetcher.get(&url).unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 503, url: ref failed } if *failed == url));
    }

    #[test]
    fn success_returns_the_body() {
        let url = serve_once("HTTP/1.1 200 OK", "<html></html>");
        let fetcher = HttpFetcher::new("docx_from_reddit-test").unwrap();
        assert_eq!(fetcher.get(&url).unwrap(), "<html></html>");
    }
}
