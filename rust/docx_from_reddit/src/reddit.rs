//! Endpoints of the old-style Reddit web UI that the stitcher talks to.

use crate::error::{Error, Result};
use crate::escape::unescape_html;
use crate::fetch::Fetcher;
use crate::hierarchy::DistanceLookup;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

// Position of the list of new things inside the morechildren `jquery` payload.
const JQUERY_CALL_INDEX: usize = 10;
const JQUERY_ARGS_INDEX: usize = 3;

/// Parameters of one "load more comments" request, read from the marker's
/// `onclick` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub link_id: String,
    pub children: String,
    pub depth: String,
}

impl BatchRequest {
    /// Parse `return morechildren(this, 't3_x', 'confidence', 'a,b', 5, '')`.
    pub fn from_onclick(onclick: &str) -> Result<Self> {
        let open = onclick
            .find('(')
            .ok_or_else(|| Error::MalformedBatchMarker(format!("no argument list in {onclick:?}")))?;
        let close = onclick[open..]
            .find(')')
            .map(|i| open + i)
            .ok_or_else(|| Error::MalformedBatchMarker(format!("unterminated argument list in {onclick:?}")))?;
        let args: Vec<String> = onclick[open + 1..close]
            .replace('\'', "")
            .split(", ")
            .map(str::to_string)
            .collect();
        if args.len() < 5 {
            return Err(Error::MalformedBatchMarker(format!(
                "expected at least 5 arguments, got {} in {onclick:?}",
                args.len()
            )));
        }
        if args[3].is_empty() {
            return Err(Error::MalformedBatchMarker(format!("no children in {onclick:?}")));
        }
        Ok(Self {
            link_id: args[1].clone(),
            children: args[3].clone(),
            depth: args[4].clone(),
        })
    }

    /// Id the endpoint expects: the first child as a comment fullname.
    pub fn anchor_id(&self) -> String {
        let first = self.children.split(',').next().unwrap_or_default();
        format!("t1_{first}")
    }
}

/// One message delivered by the batch endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub parent: String,
    pub content: String,
}

#[derive(Deserialize)]
struct InfoResponse {
    data: InfoData,
}

#[derive(Deserialize)]
struct InfoData {
    dist: i64,
}

pub struct RedditApi<F> {
    fetcher: F,
    base_url: String,
}

impl<F: Fetcher> RedditApi<F> {
    pub fn new(fetcher: F, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}", self.base_url, href.trim_start_matches('/'))
        }
    }

    pub fn page(&self, url: &str) -> Result<String> {
        self.fetcher.get(url)
    }

    /// Fetch the page behind a "continue this thread" link.
    pub fn continue_thread(&self, href: &str) -> Result<String> {
        let url = self.absolute(href);
        debug!("continuing thread at {url}");
        self.fetcher.get(&url)
    }

    pub fn more_children(&self, request: &BatchRequest, subreddit: &str) -> Result<Vec<BatchItem>> {
        let url = format!("{}/api/morechildren", self.base_url);
        debug!("loading more children {} of {}", request.children, request.link_id);
        let form = [
            ("children", request.children.clone()),
            ("depth", request.depth.clone()),
            ("id", request.anchor_id()),
            ("limit_children", "False".to_string()),
            ("link_id", request.link_id.clone()),
            ("r", subreddit.to_string()),
            ("renderstyle", "html".to_string()),
            ("sort", "confidence".to_string()),
        ];
        let body = self.fetcher.post_form(&url, &form)?;
        parse_batch(&body)
    }
}

impl<F: Fetcher> DistanceLookup for RedditApi<F> {
    fn lookup_distance(&self, id: &str) -> Result<i64> {
        let url = format!("{}/api/info.json?id={id}", self.base_url);
        let body = self.fetcher.get(&url)?;
        let info: InfoResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("info for {id}: {e}")))?;
        Ok(info.data.dist)
    }
}

/// Pull `(parent, content)` pairs out of a morechildren response, in the
/// order the server returned them. Content is HTML-unescaped.
pub fn parse_batch(body: &str) -> Result<Vec<BatchItem>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("morechildren: {e}")))?;
    let things = value
        .get("jquery")
        .and_then(|j| j.get(JQUERY_CALL_INDEX))
        .and_then(|call| call.get(JQUERY_ARGS_INDEX))
        .and_then(|args| args.get(0))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedResponse("morechildren: no thing list".to_string()))?;

    things
        .iter()
        .map(|thing| -> Result<BatchItem> {
            let data = thing
                .get("data")
                .ok_or_else(|| Error::MalformedResponse("morechildren: thing without data".to_string()))?;
            let field = |name: &str| {
                data.get(name)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::MalformedResponse(format!("morechildren: thing without {name}")))
            };
            Ok(BatchItem {
                parent: field("parent")?,
                content: unescape_html(&field("content")?),
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn batch_response(items: &[(&str, &str)]) -> String {
    let things: Vec<Value> = items
        .iter()
        .map(|(parent, content)| {
            let escaped = content
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;");
            serde_json::json!({ "kind": "t1", "data": { "parent": parent, "content": escaped } })
        })
        .collect();
    let mut calls: Vec<Value> = (0..JQUERY_CALL_INDEX)
        .map(|i| serde_json::json!([i, i + 1, "attr", "find"]))
        .collect();
    calls.push(serde_json::json!([0, 11, "call", [things]]));
    serde_json::json!({ "jquery": calls, "success": true }).to_string()
}
