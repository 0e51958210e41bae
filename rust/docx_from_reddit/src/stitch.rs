//! Merges the initial page, "continue this thread" pages and "load more
//! comments" batches into one pre-order stream of messages.
//!
//! Markers are expanded where they appear, so the emitted order matches the
//! visual nesting of the thread. Every fetch is blocking and any failure
//! aborts the whole walk.

use crate::comment::Comment;
use crate::dom::{attr, find_all, find_first, has_class, html5_parse, is_element, text_content};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::hierarchy::{HierarchyResolver, ROOT_ID};
use crate::markup::Run;
use crate::reddit::{BatchRequest, RedditApi};
use log::{debug, trace};
use markup5ever_rcdom::Handle;

const COMMENT: &str = "comment";
const MORE_RECURSION: &str = "morerecursion";
const MORE_CHILDREN: &str = "morechildren";
const HEADER_POST: &str = "link";

/// One message ready for the output sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub id: String,
    pub depth: i64,
    pub author: String,
    pub runs: Vec<Run>,
    pub deleted: bool,
}

impl From<&Comment> for Emission {
    fn from(c: &Comment) -> Self {
        Emission {
            id: c.id.clone(),
            depth: c.depth,
            author: c.author_label(),
            runs: c.runs(),
            deleted: c.is_deleted(),
        }
    }
}

/// Consumer of emissions, called in traversal order.
pub trait Sink {
    fn accept(&mut self, emission: Emission);
}

impl Sink for Vec<Emission> {
    fn accept(&mut self, emission: Emission) {
        self.push(emission);
    }
}

/// What the thread page says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub title: String,
    pub url: String,
    pub subreddit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub info: ThreadInfo,
    /// Header post first, then every reply in pre-order.
    pub emissions: Vec<Emission>,
}

enum Candidate {
    Comment(Handle),
    ContinueThread(Handle),
    LoadMore(Handle),
}

impl Candidate {
    fn node(&self) -> &Handle {
        match self {
            Candidate::Comment(n) | Candidate::ContinueThread(n) | Candidate::LoadMore(n) => n,
        }
    }
}

fn candidates(fragment: &Handle) -> Vec<Candidate> {
    find_all(fragment, |n| {
        matches!(
            attr(n, "data-type").as_deref(),
            Some(COMMENT | MORE_RECURSION | MORE_CHILDREN)
        )
    })
    .into_iter()
    .filter_map(|n| match attr(&n, "data-type").as_deref() {
        Some(COMMENT) => Some(Candidate::Comment(n)),
        Some(MORE_RECURSION) => Some(Candidate::ContinueThread(n)),
        Some(MORE_CHILDREN) => Some(Candidate::LoadMore(n)),
        _ => None,
    })
    .collect()
}

pub struct Stitcher<'a, F> {
    api: &'a RedditApi<F>,
    resolver: HierarchyResolver<'a>,
    subreddit: String,
}

impl<'a, F: Fetcher> Stitcher<'a, F> {
    pub fn new(api: &'a RedditApi<F>, subreddit: &str) -> Self {
        Self {
            api,
            resolver: HierarchyResolver::new(api),
            subreddit: subreddit.to_string(),
        }
    }

    /// Walk `fragment`, emitting every message it holds or links to.
    ///
    /// Candidates whose id equals `anchor` are skipped: a page fetched for a
    /// continue-thread link repeats the comment it continues. When
    /// `explicit_parent` is set, comments take it as their parent instead of
    /// reading it from the page structure.
    pub fn stitch<S: Sink + ?Sized>(
        &mut self,
        anchor: &str,
        fragment: &Handle,
        explicit_parent: Option<&str>,
        sink: &mut S,
    ) -> Result<()> {
        for candidate in candidates(fragment) {
            if attr(candidate.node(), "data-fullname").as_deref() == Some(anchor) {
                trace!("skipping repeated anchor {anchor}");
                continue;
            }
            match candidate {
                Candidate::Comment(node) => {
                    let comment = Comment::from_node(&node, explicit_parent, &mut self.resolver)?;
                    trace!("emit {} at depth {}", comment.id, comment.depth);
                    sink.accept(Emission::from(&comment));
                }
                Candidate::ContinueThread(node) => self.continue_thread(&node, sink)?,
                Candidate::LoadMore(node) => self.load_more(&node, sink)?,
            }
        }
        Ok(())
    }

    fn continue_thread<S: Sink + ?Sized>(&mut self, marker: &Handle, sink: &mut S) -> Result<()> {
        let href = find_first(marker, |n| is_element(n, "a"))
            .and_then(|a| attr(&a, "data-href-url"))
            .ok_or_else(|| Error::MalformedResponse("continue-thread marker without link".to_string()))?;
        let page = self.api.continue_thread(&href)?;
        let dom = html5_parse(&page);
        let Some(first) = find_first(&dom.document, |n| attr(n, "data-type").as_deref() == Some(COMMENT)) else {
            debug!("continue-thread page {href} has no comments");
            return Ok(());
        };
        let anchor = attr(&first, "data-fullname").unwrap_or_default();
        self.stitch(&anchor, &dom.document, None, sink)
    }

    fn load_more<S: Sink + ?Sized>(&mut self, marker: &Handle, sink: &mut S) -> Result<()> {
        let onclick = find_first(marker, |n| is_element(n, "a") && has_class(n, "button"))
            .ok_or_else(|| Error::MalformedBatchMarker("no button".to_string()))?;
        let onclick = attr(&onclick, "onclick")
            .ok_or_else(|| Error::MalformedBatchMarker("button without onclick".to_string()))?;
        let request = BatchRequest::from_onclick(&onclick)?;
        let items = self.api.more_children(&request, &self.subreddit)?;
        debug!("batch {} returned {} items", request.children, items.len());
        for item in items {
            let dom = html5_parse(&item.content);
            self.stitch(&item.parent, &dom.document, Some(item.parent.as_str()), sink)?;
        }
        Ok(())
    }
}

/// Read the thread page, emit the header post and then every reply into `sink`.
pub fn reconstruct_into<F: Fetcher, S: Sink + ?Sized>(
    api: &RedditApi<F>,
    page: &str,
    sink: &mut S,
) -> Result<ThreadInfo> {
    let dom = html5_parse(page);
    let root = &dom.document;

    let subreddit = find_first(root, |n| attr(n, "data-subreddit").is_some())
        .and_then(|n| attr(&n, "data-subreddit"))
        .ok_or(Error::MissingElement("subreddit"))?;
    let title = find_first(root, |n| is_element(n, "p") && has_class(n, "title"))
        .and_then(|p| find_first(&p, |n| is_element(n, "a")))
        .map(|a| text_content(&a))
        .ok_or(Error::MissingElement("title"))?;
    let header = find_first(root, |n| attr(n, "data-type").as_deref() == Some(HEADER_POST))
        .ok_or(Error::MissingElement("header post"))?;
    let url = attr(&header, "data-url").unwrap_or_default();

    let mut stitcher = Stitcher::new(api, &subreddit);
    let post = Comment::from_node(&header, None, &mut stitcher.resolver)?;
    sink.accept(Emission::from(&post));
    stitcher.stitch(ROOT_ID, root, None, sink)?;

    Ok(ThreadInfo { title, url, subreddit })
}

/// Collect the whole thread. Nothing is returned if any step fails.
pub fn reconstruct<F: Fetcher>(api: &RedditApi<F>, page: &str) -> Result<Reconstruction> {
    let mut emissions = Vec::new();
    let info = reconstruct_into(api, page, &mut emissions)?;
    Ok(Reconstruction { info, emissions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::reddit::batch_response;

    const BASE: &str = "https://r.test";

    fn comment(id: &str, author: &str, text: &str, replies: &str) -> String {
        format!(
            r#"<div class="thing comment" data-type="comment" data-fullname="{id}" data-author="{author}"><div class="entry"><div class="usertext-body"><div class="md"><p>{text}</p></div></div></div><div class="child"><div id="siteTable_{id}" class="sitetable listing">{replies}</div></div></div>"#
        )
    }

    fn page(comments: &str) -> String {
        format!(
            r#"<html><body data-subreddit="rust"><div id="siteTable" class="sitetable linklisting"><div class="thing link" data-type="link" data-fullname="t3_post" data-author="op" data-url="https://r.test/r/rust/comments/post/"><p class="title"><a class="title" href="/r/rust/comments/post/">A thread</a></p><div class="usertext-body"><div class="md"><p>body</p></div></div></div></div><div class="commentarea"><div id="siteTable_t3_post" class="sitetable nestedlisting">{comments}</div></div></body></html>"#
        )
    }

    fn continue_marker(href: &str) -> String {
        format!(r#"<div class="thing morerecursion" data-type="morerecursion"><span class="deepthread"><a href="{href}" data-href-url="{href}">continue this thread</a></span></div>"#)
    }

    fn load_more_marker(children: &str) -> String {
        format!(
            r#"<div class="thing morechildren" data-type="morechildren"><span class="morecomments"><a class="button" onclick="return morechildren(this, 't3_post', 'confidence', '{children}', 8, '')">load more comments</a></span></div>"#
        )
    }

    fn depths(r: &Reconstruction) -> Vec<(String, i64)> {
        r.emissions.iter().map(|e| (e.id.clone(), e.depth)).collect()
    }

    #[test]
    fn single_top_level_comment() {
        let api = RedditApi::new(ScriptedFetcher::new(), BASE);
        let html = page(&comment("t1_a", "alice", "hello", ""));
        let r = reconstruct(&api, &html).unwrap();
        assert_eq!(r.info.title, "A thread");
        assert_eq!(r.info.subreddit, "rust");
        assert_eq!(r.info.url, "https://r.test/r/rust/comments/post/");
        assert_eq!(depths(&r), vec![("t3_post".into(), -1), ("t1_a".into(), 0)]);
        assert_eq!(r.emissions[1].author, "[alice] ");
        assert_eq!(r.emissions[1].runs, vec![Run::plain("hello")]);
    }

    #[test]
    fn nested_replies_come_out_in_pre_order() {
        let api = RedditApi::new(ScriptedFetcher::new(), BASE);
        let tree = comment("t1_a", "a", "a", &comment("t1_b", "b", "b", &comment("t1_c", "c", "c", "")))
            + &comment("t1_d", "d", "d", "");
        let r = reconstruct(&api, &page(&tree)).unwrap();
        assert_eq!(
            depths(&r),
            vec![
                ("t3_post".into(), -1),
                ("t1_a".into(), 0),
                ("t1_b".into(), 1),
                ("t1_c".into(), 2),
                ("t1_d".into(), 0),
            ]
        );
    }

    #[test]
    fn continue_thread_drops_repeated_anchor() {
        let deep = page(&comment("t1_b", "b", "b", &comment("t1_c", "c", "c", "")));
        let fetcher = ScriptedFetcher::new().on_get("https://r.test/r/rust/comments/post/t/b", &deep);
        let api = RedditApi::new(fetcher, BASE);
        let tree = comment("t1_a", "a", "a", &comment("t1_b", "b", "b", &continue_marker("/r/rust/comments/post/t/b")));
        let r = reconstruct(&api, &page(&tree)).unwrap();
        assert_eq!(
            depths(&r),
            vec![
                ("t3_post".into(), -1),
                ("t1_a".into(), 0),
                ("t1_b".into(), 1),
                ("t1_c".into(), 2),
            ]
        );
    }

    #[test]
    fn continue_thread_without_comments_emits_nothing() {
        let fetcher = ScriptedFetcher::new().on_get("https://r.test/empty", "<html><body></body></html>");
        let api = RedditApi::new(fetcher, BASE);
        let tree = comment("t1_a", "a", "a", &continue_marker("/empty")) + &comment("t1_z", "z", "z", "");
        let r = reconstruct(&api, &page(&tree)).unwrap();
        assert_eq!(
            depths(&r),
            vec![("t3_post".into(), -1), ("t1_a".into(), 0), ("t1_z".into(), 0)]
        );
    }

    #[test]
    fn load_more_items_are_spliced_in_server_order() {
        let body = batch_response(&[
            ("t1_a", &comment("t1_y", "y", "y", "")),
            ("t1_r", &comment("t1_x", "x", "x", "")),
        ]);
        let fetcher = ScriptedFetcher::new().on_post("y,x", &body);
        let api = RedditApi::new(fetcher, BASE);
        let tree = comment("t1_r", "r", "r", &comment("t1_a", "a", "a", &load_more_marker("y,x")))
            + &comment("t1_s", "s", "s", "");
        let r = reconstruct(&api, &page(&tree)).unwrap();
        assert_eq!(
            depths(&r),
            vec![
                ("t3_post".into(), -1),
                ("t1_r".into(), 0),
                ("t1_a".into(), 1),
                ("t1_y".into(), 2),
                ("t1_x".into(), 1),
                ("t1_s".into(), 0),
            ]
        );
        let log = api.fetcher().log.borrow();
        assert_eq!(log.as_slice(), ["POST https://r.test/api/morechildren y,x"]);
    }

    #[test]
    fn load_more_child_of_materialized_comment_is_one_deeper() {
        let body = batch_response(&[
            ("t1_a", &comment("t1_x", "x", "x", "")),
            ("t1_gone", &comment("t1_y", "y", "y", "")),
        ]);
        let fetcher = ScriptedFetcher::new()
            .on_post("x,y", &body)
            .on_get(
                "https://r.test/api/info.json?id=t1_gone",
                r#"{"kind":"Listing","data":{"dist":5,"children":[]}}"#,
            );
        let api = RedditApi::new(fetcher, BASE);
        let tree = comment(
            "t1_r",
            "r",
            "r",
            &comment("t1_q", "q", "q", &comment("t1_a", "a", "a", &load_more_marker("x,y"))),
        );
        let r = reconstruct(&api, &page(&tree)).unwrap();
        assert_eq!(
            depths(&r),
            vec![
                ("t3_post".into(), -1),
                ("t1_r".into(), 0),
                ("t1_q".into(), 1),
                ("t1_a".into(), 2),
                ("t1_x".into(), 3),
                ("t1_y".into(), 6),
            ]
        );
    }

    #[test]
    fn deleted_ancestor_is_looked_up_once() {
        let deleted_children = comment("t1_k1", "k", "k", "") + &comment("t1_k2", "k", "k", "");
        let tree = format!(
            r#"<div class="thing comment deleted" data-type="comment" data-fullname="t1_keep"><div class="child"><div id="siteTable_t1_gone">{deleted_children}</div></div></div>"#
        );
        let fetcher = ScriptedFetcher::new().on_get(
            "https://r.test/api/info.json?id=t1_gone",
            r#"{"kind":"Listing","data":{"dist":1,"children":[]}}"#,
        );
        let api = RedditApi::new(fetcher, BASE);
        let r = reconstruct(&api, &page(&tree)).unwrap();
        assert!(r.emissions[1].deleted);
        assert_eq!(r.emissions[1].author, "[DELETED] ");
        assert_eq!(r.emissions[2].depth, 2);
        assert_eq!(r.emissions[3].depth, 2);
        let lookups = api
            .fetcher()
            .log
            .borrow()
            .iter()
            .filter(|l| l.contains("info.json"))
            .count();
        assert_eq!(lookups, 1);
    }

    #[test]
    fn fetch_failure_stops_emissions_at_the_failure_point() {
        let fetcher = ScriptedFetcher::new().fail_get("https://r.test/deep", 503);
        let api = RedditApi::new(fetcher, BASE);
        let tree = comment("t1_a", "a", "a", &continue_marker("/deep")) + &comment("t1_after", "z", "z", "");
        let html = page(&tree);

        let mut seen: Vec<Emission> = Vec::new();
        let err = reconstruct_into(&api, &html, &mut seen).unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 503, .. }));
        let ids: Vec<&str> = seen.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t3_post", "t1_a"]);

        assert!(reconstruct(&api, &html).is_err());
    }

    #[test]
    fn failed_batch_fetch_aborts_before_later_siblings() {
        let fetcher = ScriptedFetcher::new().fail_post("m1", 500);
        let api = RedditApi::new(fetcher, BASE);
        let tree = comment("t1_a", "a", "a", &load_more_marker("m1")) + &comment("t1_later", "l", "l", "");
        let html = page(&tree);

        let mut seen: Vec<Emission> = Vec::new();
        let err = reconstruct_into(&api, &html, &mut seen).unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 500, .. }));
        assert!(seen.iter().all(|e| e.id != "t1_later"));
    }

    #[test]
    fn malformed_load_more_marker_is_fatal() {
        let api = RedditApi::new(ScriptedFetcher::new(), BASE);
        let broken = r#"<div data-type="morechildren"><a class="button" onclick="return false">load more</a></div>"#;
        let err = reconstruct(&api, &page(&(comment("t1_a", "a", "a", "") + broken))).unwrap_err();
        assert!(matches!(err, Error::MalformedBatchMarker(_)));
    }

    #[test]
    fn page_without_header_is_rejected() {
        let api = RedditApi::new(ScriptedFetcher::new(), BASE);
        let err = reconstruct(&api, r#"<html><body data-subreddit="rust"><p class="title"><a>t</a></p></body></html>"#)
            .unwrap_err();
        assert!(matches!(err, Error::MissingElement("header post")));
    }
}
