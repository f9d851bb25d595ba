// tests/fetch_paging.rs
// Pagination over a scripted page source: no HTTP involved.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use discord_signal_relay::error::FetchError;
use discord_signal_relay::ingest::discord::{fetch_all, PageFetch, PAGE_MAX};
use discord_signal_relay::ingest::types::{MessageId, RawMessage};

fn msg(id: MessageId) -> RawMessage {
    RawMessage {
        id,
        content: String::new(),
        embeds: vec![],
    }
}

struct ScriptedPages {
    pages: Mutex<VecDeque<Vec<RawMessage>>>,
    calls: Mutex<Vec<(Option<MessageId>, usize)>>,
}

impl ScriptedPages {
    fn new(pages: Vec<Vec<RawMessage>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(Option<MessageId>, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetch for ScriptedPages {
    async fn page(
        &self,
        after: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, FetchError> {
        self.calls.lock().unwrap().push((after, limit));
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[tokio::test]
async fn full_page_then_short_page_is_exactly_two_requests() {
    // First page is full (and deliberately unordered); the short second page
    // signals exhaustion.
    let pages = ScriptedPages::new(vec![vec![msg(3), msg(1)], vec![msg(4)]]);
    let out = fetch_all(&pages, Some(0), 2).await.unwrap();

    let ids: Vec<_> = out.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 3, 4], "union sorted ascending");
    assert_eq!(
        pages.calls(),
        vec![(Some(0), 2), (Some(3), 2)],
        "second request starts after the max id seen"
    );
}

#[tokio::test]
async fn short_first_page_is_a_single_request() {
    let pages = ScriptedPages::new(vec![vec![msg(9)]]);
    let out = fetch_all(&pages, Some(5), 50).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(pages.calls().len(), 1);
}

#[tokio::test]
async fn empty_page_terminates_immediately() {
    let pages = ScriptedPages::new(vec![]);
    let out = fetch_all(&pages, None, 50).await.unwrap();
    assert!(out.is_empty());
    assert_eq!(pages.calls().len(), 1);
}

#[tokio::test]
async fn limit_is_clamped_to_the_protocol_maximum() {
    let pages = ScriptedPages::new(vec![vec![msg(1)]]);
    fetch_all(&pages, None, 5000).await.unwrap();
    assert_eq!(pages.calls()[0].1, PAGE_MAX);

    let pages = ScriptedPages::new(vec![vec![]]);
    fetch_all(&pages, None, 0).await.unwrap();
    assert_eq!(pages.calls()[0].1, 1);
}

#[tokio::test]
async fn page_error_propagates() {
    struct Failing;

    #[async_trait]
    impl PageFetch for Failing {
        async fn page(
            &self,
            _after: Option<MessageId>,
            _limit: usize,
        ) -> Result<Vec<RawMessage>, FetchError> {
            Err(FetchError::UnexpectedStatus {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    assert!(fetch_all(&Failing, Some(1), 10).await.is_err());
}
