//! Streaming feed lifecycle
//!
//! One task per subscribed market. The task owns that market's
//! [`BookSequencer`], multiplexes the ticker and book subscriptions and
//! writes whole values into the shared caches. On a dropped connection it
//! discards the cached book and summary, forgets the book's sequence, backs
//! off, resubscribes and waits for a fresh snapshot before applying deltas
//! again. On an undecodable message it marks the feed failed and exits, so
//! readers get `FeedFailed` instead of a silently stale book.

use dashmap::DashMap;
use log::{debug, error, info, trace, warn};
use meridian_core::{
    BookDelta, BookSequencer, LevelDelta, Market, MarketId, MarketRef, OrderBook, SequenceCheck,
    apply_delta,
};
use meridian_ports::{ExchangeResult, FeedStatus, TransportError};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::adapter::{ExchangeAdapter, FeedTopics, RestRequest, StreamEvent};
use crate::cache::{OrderbookCache, SummaryCache};
use crate::config::GatewayConfig;
use crate::rest::RestClient;
use crate::transport::{StreamMessage, Transport};

struct FeedHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Per-wrapper table of running feeds
pub struct FeedController<A> {
    rest: RestClient<A>,
    summaries: Arc<SummaryCache>,
    books: Arc<OrderbookCache>,
    config: GatewayConfig,
    // held across subscribe calls so concurrent connects cannot double-subscribe
    feeds: Mutex<HashMap<MarketId, FeedHandle>>,
    statuses: Arc<DashMap<MarketId, FeedStatus>>,
}

impl<A: ExchangeAdapter> FeedController<A> {
    pub(crate) fn new(
        rest: RestClient<A>,
        summaries: Arc<SummaryCache>,
        books: Arc<OrderbookCache>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            rest,
            summaries,
            books,
            config,
            feeds: Mutex::new(HashMap::new()),
            statuses: Arc::new(DashMap::new()),
        }
    }

    /// Start the feed for `market` unless one is already running
    ///
    /// Returns whether a new feed was started. A feed that exited on an
    /// error is replaced.
    pub async fn connect(&self, market: &MarketRef, symbol: &str) -> ExchangeResult<bool> {
        let mut feeds = self.feeds.lock().await;
        if feeds
            .get(&market.id())
            .is_some_and(|handle| !handle.task.is_finished())
        {
            debug!("{} feed for {} already running", self.rest.adapter.name(), market.name());
            return Ok(false);
        }

        let topics = self.rest.adapter.feed_topics(symbol);
        let session = open_session(self.rest.transport().as_ref(), &topics).await?;
        // values cached by earlier REST reads are not part of this feed
        self.summaries.remove(market);
        self.books.remove(market);
        self.statuses.insert(market.id(), FeedStatus::Connecting);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = FeedTask {
            rest: self.rest.clone(),
            market: Arc::clone(market),
            symbol: symbol.to_string(),
            topics,
            summaries: Arc::clone(&self.summaries),
            books: Arc::clone(&self.books),
            statuses: Arc::clone(&self.statuses),
            config: self.config.clone(),
            sequencer: BookSequencer::new(),
            attempt: 0,
        };

        info!("{} feed started for {}", self.rest.adapter.name(), market.name());
        let handle = tokio::spawn(task.run(session, stop_rx));
        feeds.insert(
            market.id(),
            FeedHandle {
                stop: stop_tx,
                task: handle,
            },
        );
        Ok(true)
    }

    /// Stop the feed for `market` and wait for its task to exit
    ///
    /// Returns false if no feed was registered.
    pub async fn disconnect(&self, market: &Market) -> bool {
        let handle = self.feeds.lock().await.remove(&market.id());
        match handle {
            Some(handle) => {
                self.stop(market.id(), handle).await;
                true
            }
            None => false,
        }
    }

    /// Stop every feed
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.feeds.lock().await.drain().collect();
        for (id, handle) in handles {
            self.stop(id, handle).await;
        }
    }

    async fn stop(&self, id: MarketId, handle: FeedHandle) {
        // the task may already have exited on its own
        let _ = handle.stop.send(());
        if let Err(err) = handle.task.await {
            error!("{} feed task {id} ended abnormally: {err}", self.rest.adapter.name());
        }
        self.statuses.insert(id, FeedStatus::Stopped);
    }

    pub fn status(&self, market: &Market) -> FeedStatus {
        self.statuses
            .get(&market.id())
            .map(|status| status.value().clone())
            .unwrap_or(FeedStatus::NotSubscribed)
    }

    /// Whether reads for `market` are served by its feed
    pub fn is_tracking(&self, market: &Market) -> bool {
        !matches!(
            self.status(market),
            FeedStatus::NotSubscribed | FeedStatus::Stopped
        )
    }
}

struct Session {
    ticker: Option<mpsc::Receiver<StreamMessage>>,
    book: Option<mpsc::Receiver<StreamMessage>>,
}

async fn open_session(
    transport: &dyn Transport,
    topics: &FeedTopics,
) -> Result<Session, TransportError> {
    let ticker = match &topics.ticker {
        Some(topic) => Some(transport.subscribe(topic).await?),
        None => None,
    };
    let book = match &topics.book {
        Some(topic) => match transport.subscribe(topic).await {
            Ok(rx) => Some(rx),
            Err(err) => {
                if let Some(ticker_topic) = &topics.ticker {
                    transport.unsubscribe(ticker_topic).await;
                }
                return Err(err);
            }
        },
        None => None,
    };
    Ok(Session { ticker, book })
}

async fn next_message(rx: &mut Option<mpsc::Receiver<StreamMessage>>) -> Option<StreamMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

enum Channel {
    Ticker,
    Book,
}

enum SessionEnd {
    Stopped,
    Disconnected(String),
    Failed(String),
}

struct FeedTask<A> {
    rest: RestClient<A>,
    market: MarketRef,
    symbol: String,
    topics: FeedTopics,
    summaries: Arc<SummaryCache>,
    books: Arc<OrderbookCache>,
    statuses: Arc<DashMap<MarketId, FeedStatus>>,
    config: GatewayConfig,
    sequencer: BookSequencer,
    attempt: u32,
}

impl<A: ExchangeAdapter> FeedTask<A> {
    async fn run(mut self, mut session: Session, mut stop: oneshot::Receiver<()>) {
        let exchange = self.rest.adapter.name();
        loop {
            match self.pump(&mut session, &mut stop).await {
                SessionEnd::Stopped => break,
                SessionEnd::Failed(reason) => {
                    error!(
                        "{exchange} feed for {} failed, handler exiting: {reason}",
                        self.market.name()
                    );
                    self.unsubscribe().await;
                    self.set_status(FeedStatus::Failed(reason));
                    return;
                }
                SessionEnd::Disconnected(reason) => {
                    warn!(
                        "{exchange} feed for {} disconnected: {reason}",
                        self.market.name()
                    );
                    self.summaries.remove(&self.market);
                    self.books.remove(&self.market);
                    self.set_status(FeedStatus::Reconnecting);
                    // deltas from the next session must not land on the old book
                    self.sequencer.invalidate();
                    self.unsubscribe().await;
                    match self.reconnect(&mut stop).await {
                        Some(next) => session = next,
                        None => break,
                    }
                }
            }
        }

        self.unsubscribe().await;
        self.set_status(FeedStatus::Stopped);
        info!("{exchange} feed for {} stopped", self.market.name());
    }

    async fn pump(&mut self, session: &mut Session, stop: &mut oneshot::Receiver<()>) -> SessionEnd {
        let capabilities = self.rest.adapter.capabilities();
        if !capabilities.stream_summaries {
            let fetched = tokio::select! {
                _ = &mut *stop => return SessionEnd::Stopped,
                fetched = self.fetch_summary() => fetched,
            };
            if let Err(err) = fetched {
                return SessionEnd::Disconnected(format!("summary request failed: {err}"));
            }
        }
        if !capabilities.stream_snapshots {
            let fetched = tokio::select! {
                _ = &mut *stop => return SessionEnd::Stopped,
                fetched = self.fetch_snapshot() => fetched,
            };
            if let Err(err) = fetched {
                return SessionEnd::Disconnected(format!("snapshot request failed: {err}"));
            }
        }

        loop {
            let (channel, message) = tokio::select! {
                _ = &mut *stop => return SessionEnd::Stopped,
                message = next_message(&mut session.ticker) => (Channel::Ticker, message),
                message = next_message(&mut session.book) => (Channel::Book, message),
            };

            let payload = match message {
                Some(StreamMessage::Payload(payload)) => payload,
                Some(StreamMessage::Disconnected(reason)) => {
                    return SessionEnd::Disconnected(reason);
                }
                None => return SessionEnd::Disconnected("stream closed".to_string()),
            };

            let topic = match channel {
                Channel::Ticker => self.topics.ticker.as_ref(),
                Channel::Book => self.topics.book.as_ref(),
            };
            let Some(topic) = topic else {
                continue;
            };

            match self.rest.adapter.parse_stream(topic, &payload) {
                Ok(Some(event)) => self.apply(event),
                Ok(None) => trace!("{topic}: ignored {payload}"),
                Err(err) => return SessionEnd::Failed(format!("{topic}: {err}")),
            }
        }
    }

    /// Back off and resubscribe; `None` if stopped meanwhile
    async fn reconnect(&mut self, stop: &mut oneshot::Receiver<()>) -> Option<Session> {
        loop {
            let delay = self.next_delay();
            tokio::select! {
                _ = &mut *stop => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            info!(
                "{} resubscribing {} (attempt {})",
                self.rest.adapter.name(),
                self.market.name(),
                self.attempt
            );
            match open_session(self.rest.transport().as_ref(), &self.topics).await {
                Ok(session) => return Some(session),
                Err(err) => warn!(
                    "{} resubscribe of {} failed: {err}",
                    self.rest.adapter.name(),
                    self.market.name()
                ),
            }
        }
    }

    fn next_delay(&mut self) -> Duration {
        let base = self.config.backoff_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        with_jitter(base)
    }

    async fn fetch_snapshot(&mut self) -> ExchangeResult<()> {
        let payload = self
            .rest
            .fetch(RestRequest::OrderBook {
                symbol: &self.symbol,
            })
            .await?;
        let book = self.rest.adapter.parse_order_book(&payload)?;
        let sequence = self.rest.adapter.book_sequence(&payload);
        self.store_snapshot(sequence, book);
        Ok(())
    }

    async fn fetch_summary(&mut self) -> ExchangeResult<()> {
        let payload = self
            .rest
            .fetch(RestRequest::Summary {
                symbol: &self.symbol,
            })
            .await?;
        let summary = self.rest.adapter.parse_summary(&payload, &self.symbol)?;
        self.summaries.set(&self.market, summary);
        Ok(())
    }

    fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Summary(summary) => {
                self.summaries.set(&self.market, summary);
            }
            StreamEvent::Ticker(ticker) => match self.summaries.get(&self.market) {
                Some(current) => {
                    self.summaries
                        .set(&self.market, current.update_from_ticker(&ticker));
                }
                None => trace!("{}: ticker before summary dropped", self.market.name()),
            },
            StreamEvent::BookSnapshot { sequence, book } => self.store_snapshot(sequence, book),
            StreamEvent::BookDelta {
                sequence,
                asks,
                bids,
            } => self.merge(sequence, asks, bids),
        }
    }

    fn store_snapshot(&mut self, sequence: Option<u64>, book: OrderBook) {
        let accepted = match sequence {
            Some(sequence) => self.sequencer.accept_snapshot(sequence),
            None => {
                self.sequencer.reset_to(0);
                true
            }
        };
        if !accepted {
            debug!(
                "{}: dropping snapshot {sequence:?} older than {:?}",
                self.market.name(),
                self.sequencer.last_applied()
            );
            return;
        }

        self.books.set(&self.market, book);
        self.attempt = 0;
        self.set_status(FeedStatus::Live);
    }

    fn merge(&mut self, sequence: Option<u64>, asks: Vec<LevelDelta>, bids: Vec<LevelDelta>) {
        let Some(sequence) =
            sequence.or_else(|| self.sequencer.last_applied().map(|last| last + 1))
        else {
            trace!("{}: delta before snapshot dropped", self.market.name());
            return;
        };

        match self.sequencer.check(sequence) {
            SequenceCheck::Apply => {}
            SequenceCheck::Stale { last_applied } => {
                debug!(
                    "{}: dropping delta {sequence}, already at {last_applied}",
                    self.market.name()
                );
                return;
            }
            SequenceCheck::AwaitingSnapshot => {
                trace!("{}: delta {sequence} before snapshot dropped", self.market.name());
                return;
            }
        }

        let Some(current) = self.books.get(&self.market) else {
            return;
        };
        let delta = BookDelta {
            sequence,
            asks,
            bids,
        };
        let updated = apply_delta(&current, &delta);
        self.sequencer.accept(sequence);
        self.books.set(&self.market, updated);
        trace!("{}: applied delta {sequence}", self.market.name());
    }

    async fn unsubscribe(&self) {
        for topic in self.topics.iter() {
            self.rest.transport().unsubscribe(topic).await;
        }
    }

    fn set_status(&self, status: FeedStatus) {
        self.statuses.insert(self.market.id(), status);
    }
}

/// `base` plus up to half of it again, at random
fn with_jitter(base: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2);
    base + Duration::from_millis(jitter_ms)
}
