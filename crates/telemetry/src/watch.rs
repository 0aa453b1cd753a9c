use corestore_record::Frame;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::time::{delay_queue, DelayQueue};

use crate::dispatch;
use crate::producer::ProducerRegistry;
use crate::request_type::RequestType;

/// Handle returned by [`WatchRegistry::subscribe`]; used to
/// [`WatchRegistry::unsubscribe`] later. `0` is never issued to a real,
/// retained watch (it is reserved for the ephemeral snapshot case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

pub(crate) struct Watch {
    pub id: WatchId,
    pub filter: String,
    pub tx: mpsc::UnboundedSender<Frame>,
}

struct WatchListState {
    watches: Vec<Watch>,
    requested: hashbrown::HashMap<WatchId, u32>,
    interval_ms: u32,
    timer_key: Option<delay_queue::Key>,
}

impl WatchListState {
    fn new() -> Self {
        Self {
            watches: Vec::new(),
            requested: hashbrown::HashMap::new(),
            interval_ms: 0,
            timer_key: None,
        }
    }

    fn recompute_interval(&self, min_interval_ms: u32) -> u32 {
        self.requested
            .values()
            .copied()
            .min()
            .map(|m| m.max(min_interval_ms))
            .unwrap_or(0)
    }
}

enum Command {
    Subscribe {
        req_type: RequestType,
        filter: String,
        interval_ms: u32,
        tx: mpsc::UnboundedSender<Frame>,
        reply: oneshot::Sender<Option<WatchId>>,
    },
    Unsubscribe {
        req_type: RequestType,
        watch_id: WatchId,
    },
    /// Forces a dispatch pass for `req_type` right now, independent of its
    /// timer (used by `App`'s "only when updated" rule, and by tests).
    Tick {
        req_type: RequestType,
    },
}

/// Handle to the running watch-registry actor. Cloning is cheap; every
/// clone shares the same underlying task and state.
#[derive(Clone)]
pub struct WatchRegistry {
    tx: mpsc::UnboundedSender<Command>,
}

impl WatchRegistry {
    pub fn spawn(producers: ProducerRegistry, min_interval_ms: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(
            Actor {
                rx,
                producers,
                min_interval_ms,
                lists: std::array::from_fn(|_| WatchListState::new()),
                queue: DelayQueue::new(),
                next_id: 1,
            }
            .run(),
        );
        Self { tx }
    }

    /// `interval_ms == 0` emits one immediate snapshot and retains no
    /// watch, returning `None`. Otherwise the watch is retained and its
    /// `WatchId` returned.
    pub async fn subscribe(
        &self,
        req_type: RequestType,
        filter: String,
        interval_ms: u32,
        tx: mpsc::UnboundedSender<Frame>,
    ) -> Option<WatchId> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Subscribe {
                req_type,
                filter,
                interval_ms,
                tx,
                reply,
            })
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub fn unsubscribe(&self, req_type: RequestType, watch_id: WatchId) {
        let _ = self.tx.send(Command::Unsubscribe { req_type, watch_id });
    }

    /// Forces an out-of-band scan of `req_type`, e.g. right after the
    /// embedding app marks itself updated.
    pub fn force_tick(&self, req_type: RequestType) {
        let _ = self.tx.send(Command::Tick { req_type });
    }
}

struct Actor {
    rx: mpsc::UnboundedReceiver<Command>,
    producers: ProducerRegistry,
    min_interval_ms: u32,
    lists: [WatchListState; RequestType::N],
    queue: DelayQueue<RequestType>,
    next_id: u64,
}

impl Actor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => return,
                },
                Some(expired) = self.queue.next() => {
                    let req_type = expired.into_inner();
                    self.scan(req_type);
                    self.reschedule(req_type);
                }
            }
        }
    }

    fn alloc_id(&mut self) -> WatchId {
        let id = WatchId(self.next_id);
        self.next_id += 1;
        id
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe {
                req_type,
                filter,
                interval_ms,
                tx,
                reply,
            } => {
                if interval_ms == 0 {
                    let watch = Watch {
                        id: WatchId(0),
                        filter,
                        tx,
                    };
                    self.scan_one(req_type, &watch);
                    let _ = reply.send(None);
                    return;
                }
                let id = self.alloc_id();
                let list = &mut self.lists[req_type.index()];
                list.requested.insert(id, interval_ms);
                list.watches.push(Watch { id, filter, tx });
                self.recompute_and_reschedule(req_type);
                let _ = reply.send(Some(id));
            }
            Command::Unsubscribe { req_type, watch_id } => {
                let list = &mut self.lists[req_type.index()];
                list.watches.retain(|w| w.id != watch_id);
                list.requested.remove(&watch_id);
                self.recompute_and_reschedule(req_type);
            }
            Command::Tick { req_type } => self.scan(req_type),
        }
    }

    fn recompute_and_reschedule(&mut self, req_type: RequestType) {
        let list = &mut self.lists[req_type.index()];
        let new_interval = list.recompute_interval(self.min_interval_ms);
        if new_interval != list.interval_ms {
            list.interval_ms = new_interval;
            self.reschedule(req_type);
        }
    }

    fn reschedule(&mut self, req_type: RequestType) {
        let list = &mut self.lists[req_type.index()];
        if let Some(key) = list.timer_key.take() {
            self.queue.try_remove(&key);
        }
        if list.interval_ms > 0 {
            let key = self
                .queue
                .insert(req_type, std::time::Duration::from_millis(list.interval_ms as u64));
            self.lists[req_type.index()].timer_key = Some(key);
        }
    }

    fn scan(&self, req_type: RequestType) {
        let watches = &self.lists[req_type.index()].watches;
        if watches.is_empty() {
            return;
        }
        match req_type {
            RequestType::Heap => {
                if let Some(p) = &self.producers.heap {
                    dispatch::dispatch_heap(watches, &p.scan());
                }
            }
            RequestType::HashTbl => {
                if let Some(p) = &self.producers.hash_tbl {
                    dispatch::dispatch_hash_tbl(watches, &p.scan());
                }
            }
            RequestType::Thread => {
                if let Some(p) = &self.producers.thread {
                    dispatch::dispatch_thread(watches, &p.scan());
                }
            }
            RequestType::Mx => {
                if let Some(p) = &self.producers.mx {
                    dispatch::dispatch_mx(watches, &p.scan());
                }
            }
            RequestType::Queue => {
                if let Some(p) = &self.producers.queue {
                    dispatch::dispatch_queue(watches, &p.scan());
                }
            }
            RequestType::Engine => {
                if let Some(p) = &self.producers.engine {
                    dispatch::dispatch_engine(watches, &p.scan());
                }
            }
            RequestType::Db => {
                if let Some(p) = &self.producers.db {
                    dispatch::dispatch_db(watches, &p.scan());
                }
            }
            RequestType::App => {
                if let Some(p) = &self.producers.app {
                    dispatch::dispatch_app(watches, p.scan().updated);
                }
            }
            RequestType::Alert => {
                // Alerts are dispatched from the ring by `AlertPipeline`,
                // not from a producer scan; nothing to do here.
            }
        }
    }

    fn scan_one(&self, req_type: RequestType, watch: &Watch) {
        let single = std::slice::from_ref(watch);
        match req_type {
            RequestType::Heap => {
                if let Some(p) = &self.producers.heap {
                    dispatch::dispatch_heap(single, &p.scan());
                }
            }
            RequestType::HashTbl => {
                if let Some(p) = &self.producers.hash_tbl {
                    dispatch::dispatch_hash_tbl(single, &p.scan());
                }
            }
            RequestType::Thread => {
                if let Some(p) = &self.producers.thread {
                    dispatch::dispatch_thread(single, &p.scan());
                }
            }
            RequestType::Mx => {
                if let Some(p) = &self.producers.mx {
                    dispatch::dispatch_mx(single, &p.scan());
                }
            }
            RequestType::Queue => {
                if let Some(p) = &self.producers.queue {
                    dispatch::dispatch_queue(single, &p.scan());
                }
            }
            RequestType::Engine => {
                if let Some(p) = &self.producers.engine {
                    dispatch::dispatch_engine(single, &p.scan());
                }
            }
            RequestType::Db => {
                if let Some(p) = &self.producers.db {
                    dispatch::dispatch_db(single, &p.scan());
                }
            }
            RequestType::App => {
                if let Some(p) = &self.producers.app {
                    dispatch::dispatch_app(single, true);
                }
            }
            RequestType::Alert => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::{HeapSample, StaticProducerRegistry};
    use crate::record::TelemetryRecord;

    fn registry_with_heaps(ids: &[&str]) -> ProducerRegistry {
        StaticProducerRegistry::build(
            ids.iter().map(|id| HeapSample { id: id.to_string() }).collect(),
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            Default::default(),
            Default::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_then_tick_delivers_matching_samples() {
        let registry = WatchRegistry::spawn(registry_with_heaps(&["alpha", "beta"]), 10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry
            .subscribe(RequestType::Heap, "al*".into(), 50, tx)
            .await;
        assert!(id.is_some());

        tokio::time::advance(std::time::Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        let frame = rx.recv().await.unwrap();
        let record = TelemetryRecord::from_frame(&frame).unwrap();
        assert_eq!(record, TelemetryRecord::Heap { id: "alpha".into() });
    }

    #[tokio::test]
    async fn zero_interval_is_a_one_shot_snapshot() {
        let registry = WatchRegistry::spawn(registry_with_heaps(&["alpha"]), 10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.subscribe(RequestType::Heap, "*".into(), 0, tx).await;
        assert_eq!(id, None, "a zero interval must not retain a watch");

        let frame = rx.recv().await.unwrap();
        let record = TelemetryRecord::from_frame(&frame).unwrap();
        assert_eq!(record, TelemetryRecord::Heap { id: "alpha".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_cancels_timer_when_list_empties() {
        let registry = WatchRegistry::spawn(registry_with_heaps(&["alpha"]), 10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry
            .subscribe(RequestType::Heap, "*".into(), 50, tx)
            .await
            .unwrap();
        registry.unsubscribe(RequestType::Heap, id);

        tokio::time::advance(std::time::Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert!(rx.try_recv().is_err(), "no scan should fire once unsubscribed");
    }
}
