use crate::backend::{SelectItem, StorageTable, WriteOp};
use crate::error::StorageError;
use async_trait::async_trait;
use corestore_table::{Direction, KeyId, Un};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send>;

struct State<T> {
    inner: T,
    defer_work: Mutex<bool>,
    defer_callbacks: Mutex<bool>,
    work_queue: Mutex<VecDeque<Job>>,
    callback_queue: Mutex<VecDeque<Job>>,
}

/// A test double wrapping any [`StorageTable`], adding two independently
/// togglable FIFO queues so tests can deterministically control async
/// ordering: a work queue defers the operation itself, a callback queue
/// defers only its completion.
pub struct MockStorage<T> {
    state: Arc<State<T>>,
}

impl<T> Clone for MockStorage<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: StorageTable + 'static> MockStorage<T> {
    pub fn new(inner: T) -> Self {
        Self {
            state: Arc::new(State {
                inner,
                defer_work: Mutex::new(false),
                defer_callbacks: Mutex::new(false),
                work_queue: Mutex::new(VecDeque::new()),
                callback_queue: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn defer_work(&self, v: bool) {
        *self.state.defer_work.lock() = v;
    }

    pub fn defer_callbacks(&self, v: bool) {
        *self.state.defer_callbacks.lock() = v;
    }

    /// Drain the work queue, running every deferred operation.
    pub fn perform_work(&self) {
        while let Some(job) = self.state.work_queue.lock().pop_front() {
            job();
        }
    }

    /// Drain the callback queue, running every deferred completion.
    pub fn perform_callbacks(&self) {
        while let Some(job) = self.state.callback_queue.lock().pop_front() {
            job();
        }
    }

    /// Equivalent of alternating `performWork()`/`performCallbacks()`
    /// until both queues are empty — a drained op may itself enqueue a
    /// callback while the work queue is still being worked through.
    pub fn drain_all(&self) {
        loop {
            let both_empty =
                self.state.work_queue.lock().is_empty() && self.state.callback_queue.lock().is_empty();
            if both_empty {
                break;
            }
            self.perform_work();
            self.perform_callbacks();
        }
    }

    fn dispatch<R>(&self, make_fut: impl FnOnce(Arc<State<T>>) -> BoxFuture<'static, R> + Send + 'static, tx: oneshot::Sender<R>)
    where
        R: Send + 'static,
    {
        let state = self.state.clone();
        let job: Job = Box::new(move || {
            let fut = make_fut(state.clone());
            let state = state.clone();
            tokio::spawn(async move {
                let result = fut.await;
                complete(&state, result, tx);
            });
        });
        if *self.state.defer_work.lock() {
            self.state.work_queue.lock().push_back(job);
        } else {
            job();
        }
    }
}

fn complete<T, R: Send + 'static>(state: &Arc<State<T>>, result: R, tx: oneshot::Sender<R>) {
    let job: Job = Box::new(move || {
        let _ = tx.send(result);
    });
    if *state.defer_callbacks.lock() {
        state.callback_queue.lock().push_back(job);
    } else {
        job();
    }
}

#[async_trait]
impl<T: StorageTable + 'static> StorageTable for MockStorage<T> {
    async fn count(&self, key_id: KeyId, key_prefix: &[u8]) -> Result<u64, StorageError> {
        let (tx, rx) = oneshot::channel();
        let key_prefix = key_prefix.to_vec();
        self.dispatch(
            move |state| Box::pin(async move { state.inner.count(key_id, &key_prefix).await }),
            tx,
        );
        rx.await.map_err(|_| StorageError::Backend("mock storage task dropped".into()))?
    }

    async fn find(&self, key_id: KeyId, key: &[u8]) -> Result<Option<Box<[u8]>>, StorageError> {
        let (tx, rx) = oneshot::channel();
        let key = key.to_vec();
        self.dispatch(
            move |state| Box::pin(async move { state.inner.find(key_id, &key).await }),
            tx,
        );
        rx.await.map_err(|_| StorageError::Backend("mock storage task dropped".into()))?
    }

    async fn select(
        &self,
        row_mode: bool,
        direction: Direction,
        inclusive: bool,
        key_id: KeyId,
        key_prefix: &[u8],
        seed: Option<&[u8]>,
        limit: usize,
    ) -> Result<BoxStream<'static, SelectItem>, StorageError> {
        let (tx, rx) = oneshot::channel();
        let key_prefix = key_prefix.to_vec();
        let seed = seed.map(|s| s.to_vec());
        self.dispatch(
            move |state| {
                Box::pin(async move {
                    state
                        .inner
                        .select(row_mode, direction, inclusive, key_id, &key_prefix, seed.as_deref(), limit)
                        .await
                })
            },
            tx,
        );
        rx.await.map_err(|_| StorageError::Backend("mock storage task dropped".into()))?
    }

    async fn recover(&self, un: Un) -> Result<Option<Box<[u8]>>, StorageError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move |state| Box::pin(async move { state.inner.recover(un).await }), tx);
        rx.await.map_err(|_| StorageError::Backend("mock storage task dropped".into()))?
    }

    async fn write(&self, row_buf: Box<[u8]>, un: Un, op: WriteOp) -> Result<(), StorageError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            move |state| Box::pin(async move { state.inner.write(row_buf, un, op).await }),
            tx,
        );
        rx.await.map_err(|_| StorageError::Backend("mock storage task dropped".into()))?
    }
}
