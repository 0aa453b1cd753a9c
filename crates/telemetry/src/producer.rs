//! Producer registry: the embedding application supplies these trait
//! objects; this crate only samples them and fans the result out to
//! watches. Sampling must be non-blocking and side-effect free, so every
//! trait method here is a plain synchronous `&self` call.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HeapSample {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct HashTblSample {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ThreadSample {
    pub name: String,
    pub tid: u32,
}

#[derive(Debug, Clone)]
pub struct SocketSample {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct QueueSample {
    pub queue_type: String,
    pub id: String,
}

/// A multiplexer's own identity plus its rings and open connections,
/// gathered in one sampling call so a single scan produces one consistent
/// snapshot.
#[derive(Debug, Clone)]
pub struct MxSample {
    pub id: String,
    pub queues: Vec<QueueSample>,
    pub sockets: Vec<SocketSample>,
}

#[derive(Debug, Clone)]
pub struct LinkSample {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct EngineSample {
    pub id: String,
    pub links: Vec<LinkSample>,
}

#[derive(Debug, Clone, Default)]
pub struct DbHostSample {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct DbTableSample {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct DbSample {
    pub hosts: Vec<DbHostSample>,
    pub tables: Vec<DbTableSample>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppSample {
    /// Set by the embedding application whenever app-level telemetry
    /// changed; the app scan only emits a frame when this is true.
    pub updated: bool,
}

pub trait HeapProducer: Send + Sync {
    fn scan(&self) -> Vec<HeapSample>;
}

pub trait HashTblProducer: Send + Sync {
    fn scan(&self) -> Vec<HashTblSample>;
}

pub trait ThreadProducer: Send + Sync {
    fn scan(&self) -> Vec<ThreadSample>;
}

pub trait MxProducer: Send + Sync {
    fn scan(&self) -> Vec<MxSample>;
}

pub trait QueueProducer: Send + Sync {
    fn scan(&self) -> Vec<QueueSample>;
}

pub trait EngineProducer: Send + Sync {
    fn scan(&self) -> Vec<EngineSample>;
}

pub trait DbProducer: Send + Sync {
    fn scan(&self) -> DbSample;
}

pub trait AppProducer: Send + Sync {
    fn scan(&self) -> AppSample;
}

/// Externally populated references to every producer kind the server holds.
/// Any kind left `None` simply never produces samples for its request type.
#[derive(Default, Clone)]
pub struct ProducerRegistry {
    pub heap: Option<Arc<dyn HeapProducer>>,
    pub hash_tbl: Option<Arc<dyn HashTblProducer>>,
    pub thread: Option<Arc<dyn ThreadProducer>>,
    pub mx: Option<Arc<dyn MxProducer>>,
    pub queue: Option<Arc<dyn QueueProducer>>,
    pub engine: Option<Arc<dyn EngineProducer>>,
    pub db: Option<Arc<dyn DbProducer>>,
    pub app: Option<Arc<dyn AppProducer>>,
}

/// Deterministic test double used by this crate's own tests (and available
/// to callers exercising dispatch without real producers).
pub struct StaticProducerRegistry;

impl StaticProducerRegistry {
    pub fn build(
        heaps: Vec<HeapSample>,
        hash_tbls: Vec<HashTblSample>,
        threads: Vec<ThreadSample>,
        mxs: Vec<MxSample>,
        queues: Vec<QueueSample>,
        engines: Vec<EngineSample>,
        db: DbSample,
        app: AppSample,
    ) -> ProducerRegistry {
        struct Static<T>(T);
        impl HeapProducer for Static<Vec<HeapSample>> {
            fn scan(&self) -> Vec<HeapSample> {
                self.0.clone()
            }
        }
        impl HashTblProducer for Static<Vec<HashTblSample>> {
            fn scan(&self) -> Vec<HashTblSample> {
                self.0.clone()
            }
        }
        impl ThreadProducer for Static<Vec<ThreadSample>> {
            fn scan(&self) -> Vec<ThreadSample> {
                self.0.clone()
            }
        }
        impl MxProducer for Static<Vec<MxSample>> {
            fn scan(&self) -> Vec<MxSample> {
                self.0.clone()
            }
        }
        impl QueueProducer for Static<Vec<QueueSample>> {
            fn scan(&self) -> Vec<QueueSample> {
                self.0.clone()
            }
        }
        impl EngineProducer for Static<Vec<EngineSample>> {
            fn scan(&self) -> Vec<EngineSample> {
                self.0.clone()
            }
        }
        impl DbProducer for Static<DbSample> {
            fn scan(&self) -> DbSample {
                self.0.clone()
            }
        }
        impl AppProducer for Static<AppSample> {
            fn scan(&self) -> AppSample {
                self.0
            }
        }
        ProducerRegistry {
            heap: Some(Arc::new(Static(heaps))),
            hash_tbl: Some(Arc::new(Static(hash_tbls))),
            thread: Some(Arc::new(Static(threads))),
            mx: Some(Arc::new(Static(mxs))),
            queue: Some(Arc::new(Static(queues))),
            engine: Some(Arc::new(Static(engines))),
            db: Some(Arc::new(Static(db))),
            app: Some(Arc::new(Static(app))),
        }
    }
}
