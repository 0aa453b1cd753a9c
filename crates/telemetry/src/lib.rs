//! Telemetry server: watch registry, producer dispatch, and the alert
//! pipeline.
//!
//! The wire format reuses `corestore-record`'s `Frame` for both the network
//! path (subscribers, via [`watch::WatchRegistry`]) and the durable path
//! (the alert log, via [`alert::AlertPipeline`]).

mod alert;
mod dispatch;
mod error;
mod filter;
mod producer;
mod record;
mod request_type;
mod watch;

pub use alert::{Alert, AlertFile, AlertPipeline, AlertRing};
pub use error::TelemetryError;
pub use filter::{match_glob, match_queue, match_thread};
pub use producer::{
    AppProducer, AppSample, DbHostSample, DbProducer, DbSample, DbTableSample, EngineProducer, EngineSample,
    HashTblProducer, HashTblSample, HeapProducer, HeapSample, LinkSample, MxProducer, MxSample, ProducerRegistry,
    QueueProducer, QueueSample, SocketSample, StaticProducerRegistry, ThreadProducer, ThreadSample,
};
pub use record::TelemetryRecord;
pub use request_type::RequestType;
pub use watch::{WatchId, WatchRegistry};
