//! Producer dispatch: turn one producer sample into frames pushed to
//! every watch whose filter matches, in FIFO (registration) order.
//!
//! These are plain functions over a watch slice rather than methods on the
//! registry so they can be unit tested without spinning up the actor.

use crate::filter::{match_glob, match_queue, match_thread};
use crate::producer::{DbSample, EngineSample, HashTblSample, HeapSample, MxSample, QueueSample, ThreadSample};
use crate::record::TelemetryRecord;
use crate::watch::Watch;

fn send(watch: &Watch, record: TelemetryRecord) {
    let Ok(frame) = record.to_frame(0) else {
        tracing::warn!(watch = watch.id.0, "telemetry record too large to frame, dropping");
        return;
    };
    // A closed receiver means the subscriber disconnected; the watch is
    // reaped on its own `unsubscribe`/disconnect path, not here.
    let _ = watch.tx.send(frame);
}

pub fn dispatch_heap(watches: &[Watch], samples: &[HeapSample]) {
    for sample in samples {
        for watch in watches {
            if match_glob(&watch.filter, &sample.id) {
                send(watch, TelemetryRecord::Heap { id: sample.id.clone() });
            }
        }
    }
}

pub fn dispatch_hash_tbl(watches: &[Watch], samples: &[HashTblSample]) {
    for sample in samples {
        for watch in watches {
            if match_glob(&watch.filter, &sample.id) {
                send(watch, TelemetryRecord::HashTbl { id: sample.id.clone() });
            }
        }
    }
}

pub fn dispatch_thread(watches: &[Watch], samples: &[ThreadSample]) {
    for sample in samples {
        for watch in watches {
            if match_thread(&watch.filter, &sample.name, sample.tid) {
                send(
                    watch,
                    TelemetryRecord::Thread {
                        name: sample.name.clone(),
                        tid: sample.tid,
                    },
                );
            }
        }
    }
}

/// Coalesced scan: a matching watch receives the `Mx` frame plus one
/// `Queue` frame per ring and one `Socket` frame per open connection, all
/// from the same sample.
pub fn dispatch_mx(watches: &[Watch], samples: &[MxSample]) {
    for sample in samples {
        for watch in watches {
            if !match_glob(&watch.filter, &sample.id) {
                continue;
            }
            send(watch, TelemetryRecord::Mx { id: sample.id.clone() });
            for q in &sample.queues {
                send(
                    watch,
                    TelemetryRecord::Queue {
                        queue_type: q.queue_type.clone(),
                        id: q.id.clone(),
                    },
                );
            }
            for s in &sample.sockets {
                send(watch, TelemetryRecord::Socket { id: s.id.clone() });
            }
        }
    }
}

pub fn dispatch_queue(watches: &[Watch], samples: &[QueueSample]) {
    for sample in samples {
        for watch in watches {
            if match_queue(&watch.filter, &sample.queue_type, &sample.id) {
                send(
                    watch,
                    TelemetryRecord::Queue {
                        queue_type: sample.queue_type.clone(),
                        id: sample.id.clone(),
                    },
                );
            }
        }
    }
}

pub fn dispatch_engine(watches: &[Watch], samples: &[EngineSample]) {
    for sample in samples {
        for watch in watches {
            if !match_glob(&watch.filter, &sample.id) {
                continue;
            }
            send(watch, TelemetryRecord::Engine { id: sample.id.clone() });
            for link in &sample.links {
                send(watch, TelemetryRecord::Link { id: link.id.clone() });
            }
        }
    }
}

/// DB scans carry no filter: every watch gets the DB snapshot plus every
/// host and table.
pub fn dispatch_db(watches: &[Watch], sample: &DbSample) {
    for watch in watches {
        send(watch, TelemetryRecord::Db);
        for host in &sample.hosts {
            send(watch, TelemetryRecord::DbHost { id: host.id.clone() });
        }
        for table in &sample.tables {
            send(watch, TelemetryRecord::DbTable { id: table.id.clone() });
        }
    }
}

/// App scans are also unfiltered, and only fire when the embedding
/// application has marked itself updated since the last tick.
pub fn dispatch_app(watches: &[Watch], updated: bool) {
    if !updated {
        return;
    }
    for watch in watches {
        send(watch, TelemetryRecord::App { updated: true });
    }
}
