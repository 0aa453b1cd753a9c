/// One of the nine subscribable telemetry request types, each with its own
/// watch list and scan timer. Ordered to match the wire format's request
/// type enum so `as usize` indexing into a
/// `[T; RequestType::N]` array is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Heap,
    HashTbl,
    Thread,
    Mx,
    Queue,
    Engine,
    Db,
    App,
    Alert,
}

impl RequestType {
    pub const N: usize = 9;
    pub const ALL: [RequestType; Self::N] = [
        RequestType::Heap,
        RequestType::HashTbl,
        RequestType::Thread,
        RequestType::Mx,
        RequestType::Queue,
        RequestType::Engine,
        RequestType::Db,
        RequestType::App,
        RequestType::Alert,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}
