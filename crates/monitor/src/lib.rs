pub mod pipeline;
pub mod registrar;
pub mod rpc;
pub mod worker;

pub use pipeline::{extract_ipv4, observe_peer, publish_peers, PeerObservation, PublishSummary};
pub use registrar::{HttpRegistrar, Registrar};
pub use rpc::{DetailsReply, HttpLedgerApi, LedgerApi, PeerReply};
pub use worker::{
    run_cycle, run_reporter, HealthSnapshot, ReporterError, ReporterHealth, RetryPolicy,
    HTTP_TIMEOUT,
};
