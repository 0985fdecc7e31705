use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, warn};

use crate::registrar::Registrar;
use crate::rpc::{DetailsReply, PeerReply};

#[derive(Debug, Clone, PartialEq)]
pub struct PeerObservation {
    pub public_key: String,
    pub ip: String,
    pub height: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn extract_ipv4(listeners: &[String]) -> Option<String> {
    listeners.iter().find_map(|listener| {
        let listener = listener.trim();
        if listener.starts_with('[') || !listener.contains('.') {
            return None;
        }
        let host = match listener.rsplit_once(':') {
            Some((host, _port)) => host,
            None => listener,
        };
        (!host.is_empty() && !host.contains(':')).then(|| host.to_string())
    })
}

pub fn observe_peer(details: &DetailsReply, peer: &PeerReply) -> Option<PeerObservation> {
    let ip = extract_ipv4(&peer.listeners)?;
    let height = if peer.public_key == details.public_key {
        details.blocks.local
    } else {
        0
    };
    Some(PeerObservation {
        public_key: peer.public_key.clone(),
        ip,
        height,
        timestamp: peer.timestamp,
    })
}

pub async fn publish_peers<R>(
    registrar: &R,
    details: &DetailsReply,
    peers: &[PeerReply],
) -> PublishSummary
where
    R: Registrar + ?Sized,
{
    let mut summary = PublishSummary::default();

    for peer in peers {
        let Some(observation) = observe_peer(details, peer) else {
            debug!(public_key = %peer.public_key, "skipping peer without ipv4 listener");
            counter!("peermap_registrations_total", "result" => "skipped").increment(1);
            summary.skipped += 1;
            continue;
        };

        match registrar.register(&observation).await {
            Ok(()) => {
                counter!("peermap_registrations_total", "result" => "ok").increment(1);
                summary.published += 1;
            }
            Err(err) => {
                warn!(?err, public_key = %observation.public_key, "unable to post register info");
                counter!("peermap_registrations_total", "result" => "error").increment(1);
                summary.failed += 1;
            }
        }
    }

    summary
}
