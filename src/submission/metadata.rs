use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

use crate::auth::extractor::MaybeAuthUser;

/// Identity the gate records for a submission: the authenticated user when
/// there is one, otherwise the client address.
pub fn actor_identity(
    actor: &MaybeAuthUser,
    headers: &HeaderMap,
    peer_addr: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> String {
    match &actor.0 {
        Some(user) => user.identity(),
        None => format!("ip:{}", client_ip(headers, peer_addr, trusted_proxies)),
    }
}

pub fn client_ip(headers: &HeaderMap, peer_addr: Option<IpAddr>, trusted_proxies: &[IpNet]) -> IpAddr {
    let peer = peer_addr.unwrap_or(IpAddr::from([127, 0, 0, 1]));

    // X-Forwarded-For only counts when the direct peer is a trusted proxy
    if !trusted_proxies.iter().any(|net| net.contains(&peer)) {
        return peer;
    }

    let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) else {
        return peer;
    };

    // Rightmost hop that is not one of ours
    xff.split(',')
        .rev()
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .find(|ip| !trusted_proxies.iter().any(|net| net.contains(ip)))
        .unwrap_or(peer)
}
