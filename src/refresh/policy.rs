/// True when `status` means the current credential is no longer valid.
pub fn is_expiry(status: u16, expiry_statuses: &[u16]) -> bool {
    expiry_statuses.contains(&status)
}

/// True when `url` addresses the refresh endpoint. Such requests never enter the refresh cycle.
pub fn targets_refresh_endpoint(url: &str, refresh_marker: &str) -> bool {
    let marker = refresh_marker.trim();
    !marker.is_empty() && url.contains(marker)
}
