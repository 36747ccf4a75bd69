//! Which fetch failures are worth another GET.

use crate::fetch::FetchError;
use crate::retry::policy::Transient;

/// `None` for statuses that will not change on retry (4xx other than 429).
pub fn transient_status(code: u32) -> Option<Transient> {
    match code {
        429 | 503 => Some(Transient::Throttled),
        500..=599 => Some(Transient::Server(code as u16)),
        _ => None,
    }
}

fn transient_curl(e: &curl::Error) -> Option<Transient> {
    if e.is_operation_timedout() {
        Some(Transient::Timeout)
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        Some(Transient::Connection)
    } else {
        None
    }
}

pub fn transient(e: &FetchError) -> Option<Transient> {
    match e {
        FetchError::Curl(ce) => transient_curl(ce),
        FetchError::Http(code) => transient_status(*code),
    }
}
