mod test_reconnect_after_disconnect;
mod test_retries_exhausted;
mod test_session_expiry;
mod test_stalled_relay;
mod test_unresponsive_relay;
