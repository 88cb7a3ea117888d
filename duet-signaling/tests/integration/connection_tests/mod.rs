mod test_leave_tears_down_once;
mod test_two_participants_connect;
mod test_webrtc_participants_connect;
