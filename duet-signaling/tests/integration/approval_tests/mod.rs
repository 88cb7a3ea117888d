mod test_duplicate_and_echo_delivery;
mod test_rejected_joiner_exits;
mod test_third_participant_room_full;
