#![no_std]

// Names and layout constants the XDP program and the userspace controller
// must agree on. The controller binds the program and the map by these names;
// a mismatch is a startup failure, not a silent zero counter.

/// Name of the single-slot array map holding the running packet count.
pub const PACKET_COUNT_MAP: &str = "packet_count_map";

/// Name of the XDP program that increments the counter.
pub const COUNT_PROGRAM: &str = "count_packets";

/// The one valid key into the counter map. The map is created with
/// `max_entries = 1` and is never resized.
pub const COUNTER_SLOT: u32 = 0;
