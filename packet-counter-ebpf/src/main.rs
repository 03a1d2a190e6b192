#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU64, Ordering};

use aya_ebpf::{
    bindings::xdp_action,
    macros::{map, xdp},
    maps::Array,
    programs::XdpContext,
};
use packet_counter_common::COUNTER_SLOT;

#[map(name = "packet_count_map")]
static PACKET_COUNT_MAP: Array<u64> = Array::<u64>::with_max_entries(1, 0);

/// Runs once per received frame. The packet itself is never inspected and the
/// frame always continues up the stack unmodified.
#[xdp]
pub fn count_packets(_ctx: XdpContext) -> u32 {
    // The slot is shared across all CPUs, so the increment must be atomic.
    // A failed lookup is tolerated silently; the frame still passes.
    if let Some(count) = PACKET_COUNT_MAP.get_ptr_mut(COUNTER_SLOT) {
        let count = unsafe { &*(count as *const AtomicU64) };
        count.fetch_add(1, Ordering::Relaxed);
    }
    xdp_action::XDP_PASS
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 4] = *b"GPL\0";

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
