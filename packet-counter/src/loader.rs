use std::ffi::CString;

use aya::maps::{Array, MapData};
use aya::programs::{Xdp, XdpFlags, xdp::XdpLinkId};
use aya::{Ebpf, include_bytes_aligned};
use clap::ValueEnum;

use packet_counter_common::{COUNT_PROGRAM, COUNTER_SLOT, PACKET_COUNT_MAP};

use crate::agent::CounterHost;
use crate::error::AgentError;

const EBPF_BYTES: &[u8] = include_bytes_aligned!(concat!(env!("OUT_DIR"), "/packet-counter"));

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum XdpMode {
    Skb,
    Driver,
    Hw,
}

fn xdp_flags(mode: XdpMode) -> XdpFlags {
    match mode {
        XdpMode::Skb => XdpFlags::SKB_MODE,
        XdpMode::Driver => XdpFlags::DRV_MODE,
        XdpMode::Hw => XdpFlags::HW_MODE,
    }
}

/// The embedded eBPF object plus, once bound, a typed handle onto its
/// single-slot counter map.
pub struct LoadedCounter {
    ebpf: Ebpf,
    counter: Option<Array<MapData, u64>>,
}

/// [`CounterHost`] backed by aya and the kernel XDP hook.
pub struct XdpHost {
    flags: XdpFlags,
}

impl XdpHost {
    pub fn new(mode: XdpMode) -> Self {
        Self {
            flags: xdp_flags(mode),
        }
    }
}

impl CounterHost for XdpHost {
    type Image = LoadedCounter;
    type Link = XdpLinkId;

    fn resolve(&mut self, iface: &str) -> Result<u32, AgentError> {
        let name = CString::new(iface).map_err(|_| AgentError::InterfaceNotFound {
            iface: iface.to_owned(),
        })?;
        let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if ifindex == 0 {
            return Err(AgentError::InterfaceNotFound {
                iface: iface.to_owned(),
            });
        }
        Ok(ifindex)
    }

    fn load(&mut self) -> Result<LoadedCounter, AgentError> {
        let ebpf = Ebpf::load(EBPF_BYTES).map_err(|err| AgentError::Load(err.to_string()))?;
        Ok(LoadedCounter {
            ebpf,
            counter: None,
        })
    }

    fn bind(&mut self, image: &mut LoadedCounter) -> Result<(), AgentError> {
        if image.ebpf.program(COUNT_PROGRAM).is_none() {
            return Err(AgentError::Bind(format!(
                "program {COUNT_PROGRAM} not found"
            )));
        }
        let map = image
            .ebpf
            .take_map(PACKET_COUNT_MAP)
            .ok_or_else(|| AgentError::Bind(format!("map {PACKET_COUNT_MAP} not found")))?;
        let counter = Array::try_from(map).map_err(|err| {
            AgentError::Bind(format!("map {PACKET_COUNT_MAP} has unexpected type: {err}"))
        })?;
        image.counter = Some(counter);
        Ok(())
    }

    fn attach(&mut self, image: &mut LoadedCounter, ifindex: u32) -> Result<XdpLinkId, AgentError> {
        let program: &mut Xdp = image
            .ebpf
            .program_mut(COUNT_PROGRAM)
            .ok_or_else(|| AgentError::Bind(format!("program {COUNT_PROGRAM} not found")))?
            .try_into()
            .map_err(|err: aya::programs::ProgramError| {
                AgentError::Bind(format!("program {COUNT_PROGRAM} has wrong type: {err}"))
            })?;
        // Verifier rejection surfaces here, so it is reported as a load failure.
        program
            .load()
            .map_err(|err| AgentError::Load(err.to_string()))?;
        program
            .attach_to_if_index(ifindex, self.flags)
            .map_err(|err| AgentError::Attach(err.to_string()))
    }

    fn read_count(&mut self, image: &LoadedCounter) -> Result<u64, AgentError> {
        let counter = image
            .counter
            .as_ref()
            .ok_or_else(|| AgentError::Read("counter map is not bound".to_owned()))?;
        counter
            .get(&COUNTER_SLOT, 0)
            .map_err(|err| AgentError::Read(err.to_string()))
    }

    fn detach(&mut self, image: &mut LoadedCounter, link: XdpLinkId) -> Result<(), AgentError> {
        let program: &mut Xdp = image
            .ebpf
            .program_mut(COUNT_PROGRAM)
            .ok_or_else(|| AgentError::Detach(format!("program {COUNT_PROGRAM} not found")))?
            .try_into()
            .map_err(|err: aya::programs::ProgramError| AgentError::Detach(err.to_string()))?;
        program
            .detach(link)
            .map_err(|err| AgentError::Detach(err.to_string()))
    }

    fn release(&mut self, image: LoadedCounter) {
        // Dropping the handle closes the program and map fds, which unloads
        // everything the kernel still holds for this image.
        drop(image);
    }
}
