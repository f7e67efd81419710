//! Frame counter record: anti-replay counters for GTK and LGTK slots
//!
//! Payload structure:
//!   RestartCount(4) | StoredTime(8) | PanVersion(2) | LpanVersion(2)
//!   GTK slots (GTK_NUM) | LGTK slots (GTK_NUM)
//!
//! Slot structure:
//!   Flag(1) | GTK(16) | FrameCounter(4) | MaxFrameCounterChg(4)
//!
//! Empty slots keep their full width (NOT_SET followed by zeros).

use serde::Serialize;
use tracing::info;

use super::envelope::{read_envelope, write_envelope, RecordReader, RecordTag, RecordWriter};
use super::{FieldFlag, NvmError, ENVELOPE_LEN, FRAME_COUNTER_LEN};
use crate::security::{FrameCounterEntry, FrameCounters, GTK_LEN, GTK_NUM};

/// Scalars stored next to the frame counters
///
/// `restart_count` and `stored_time` let the owner judge how stale a
/// restored snapshot is before it resumes transmitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameCounterMeta {
    /// Number of persistence cycles across reboots
    pub restart_count: u32,
    /// Time of capture (seconds)
    pub stored_time: u64,
    /// PAN version at capture
    pub pan_version: u16,
    /// LFN PAN version at capture
    pub lgtk_pan_version: u16,
}

/// Encode frame counters into `dest`, returning the number of bytes written
pub fn encode_frame_counters(
    dest: &mut [u8],
    meta: &FrameCounterMeta,
    gtk_counters: &FrameCounters,
    lgtk_counters: &FrameCounters,
) -> Result<usize, NvmError> {
    let mut w = write_envelope(dest, RecordTag::FrameCounter, FRAME_COUNTER_LEN)?;

    w.put_u32(meta.restart_count)?;
    w.put_u64(meta.stored_time)?;
    w.put_u16(meta.pan_version)?;
    w.put_u16(meta.lgtk_pan_version)?;
    put_slots(&mut w, gtk_counters)?;
    put_slots(&mut w, lgtk_counters)?;

    info!("NVM FRAME COUNTER write; stored time: {}", meta.stored_time);
    Ok(ENVELOPE_LEN + FRAME_COUNTER_LEN)
}

fn put_slots(w: &mut RecordWriter<'_>, counters: &FrameCounters) -> Result<(), NvmError> {
    for slot in counters.slots() {
        match slot {
            Some(entry) => {
                w.put_flag(FieldFlag::Set)?;
                w.put_slice(&entry.gtk)?;
                w.put_u32(entry.frame_counter)?;
                w.put_u32(entry.max_frame_counter_chg)?;
            }
            None => {
                w.put_flag(FieldFlag::NotSet)?;
                w.put_zeros(GTK_LEN + 4 + 4)?;
            }
        }
    }
    Ok(())
}

fn take_slots(r: &mut RecordReader<'_>) -> Result<[Option<FrameCounterEntry>; GTK_NUM], NvmError> {
    let mut slots: [Option<FrameCounterEntry>; GTK_NUM] = Default::default();
    for slot in slots.iter_mut() {
        *slot = match r.flag()? {
            FieldFlag::Set => Some(FrameCounterEntry {
                gtk: r.array::<GTK_LEN>()?,
                frame_counter: r.u32()?,
                max_frame_counter_chg: r.u32()?,
            }),
            FieldFlag::NotSet => {
                r.skip(GTK_LEN + 4 + 4)?;
                None
            }
        };
    }
    Ok(slots)
}

/// Decode a frame counter record
///
/// Every slot of both counter sets is overwritten: SET slots with the stored
/// key and counters, NOT_SET slots become empty. On error neither set is
/// modified.
pub fn decode_frame_counters(
    src: &[u8],
    gtk_counters: &mut FrameCounters,
    lgtk_counters: &mut FrameCounters,
) -> Result<FrameCounterMeta, NvmError> {
    let mut r = read_envelope(src, RecordTag::FrameCounter, FRAME_COUNTER_LEN)?;

    let meta = FrameCounterMeta {
        restart_count: r.u32()?,
        stored_time: r.u64()?,
        pan_version: r.u16()?,
        lgtk_pan_version: r.u16()?,
    };
    let gtk_slots = take_slots(&mut r)?;
    let lgtk_slots = take_slots(&mut r)?;

    gtk_counters.replace_slots(gtk_slots);
    lgtk_counters.replace_slots(lgtk_slots);

    info!("NVM FRAME COUNTER read; stored time: {}", meta.stored_time);
    Ok(meta)
}
