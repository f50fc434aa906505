//! Tests for the VU1 worker to primary thread event handoff

use og_core::config::GifConfig;
use og_core::{Quiescence, WorkerIdleGate};
use og_gif::registers::{ad_regs, merge_packed, unpack_label};
use og_gif::{
    AdRecord, GifPathId, GifUnit, GsContext, GsCsr, GsEventChannel, GsEventFlags, GsImr,
    GsRegs, IrqCounter, PathOwner,
};
use std::sync::Arc;
use std::thread;

fn qwords(records: &[AdRecord]) -> Vec<u8> {
    records.iter().flat_map(|r| r.to_qword()).collect()
}

fn mtvu_unit() -> GifUnit {
    GifUnit::new(&GifConfig {
        mtvu: true,
        path_buffer_size: 0x1000,
        ..GifConfig::default()
    })
}

fn unmasked() -> GsRegs {
    GsRegs {
        csr: GsCsr::empty(),
        imr: GsImr::empty(),
    }
}

#[test]
fn test_worker_signal_visible_after_unrelated_events() {
    let mut unit = mtvu_unit();
    let worker = unit.worker_path().unwrap();
    let gate = Arc::new(WorkerIdleGate::new());

    let handle = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            let _busy = gate.begin();
            let mut records = Vec::new();
            for i in 0..8u32 {
                records.push(AdRecord::with_words(ad_regs::LABEL, i, 0xFF));
                records.push(AdRecord::new(ad_regs::FINISH, 0));
            }
            records.insert(5, AdRecord::with_words(ad_regs::SIGNAL, 0xDEAD_BEEF, 0xFFFF_FFFF));
            worker.kick(&qwords(&records)).unwrap()
        })
    };

    assert_eq!(handle.join().unwrap(), 17);
    gate.wait_idle();

    let mut regs = unmasked();
    let mut irq = IrqCounter::default();
    let events = unit.poll(&mut GsContext::new(&mut regs, &mut irq));

    assert!(events.contains(GsEventFlags::SIGNAL));
    assert_eq!(unit.state.sig_lbl_id.sigid(), 0xDEAD_BEEF);
    assert_eq!(unit.state.sig_lbl_id.lblid(), 7);
    assert!(regs.csr.contains(GsCsr::SIGNAL));
    // one SIGNAL interrupt plus one FINISH interrupt for all coalesced FINISHes
    assert_eq!(irq.raised, 2);
    assert!(unit.channel().pending().is_empty());
}

#[test]
fn test_primary_polls_while_worker_runs() {
    let mut unit = mtvu_unit();
    let worker = unit.worker_path().unwrap();
    let drain = worker.packets();

    let handle = thread::spawn(move || {
        for i in 0..64u32 {
            worker
                .kick(&AdRecord::with_words(ad_regs::LABEL, i << 8, 0xFF00).to_qword())
                .unwrap();
            // downstream consumes the packet before the next kick recycles the arena
            drain.drain();
        }
        worker
            .kick(&AdRecord::with_words(ad_regs::SIGNAL, 0x1234_5678, 0xFFFF_FFFF).to_qword())
            .unwrap();
    });

    let mut regs = unmasked();
    let mut irq = IrqCounter::default();
    let mut seen = GsEventFlags::empty();
    while !seen.contains(GsEventFlags::SIGNAL) {
        seen |= unit.poll(&mut GsContext::new(&mut regs, &mut irq));
        thread::yield_now();
    }
    handle.join().unwrap();
    unit.poll(&mut GsContext::new(&mut regs, &mut irq));

    assert_eq!(unit.state.sig_lbl_id.sigid(), 0x1234_5678);
    assert_eq!(unit.state.sig_lbl_id.lblid(), 63 << 8);
    assert_eq!(irq.raised, 1);
}

#[test]
fn test_label_merge_converges_under_contention() {
    let channel = Arc::new(GsEventChannel::new());
    let low: Vec<(u32, u32)> = (0..2000u32).map(|i| (i.wrapping_mul(0x9E37), 0x0000_FFFF >> (i % 5))).collect();
    let high: Vec<(u32, u32)> = (0..2000u32).map(|i| (i.wrapping_mul(0x79B9) << 16, 0xFFFF_0000 << (i % 3))).collect();

    let spawn = |updates: Vec<(u32, u32)>| {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            for (data, mask) in updates {
                channel.post_label(data, mask);
            }
        })
    };
    let a = spawn(low.clone());
    let b = spawn(high.clone());
    a.join().unwrap();
    b.join().unwrap();

    // Disjoint masks commute, so each writer's own fold is preserved
    let fold = |updates: &[(u32, u32)]| {
        updates
            .iter()
            .fold(0u64, |acc, &(data, mask)| merge_packed(acc, data, mask))
    };
    let (low_data, low_mask) = unpack_label(fold(&low));
    let (high_data, high_mask) = unpack_label(fold(&high));

    assert_eq!(channel.label(), (low_data | high_data, low_mask | high_mask));
    assert_eq!(channel.pending(), GsEventFlags::LABEL);
}

#[test]
fn test_double_finish_raises_once() {
    let mut unit = mtvu_unit();
    let worker = unit.worker_path().unwrap();
    worker
        .kick(&qwords(&[
            AdRecord::new(ad_regs::FINISH, 0),
            AdRecord::new(ad_regs::FINISH, 0),
        ]))
        .unwrap();
    assert_eq!(unit.channel().pending(), GsEventFlags::FINISH);

    let mut regs = unmasked();
    let mut irq = IrqCounter::default();
    unit.poll(&mut GsContext::new(&mut regs, &mut irq));
    unit.poll(&mut GsContext::new(&mut regs, &mut irq));
    assert_eq!(irq.raised, 1);
    assert!(unit.state.finish.fired);
}

#[test]
fn test_worker_never_stalls_and_queues_packets() {
    let mut unit = mtvu_unit();
    let worker = unit.worker_path().unwrap();
    let records = [
        AdRecord::with_words(ad_regs::SIGNAL, 1, 0xFF),
        AdRecord::with_words(ad_regs::SIGNAL, 2, 0xFF),
        AdRecord::new(ad_regs::BITBLTBUF, 0xFFFF),
    ];
    assert_eq!(worker.kick(&qwords(&records)).unwrap(), 3);
    assert_eq!(worker.packets().len(), 1);

    unit.with_path(GifPathId::Path1, |path| {
        assert_eq!(path.owner(), PathOwner::Worker);
        assert_eq!(path.read_amount(), 48);
        assert_eq!(path.pending_packet_depth(), 1);
    });

    // Worker path records never touch the primary transfer registers
    assert_eq!(unit.transfer.regs[0], 0);

    let mut regs = unmasked();
    let mut irq = IrqCounter::default();
    unit.poll(&mut GsContext::new(&mut regs, &mut irq));
    assert_eq!(unit.state.sig_lbl_id.sigid(), 2);
    assert!(!unit.state.signal.queued);
}

#[test]
fn test_worker_signal_queues_behind_unacknowledged_signal() {
    let mut unit = mtvu_unit();
    let worker = unit.worker_path().unwrap();
    worker
        .kick(&AdRecord::with_words(ad_regs::SIGNAL, 0x42, 0xFF).to_qword())
        .unwrap();

    let mut regs = unmasked();
    regs.csr.insert(GsCsr::SIGNAL);
    let mut irq = IrqCounter::default();
    let mut gs = GsContext::new(&mut regs, &mut irq);
    unit.poll(&mut gs);
    assert!(unit.state.signal.queued);
    assert_eq!(unit.state.signal.data, [0x42, 0xFF]);

    unit.write_csr(GsCsr::SIGNAL.bits(), &mut gs);
    drop(gs);
    assert_eq!(unit.state.sig_lbl_id.sigid(), 0x42);
    assert_eq!(irq.raised, 1);
}

#[test]
fn test_signal_sequence_delivered_once_each() {
    const COUNT: u32 = 2000;
    let channel = Arc::new(GsEventChannel::new());

    let worker = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            for i in 1..=COUNT {
                // Next SIGNAL only once the previous one was taken
                while channel.pending().contains(GsEventFlags::SIGNAL) {
                    thread::yield_now();
                }
                channel.post_signal(i, 0xFFFF_FFFF);
            }
        })
    };

    let mut unit = og_gif::UnitState::new();
    let mut regs = unmasked();
    let mut irq = IrqCounter::default();
    let mut seen = Vec::with_capacity(COUNT as usize);
    while seen.last() != Some(&COUNT) {
        let events = channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq));
        if events.contains(GsEventFlags::SIGNAL) {
            seen.push(unit.sig_lbl_id.sigid());
            // Acknowledge so the next one is applied rather than queued
            regs.csr.remove(GsCsr::SIGNAL);
        } else {
            thread::yield_now();
        }
    }
    worker.join().unwrap();

    assert!(channel.apply_pending(&mut unit, &mut GsContext::new(&mut regs, &mut irq)).is_empty());
    assert_eq!(seen, (1..=COUNT).collect::<Vec<_>>());
    assert_eq!(irq.raised, COUNT);
    assert!(!unit.signal.queued);
}
