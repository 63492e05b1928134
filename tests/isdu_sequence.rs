mod common;

use anyhow::{anyhow, Result};
use common::{init, CycleBuilder};
use iolink_proto::channel::IsduState;
use iolink_proto::isdu::IsduVariant;
use iolink_proto::transaction::IsduTransaction;
use iolink_proto::{MessageInterpreter, Transaction};

/// One M-sequence TYPE_2_1 cycle: a single on-request octet each way.
struct Step {
    mc: u8,
    od: u8,
    /// `false` if the device half was lost.
    reply: bool,
    expect: Option<IsduVariant>,
}

const fn step(mc: u8, od: u8) -> Step {
    Step { mc, od, reply: true, expect: None }
}

const fn lost(mc: u8) -> Step {
    Step { mc, od: 0, reply: false, expect: None }
}

const fn done(mc: u8, od: u8, variant: IsduVariant) -> Step {
    Step { mc, od, reply: true, expect: Some(variant) }
}

fn run(interpreter: &mut MessageInterpreter, steps: &[Step]) -> Result<Vec<IsduTransaction>> {
    let mut bus = CycleBuilder::new();
    let mut transactions = Vec::new();
    for (n, step) in steps.iter().enumerate() {
        let read = step.mc & 0x80 != 0;
        let master_od: &[u8] = if read { &[] } else { &[step.od] };
        let device_od: &[u8] = if read { &[step.od] } else { &[] };

        let message = bus.master(step.mc, 0x80, &[0], master_od);
        assert_eq!(interpreter.process_message(&message)?, None, "step {n}");
        if !step.reply {
            continue;
        }
        let message = bus.device(device_od, &[0], 0x00);
        match (interpreter.process_message(&message)?, step.expect) {
            (None, None) => {}
            (Some(Transaction::Isdu(transaction)), Some(variant)) => {
                assert_eq!(transaction.isdu.variant(), variant, "step {n}");
                assert!(transaction.isdu.is_complete(), "step {n}");
                assert!(transaction.isdu.is_valid(), "step {n}");
                transactions.push(transaction);
            }
            (other, expected) => return Err(anyhow!("step {n}: got {other:?}, expected {expected:?}")),
        }
    }
    Ok(transactions)
}

/// Read of index 0xAABB subindex 0xCC, answered with a 17 octet value.
const READ_16BIT: &[Step] = &[
    step(0xF1, 0x00),
    step(0x70, 0xB5),
    step(0x61, 0xAA),
    step(0x62, 0xBB),
    step(0x63, 0xCC),
    done(0x64, 104, IsduVariant::Read16bitIdxSub),
    // device busy
    step(0xF0, 0x01),
    step(0xF0, 0x01),
    step(0xF0, 0x01),
    step(0xF0, 0x01),
    step(0xF0, 0x01),
    step(0xF0, 0xD1),
    step(0xE1, 0x13),
    step(0xE2, 0xD1),
    step(0xE3, 0xD2),
    step(0xE4, 0xD3),
    step(0xE5, 0xD4),
    step(0xE6, 0xD5),
    step(0xE7, 0xD6),
    step(0xE8, 0xD7),
    lost(0xE9),
    lost(0xE9),
    step(0xE9, 0xD8),
    step(0xEA, 0xD9),
    step(0xEB, 0xDA),
    step(0xEC, 0xDB),
    step(0xED, 0xDC),
    step(0xEE, 0xDD),
    step(0xEF, 0xDE),
    step(0xE0, 0xDF),
    step(0xE1, 0xE0),
    done(0xE2, 242, IsduVariant::ReadRespP),
    step(0xF1, 0x00),
    step(0xF1, 0x00),
];

#[test]
fn read_with_extended_length_response() -> Result<()> {
    init();
    let mut interpreter = MessageInterpreter::new();
    let transactions = run(&mut interpreter, READ_16BIT)?;
    assert_eq!(transactions.len(), 2);

    let request = &transactions[0].isdu;
    assert_eq!(request.index(), Some(0xAABB));
    assert_eq!(request.sub_index(), Some(0xCC));
    assert!(transactions[0].start_time < transactions[0].end_time);

    let response = &transactions[1].isdu;
    assert!(response.has_extended_length());
    assert_eq!(response.total_length(), Some(19));
    assert_eq!(response.data(), &(0xD1..=0xE0).collect::<Vec<u8>>()[..]);
    // the response starts with the last busy poll
    assert!(transactions[1].start_time > transactions[0].end_time);
    assert_eq!(interpreter.isdu().state(), IsduState::Idle);
    Ok(())
}

#[test]
fn write_8bit_index() -> Result<()> {
    init();
    let mut interpreter = MessageInterpreter::new();
    let transactions = run(
        &mut interpreter,
        &[
            step(0xF1, 0x00),
            step(0x70, 0x1B),
            step(0x61, 0xAA),
            step(0x62, 0x01),
            step(0x63, 0x02),
            step(0x64, 0x03),
            step(0x65, 0x04),
            step(0x66, 0x05),
            step(0x67, 0x06),
            step(0x68, 0x07),
            step(0x69, 0x08),
            done(0x6A, 185, IsduVariant::Write8bitIdx),
            step(0xF0, 0x01),
            step(0xF0, 0x52),
            done(0xE1, 82, IsduVariant::WriteRespP),
            step(0xF1, 0x00),
        ],
    )?;

    let request = &transactions[0];
    assert_eq!(request.isdu.index(), Some(0xAA));
    assert_eq!(request.isdu.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(
        Transaction::Isdu(request.clone()).to_string(),
        "ISDU Write8bitIdx: valid=true, index=170, data=0102030405060708"
    );
    Ok(())
}

#[test]
fn abort_drops_partial_response() -> Result<()> {
    init();
    let mut interpreter = MessageInterpreter::new();
    let transactions = run(
        &mut interpreter,
        &[
            step(0x70, 0xB5),
            step(0x61, 0xAA),
            step(0x62, 0xBB),
            step(0x63, 0xCC),
            done(0x64, 104, IsduVariant::Read16bitIdxSub),
            step(0xF0, 0x01),
            step(0xF0, 0xD1),
            step(0xE1, 0x1E),
            step(0xE2, 0x01),
        ],
    )?;
    assert_eq!(transactions.len(), 1);
    assert_eq!(interpreter.isdu().state(), IsduState::Response);

    // abort, then idle polls
    run(&mut interpreter, &[step(0xFF, 0x00), step(0xF1, 0x00), step(0xF1, 0x00)])?;
    assert_eq!(interpreter.isdu().state(), IsduState::Idle);
    Ok(())
}

#[test]
fn read_with_two_octet_segments() -> Result<()> {
    init();
    let mut interpreter = MessageInterpreter::new();
    let mut bus = CycleBuilder::new();
    let mut results = Vec::new();

    for (mc, ckt, master_od, device_od) in [
        (0x70, 0x83, &[0xA4, 0x03][..], &[][..]),
        (0x61, 0x86, &[0x01, 0xA6][..], &[][..]),
        (0xF0, 0x85, &[][..], &[0xD3, 0x00][..]),
        (0xE1, 0x80, &[][..], &[0xD3, 0x00][..]),
    ] {
        let message = bus.master(mc, ckt, &[0; 7], master_od);
        assert_eq!(interpreter.process_message(&message)?, None);
        let message = bus.device(device_od, &[0; 10], 0x2D);
        results.push(interpreter.process_message(&message)?);
    }

    assert_eq!(results[0], None);
    match &results[1] {
        Some(Transaction::Isdu(t)) => {
            assert_eq!(t.isdu.variant(), IsduVariant::Read8bitIdxSub);
            assert!(t.isdu.is_valid());
        }
        other => return Err(anyhow!("expected the request, got {other:?}")),
    }
    assert_eq!(results[2], None);
    match &results[3] {
        Some(Transaction::Isdu(t)) => {
            assert_eq!(t.isdu.variant(), IsduVariant::ReadRespP);
            assert!(t.isdu.is_valid());
            assert_eq!(t.isdu.raw(), &[0xD3, 0x00, 0xD3]);
        }
        other => return Err(anyhow!("expected the response, got {other:?}")),
    }
    Ok(())
}
