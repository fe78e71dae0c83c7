//! ZVMS save container.
//!
//! Layout: magic `ZVMS`, format version (u16), reserved (u16), then tagged
//! sections (`tag[4]`, payload length u32, payload). All integers big-endian.
//!
//! * `IFHD`: release, serial, checksum, resume pc, storer flag and variable.
//! * `CMEM`: memory XOR-ed with the pristine story; zero runs become `0, n-1`.
//! * `STKS`: value stack and call frames as JSON.
//! * `OSTR`: output stream selection as JSON; saves without it restore the
//!   default streams.

use anyhow::{Context, Result, bail, ensure};

use crate::host::Variable;
use crate::vm::{OutputStreams, StackSnapshot};

use super::snapshot::Snapshot;

const MAGIC: [u8; 4] = *b"ZVMS";
pub const FORMAT_VERSION: u16 = 1;
const IFHD_LEN: usize = 2 + 6 + 2 + 4 + 2;

pub fn encode_snapshot(snapshot: &Snapshot, pristine: &[u8]) -> Result<Vec<u8>> {
    ensure!(
        snapshot.memory.len() == pristine.len(),
        "memory image does not match the story size"
    );
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    write_u16(&mut out, FORMAT_VERSION);
    write_u16(&mut out, 0); // reserved

    let mut ifhd = Vec::with_capacity(IFHD_LEN);
    write_u16(&mut ifhd, snapshot.release);
    ifhd.extend_from_slice(&snapshot.serial);
    write_u16(&mut ifhd, snapshot.checksum);
    write_u32(&mut ifhd, snapshot.pc);
    match snapshot.storer {
        Some(var) => ifhd.extend_from_slice(&[1, var.0]),
        None => ifhd.extend_from_slice(&[0, 0]),
    }
    write_section(&mut out, *b"IFHD", &ifhd);
    write_section(&mut out, *b"CMEM", &compress_memory(&snapshot.memory, pristine));
    write_section(&mut out, *b"STKS", &serde_json::to_vec(&snapshot.stacks)?);
    write_section(&mut out, *b"OSTR", &serde_json::to_vec(&snapshot.streams)?);
    Ok(out)
}

pub fn decode_snapshot(bytes: &[u8], pristine: &[u8]) -> Result<Snapshot> {
    ensure!(bytes.len() >= 8, "save data too small");
    ensure!(bytes[..4] == MAGIC, "invalid save magic");
    let mut cursor = 4;
    let version = read_u16(bytes, &mut cursor)?;
    let _reserved = read_u16(bytes, &mut cursor)?;
    ensure!(
        version <= FORMAT_VERSION,
        "unsupported save format {} (reader supports <= {})",
        version,
        FORMAT_VERSION
    );

    let mut ifhd: Option<&[u8]> = None;
    let mut memory: Option<Vec<u8>> = None;
    let mut stacks: Option<StackSnapshot> = None;
    let mut streams: Option<OutputStreams> = None;
    while cursor < bytes.len() {
        let tag = read_tag(bytes, &mut cursor)?;
        let len = read_u32(bytes, &mut cursor)? as usize;
        ensure!(cursor + len <= bytes.len(), "section overruns save data");
        let payload = &bytes[cursor..cursor + len];
        cursor += len;
        match &tag {
            b"IFHD" => {
                ensure!(ifhd.is_none(), "duplicate IFHD section");
                ifhd = Some(payload);
            }
            b"CMEM" => {
                ensure!(memory.is_none(), "duplicate CMEM section");
                memory = Some(decompress_memory(payload, pristine)?);
            }
            b"STKS" => {
                ensure!(stacks.is_none(), "duplicate STKS section");
                stacks = Some(serde_json::from_slice(payload).context("decoding STKS section")?);
            }
            b"OSTR" => {
                ensure!(streams.is_none(), "duplicate OSTR section");
                streams = Some(serde_json::from_slice(payload).context("decoding OSTR section")?);
            }
            _ => {}
        }
    }

    let ifhd = ifhd.context("missing IFHD section")?;
    ensure!(ifhd.len() == IFHD_LEN, "IFHD section has {} bytes", ifhd.len());
    let mut at = 0;
    let release = read_u16(ifhd, &mut at)?;
    let mut serial = [0u8; 6];
    serial.copy_from_slice(&ifhd[at..at + 6]);
    at += 6;
    let checksum = read_u16(ifhd, &mut at)?;
    let pc = read_u32(ifhd, &mut at)?;
    let storer = match ifhd[at] {
        0 => None,
        _ => Some(Variable(ifhd[at + 1])),
    };

    Ok(Snapshot {
        release,
        serial,
        checksum,
        pc,
        storer,
        memory: memory.context("missing CMEM section")?,
        stacks: stacks.context("missing STKS section")?,
        streams: streams.unwrap_or_default(),
    })
}

fn compress_memory(memory: &[u8], pristine: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut zeros = 0usize;
    for (a, b) in memory.iter().zip(pristine) {
        let x = a ^ b;
        if x == 0 {
            zeros += 1;
            continue;
        }
        flush_zeros(&mut out, &mut zeros);
        out.push(x);
    }
    // trailing zeros are implied by the pristine length
    out
}

fn flush_zeros(out: &mut Vec<u8>, zeros: &mut usize) {
    while *zeros > 0 {
        let run = (*zeros).min(256);
        out.extend_from_slice(&[0, (run - 1) as u8]);
        *zeros -= run;
    }
}

fn decompress_memory(payload: &[u8], pristine: &[u8]) -> Result<Vec<u8>> {
    let mut memory = Vec::with_capacity(pristine.len());
    let mut i = 0;
    while i < payload.len() {
        let x = payload[i];
        i += 1;
        if x == 0 {
            let Some(&n) = payload.get(i) else {
                bail!("truncated zero run in CMEM");
            };
            i += 1;
            memory.resize(memory.len() + n as usize + 1, 0);
        } else {
            memory.push(x);
        }
        ensure!(memory.len() <= pristine.len(), "CMEM expands past the story size");
    }
    memory.resize(pristine.len(), 0);
    for (m, p) in memory.iter_mut().zip(pristine) {
        *m ^= p;
    }
    Ok(memory)
}

fn write_section(out: &mut Vec<u8>, tag: [u8; 4], payload: &[u8]) {
    out.extend_from_slice(&tag);
    write_u32(out, payload.len() as u32);
    out.extend_from_slice(payload);
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn read_u16(bytes: &[u8], cursor: &mut usize) -> Result<u16> {
    if *cursor + 2 > bytes.len() {
        bail!("unexpected end of input while reading u16");
    }
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 2]);
    *cursor += 2;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > bytes.len() {
        bail!("unexpected end of input while reading u32");
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(u32::from_be_bytes(buf))
}

fn read_tag(bytes: &[u8], cursor: &mut usize) -> Result<[u8; 4]> {
    if *cursor + 4 > bytes.len() {
        bail!("unexpected end of input while reading section tag");
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(tag)
}
