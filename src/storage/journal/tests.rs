/*
 * Created on Sat Mar 23 2024
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2024, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use {
    super::{CorruptionReporter, JournalReader, JournalWriter, BLOCK_SIZE, HEADER_SIZE},
    crate::{
        error::Error,
        storage::{
            checksum::{mask, SCrc32},
            interface::fs::{File, FileExt, FileWrite},
        },
    },
    std::{cell::RefCell, rc::Rc},
};

/*
    harness
*/

#[derive(Default)]
struct DropLog {
    bytes: usize,
    reasons: Vec<String>,
}

#[derive(Clone, Default)]
struct Collector(Rc<RefCell<DropLog>>);

impl CorruptionReporter for Collector {
    fn corruption(&mut self, bytes: usize, reason: &Error) {
        let mut log = self.0.borrow_mut();
        log.bytes += bytes;
        log.reasons.push(reason.message().to_owned());
    }
}

impl Collector {
    fn bytes(&self) -> usize {
        self.0.borrow().bytes
    }
    fn reasons(&self) -> Vec<String> {
        self.0.borrow().reasons.clone()
    }
}

fn write_records(payloads: &[&[u8]]) -> Vec<u8> {
    let mut w = JournalWriter::new(Vec::new());
    for p in payloads {
        w.add_record(p).unwrap();
    }
    w.into_inner()
}

fn reader_over(data: &[u8], initial_offset: u64) -> (JournalReader<&[u8]>, Collector) {
    let collector = Collector::default();
    let r = JournalReader::new(
        data,
        Some(Box::new(collector.clone())),
        true,
        initial_offset,
    );
    (r, collector)
}

fn read_all(data: &[u8], initial_offset: u64) -> (Vec<Vec<u8>>, Collector) {
    let (mut r, collector) = reader_over(data, initial_offset);
    let mut out = vec![];
    let mut rec = vec![];
    while r.read_record(&mut rec) {
        out.push(rec.clone());
    }
    (out, collector)
}

fn big(seed: &str, n: usize) -> Vec<u8> {
    seed.bytes().cycle().take(n).collect()
}

/*
    plain round trips
*/

#[test]
fn empty_journal() {
    let (records, collector) = read_all(&[], 0);
    assert!(records.is_empty());
    assert_eq!(collector.bytes(), 0);
}

#[test]
fn read_write() {
    let data = write_records(&[b"foo", b"bar", b"", b"xxxx"]);
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records, [&b"foo"[..], b"bar", b"", b"xxxx"]);
    assert_eq!(collector.bytes(), 0);
    // reading past the end stays at the end
    let (mut r, _) = reader_over(&data, 0);
    let mut rec = vec![];
    while r.read_record(&mut rec) {}
    assert!(!r.read_record(&mut rec));
}

#[test]
fn many_small_records() {
    let payloads: Vec<Vec<u8>> = (0..10_000u32).map(|i| format!("rec.{i}").into_bytes()).collect();
    let refs: Vec<&[u8]> = payloads.iter().map(|p| &p[..]).collect();
    let data = write_records(&refs);
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records, payloads);
    assert_eq!(collector.bytes(), 0);
}

#[test]
fn multi_block_fragmentation() {
    // 100000 bytes can't fit a block: expect First, Middle x2, Last
    let payload = big("fragment/", 100_000);
    let data = write_records(&[&payload]);
    assert!(data.len() > 3 * BLOCK_SIZE);
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], payload);
    assert_eq!(collector.bytes(), 0);
}

#[test]
fn mixed_sizes() {
    let small = big("s", 10);
    let medium = big("m", 50_000);
    let large = big("l", 100_000);
    let data = write_records(&[&small, &medium, &large]);
    let (records, _) = read_all(&data, 0);
    assert_eq!(records, [small, medium, large]);
}

#[test]
fn block_trailer_is_zero_padded() {
    // leave exactly 3 bytes in the first block: too small for a header, so
    // the writer zeroes them and opens a new block for the next record
    let first = big("t", BLOCK_SIZE - HEADER_SIZE - 3);
    let data = write_records(&[&first, b"bar"]);
    assert_eq!(&data[BLOCK_SIZE - 3..BLOCK_SIZE], &[0, 0, 0]);
    // the second record's header begins at the block boundary
    assert_eq!(data[BLOCK_SIZE + 4], 3); // length lo
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], first);
    assert_eq!(records[1], b"bar");
    assert_eq!(collector.bytes(), 0);
}

#[test]
fn marginal_trailer() {
    // leave exactly HEADER_SIZE bytes: a zero-length record fits flush with
    // the block end
    let n = BLOCK_SIZE - 2 * HEADER_SIZE;
    let first = big("foo", n);
    let data = write_records(&[&first, b"", b"bar"]);
    let (records, _) = read_all(&data, 0);
    assert_eq!(records, [&first[..], b"", b"bar"]);
}

#[test]
fn reopen_for_append() {
    let mut w = JournalWriter::new(Vec::new());
    w.add_record(&big("first/", 40_000)).unwrap();
    let data = w.into_inner();
    // a fresh writer picking up where the old file ended
    let len = data.len() as u64;
    let mut w = JournalWriter::with_offset(data, len);
    w.add_record(b"appended").unwrap();
    let data = w.into_inner();
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], big("first/", 40_000));
    assert_eq!(records[1], b"appended");
    assert_eq!(collector.bytes(), 0);
}

/*
    corruption handling
*/

#[test]
fn bit_flip_drops_record_but_not_later_blocks() {
    // r1 exactly fills block 0; r2 and r3 live in block 1
    let r1 = big("a", BLOCK_SIZE - HEADER_SIZE);
    let data = write_records(&[&r1, b"bbb", b"ccc"]);
    let mut corrupt = data.clone();
    corrupt[100] ^= 0x40; // inside r1's payload
    let (records, collector) = read_all(&corrupt, 0);
    assert_eq!(records, [&b"bbb"[..], b"ccc"]);
    // the whole buffered block is dropped on a checksum mismatch
    assert_eq!(collector.bytes(), BLOCK_SIZE);
    assert!(collector.reasons().iter().any(|r| r.contains("checksum")));
}

#[test]
fn bad_record_length() {
    let data = write_records(&[b"foo"]);
    let mut corrupt = data.clone();
    // lie about the payload length so it points past the buffered content;
    // pad the file so the reader does not see a clean EOF
    corrupt[4] = 0xff;
    corrupt[5] = 0x7f;
    corrupt.extend_from_slice(&[0u8; BLOCK_SIZE]);
    let (records, collector) = read_all(&corrupt, 0);
    assert!(records.is_empty());
    assert!(collector.reasons().iter().any(|r| r.contains("bad record length")));
}

#[test]
fn truncated_tail_is_silent() {
    // a header cut off mid-way reads as a writer crash, not corruption
    let data = write_records(&[b"first", b"second"]);
    let first_end = HEADER_SIZE + 5;
    let truncated = &data[..first_end + 3];
    let (records, collector) = read_all(truncated, 0);
    assert_eq!(records, [b"first"]);
    assert_eq!(collector.bytes(), 0);
}

#[test]
fn truncated_fragment_is_silent() {
    // First fragment present, Last never written: the partial logical
    // record vanishes without a report
    let payload = big("x", 2 * BLOCK_SIZE);
    let data = write_records(&[&payload]);
    let truncated = &data[..BLOCK_SIZE];
    let (records, collector) = read_all(truncated, 0);
    assert!(records.is_empty());
    assert_eq!(collector.bytes(), 0);
}

#[test]
fn unknown_record_type_is_reported() {
    let mut data = write_records(&[b"ok"]);
    // hand-craft a record with an undefined type but a valid checksum
    let payload = b"??";
    let ty = 0x7fu8;
    let mut digest = SCrc32::new();
    digest.update(&[ty]);
    digest.update(payload);
    data.extend_from_slice(&mask(digest.finish()).to_le_bytes());
    data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    data.push(ty);
    data.extend_from_slice(payload);
    let final_rec = write_records(&[b"after"]);
    // splice the valid record after the alien one, preserving block math
    data.extend_from_slice(&final_rec);
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records, [&b"ok"[..], b"after"]);
    assert!(collector
        .reasons()
        .iter()
        .any(|r| r.contains("unknown record type")));
}

#[test]
fn zero_type_zero_length_is_dropped_silently() {
    let mut data = write_records(&[b"ok"]);
    // an all-zero header: preallocation artifact
    data.extend_from_slice(&[0u8; HEADER_SIZE]);
    let (records, collector) = read_all(&data, 0);
    assert_eq!(records, [b"ok"]);
    assert_eq!(collector.bytes(), 0);
}

/*
    initial offset & resync
*/

/// Fixture: four records; the third spans multiple blocks
fn offset_fixture() -> (Vec<u8>, Vec<Vec<u8>>, Vec<u64>) {
    let payloads = vec![
        big("one/", 10_000),
        big("two/", 10_000),
        big("three/", 2 * BLOCK_SIZE + 1000),
        big("four/", 10_000),
    ];
    let refs: Vec<&[u8]> = payloads.iter().map(|p| &p[..]).collect();
    let data = write_records(&refs);
    // recover each record's physical start offset via the reader itself
    let (mut r, _) = reader_over(&data, 0);
    let mut offsets = vec![];
    let mut rec = vec![];
    while r.read_record(&mut rec) {
        offsets.push(r.last_record_offset());
    }
    assert_eq!(offsets.len(), payloads.len());
    (data, payloads, offsets)
}

#[test]
fn initial_offset_lands_on_record_starts() {
    let (data, payloads, offsets) = offset_fixture();
    for (i, &off) in offsets.iter().enumerate() {
        let (records, collector) = read_all(&data, off);
        assert_eq!(records, payloads[i..], "initial_offset={off}");
        assert_eq!(collector.bytes(), 0);
        // property: nothing starting before the initial offset is returned
        let (mut r, _) = reader_over(&data, off);
        let mut rec = vec![];
        while r.read_record(&mut rec) {
            assert!(r.last_record_offset() >= off);
        }
    }
}

#[test]
fn initial_offset_past_record_start_resyncs() {
    let (data, payloads, offsets) = offset_fixture();
    // one byte into record i: the reader must resync to record i+1
    for i in 0..offsets.len() - 1 {
        let (records, _) = read_all(&data, offsets[i] + 1);
        assert_eq!(records, payloads[i + 1..], "around record {i}");
    }
}

#[test]
fn initial_offset_inside_spanning_record_skips_it() {
    let (data, payloads, offsets) = offset_fixture();
    // anywhere inside the multi-block record three: the middle/last
    // fragments are skipped and record four is the first one out
    for off in [offsets[2] + BLOCK_SIZE as u64, offsets[2] + 2 * BLOCK_SIZE as u64] {
        let (records, _) = read_all(&data, off);
        assert_eq!(records, payloads[3..], "initial_offset={off}");
    }
}

#[test]
fn initial_offset_past_eof() {
    let (data, _, _) = offset_fixture();
    let (records, _) = read_all(&data, data.len() as u64 + BLOCK_SIZE as u64);
    assert!(records.is_empty());
}

/*
    end to end through the (virtual) file system
*/

#[test]
fn journal_file_end_to_end() {
    // reporter-less corruption drops go through the log facade
    let _ = env_logger::builder().is_test(true).try_init();
    let payloads: Vec<Vec<u8>> = vec![big("alpha/", 100), big("beta/", 60_000), big("gamma/", 5)];
    {
        let file = File::create("jrnl_e2e").unwrap();
        let mut w = JournalWriter::new(file);
        for p in &payloads {
            w.add_record(p).unwrap();
        }
        w.sync().unwrap();
    }
    {
        let mut file = File::open("jrnl_e2e").unwrap();
        assert!(file.f_len().unwrap() > 60_000);
        let mut r = JournalReader::new(file, None, true, 0);
        let mut rec = vec![];
        for p in &payloads {
            assert!(r.read_record(&mut rec));
            assert_eq!(&rec, p);
        }
        assert!(!r.read_record(&mut rec));
    }
    // simulate a torn append: the file ends inside a fresh header
    {
        let mut file = File::open("jrnl_e2e").unwrap();
        let len = file.f_len().unwrap();
        file.f_seek_start(len).unwrap();
        file.fwrite_all(&[0x11, 0x22, 0x33]).unwrap();
        drop(file);
        let file = File::open("jrnl_e2e").unwrap();
        let mut r = JournalReader::new(file, None, true, 0);
        let mut rec = vec![];
        let mut n = 0;
        while r.read_record(&mut rec) {
            n += 1;
        }
        assert_eq!(n, payloads.len());
    }
}
