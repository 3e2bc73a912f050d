//! Annex-B elementary stream splitting for the bitstream-fed adapters.

use std::collections::VecDeque;
use std::io::Read;
use std::mem;

use crate::{BenchError, Codec};

#[derive(Debug, Clone)]
pub struct AccessUnit {
    pub nalus: Vec<Vec<u8>>,
}

impl AccessUnit {
    /// Re-packs the NAL units with 4-byte start codes into `out`.
    pub fn pack_annexb_into(&self, out: &mut Vec<u8>) {
        out.clear();
        let total: usize = self.nalus.iter().map(|nal| nal.len() + 4).sum();
        out.reserve(total);
        for nal in &self.nalus {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(nal);
        }
    }
}

#[derive(Debug)]
pub struct StatefulBitstreamAssembler {
    codec: Codec,
    pending: Vec<u8>,
    saw_aud: bool,
    current_nalus: Vec<Vec<u8>>,
    current_has_vcl: bool,
}

impl StatefulBitstreamAssembler {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            pending: Vec::new(),
            saw_aud: false,
            current_nalus: Vec::new(),
            current_has_vcl: false,
        }
    }

    /// Feeds bytes and returns the access units completed so far.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<AccessUnit> {
        self.pending.extend_from_slice(chunk);
        let nalus = self.take_complete_nals(false);
        self.process_nals(nalus)
    }

    /// Emits whatever is left, including a trailing partial access unit.
    pub fn flush(&mut self) -> Vec<AccessUnit> {
        let nalus = self.take_complete_nals(true);
        let mut access_units = self.process_nals(nalus);
        if self.current_has_vcl && !self.current_nalus.is_empty() {
            access_units.push(self.finish_current_access_unit());
        }
        self.current_nalus.clear();
        access_units
    }

    fn process_nals(&mut self, nalus: Vec<Vec<u8>>) -> Vec<AccessUnit> {
        let codec = self.codec;
        let mut out = Vec::new();

        for nal in nalus {
            if is_aud(codec, &nal) {
                self.saw_aud = true;
                if self.current_has_vcl && !self.current_nalus.is_empty() {
                    out.push(self.finish_current_access_unit());
                } else {
                    self.current_nalus.clear();
                    self.current_has_vcl = false;
                }
                continue;
            }

            let nal_is_vcl = is_vcl(codec, &nal);
            if !self.saw_aud && nal_is_vcl && self.current_has_vcl {
                out.push(self.finish_current_access_unit());
            }

            self.current_nalus.push(nal);
            self.current_has_vcl |= nal_is_vcl;
        }

        out
    }

    fn finish_current_access_unit(&mut self) -> AccessUnit {
        self.current_has_vcl = false;
        AccessUnit {
            nalus: mem::take(&mut self.current_nalus),
        }
    }

    fn take_complete_nals(&mut self, finalize: bool) -> Vec<Vec<u8>> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut start_codes = find_start_codes(&self.pending);
        if start_codes.is_empty() {
            if finalize {
                self.pending.clear();
            }
            return Vec::new();
        }

        // Bytes before the first start code cannot belong to any NAL unit.
        if start_codes[0].0 > 0 {
            self.pending.drain(..start_codes[0].0);
            start_codes = find_start_codes(&self.pending);
        }

        let mut nalus = Vec::new();
        for window in start_codes.windows(2) {
            let (start, start_len) = window[0];
            let end = window[1].0;
            let payload_start = start + start_len;
            if end > payload_start {
                nalus.push(self.pending[payload_start..end].to_vec());
            }
        }

        if finalize {
            if let Some((start, start_len)) = start_codes.last().copied() {
                let payload_start = start + start_len;
                if self.pending.len() > payload_start {
                    nalus.push(self.pending[payload_start..].to_vec());
                }
            }
            self.pending.clear();
        } else if let Some((start, _)) = start_codes.last().copied() {
            self.pending.drain(..start);
        }

        nalus
    }
}

/// Pulls access units out of a byte reader, `chunk_bytes` at a time.
pub struct AccessUnitReader<R> {
    reader: R,
    assembler: StatefulBitstreamAssembler,
    ready: VecDeque<AccessUnit>,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<R: Read> AccessUnitReader<R> {
    pub fn new(reader: R, codec: Codec, chunk_bytes: usize) -> Self {
        Self {
            reader,
            assembler: StatefulBitstreamAssembler::new(codec),
            ready: VecDeque::new(),
            buffer: vec![0; chunk_bytes.max(1)],
            exhausted: false,
        }
    }

    /// Next complete access unit, or `None` once the reader is drained.
    pub fn next_access_unit(&mut self) -> Result<Option<AccessUnit>, BenchError> {
        while self.ready.is_empty() && !self.exhausted {
            let read = self
                .reader
                .read(&mut self.buffer)
                .map_err(|err| BenchError::Decode(format!("failed to read stream: {err}")))?;
            if read == 0 {
                self.exhausted = true;
                self.ready.extend(self.assembler.flush());
            } else {
                let units = self.assembler.push_chunk(&self.buffer[..read]);
                self.ready.extend(units);
            }
        }
        Ok(self.ready.pop_front())
    }
}

fn find_start_codes(data: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 3 <= data.len() {
        if i + 4 <= data.len() && data[i..i + 4] == [0, 0, 0, 1] {
            out.push((i, 4));
            i += 4;
            continue;
        }
        if data[i..i + 3] == [0, 0, 1] {
            out.push((i, 3));
            i += 3;
            continue;
        }
        i += 1;
    }
    out
}

fn nal_type(codec: Codec, nal: &[u8]) -> Option<u8> {
    let header = *nal.first()?;
    Some(match codec {
        Codec::H264 => header & 0x1f,
        Codec::Hevc => (header >> 1) & 0x3f,
    })
}

fn is_aud(codec: Codec, nal: &[u8]) -> bool {
    match codec {
        Codec::H264 => nal_type(codec, nal) == Some(9),
        Codec::Hevc => nal_type(codec, nal) == Some(35),
    }
}

fn is_vcl(codec: Codec, nal: &[u8]) -> bool {
    match (codec, nal_type(codec, nal)) {
        (Codec::H264, Some(t)) => matches!(t, 1..=5 | 19),
        (Codec::Hevc, Some(t)) => t <= 31,
        (_, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn h264_sample_annexb() -> Vec<u8> {
        let mut out = Vec::new();
        let mut push_nal = |nal: &[u8]| {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(nal);
        };

        push_nal(&[0x09, 0xF0]);
        push_nal(&[0x67, 0x42, 0x00, 0x1E]);
        push_nal(&[0x68, 0xCE, 0x06, 0xE2]);
        push_nal(&[0x65, 0x88, 0x84, 0x21]);
        push_nal(&[0x09, 0xF0]);
        push_nal(&[0x41, 0x9A, 0x22, 0x11]);
        push_nal(&[0x09, 0xF0]);
        push_nal(&[0x41, 0x9A, 0x33, 0x12]);

        out
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    #[case(4096)]
    fn reader_yields_every_access_unit_regardless_of_chunking(#[case] chunk_bytes: usize) {
        let mut reader =
            AccessUnitReader::new(Cursor::new(h264_sample_annexb()), Codec::H264, chunk_bytes);
        let mut units = Vec::new();
        while let Some(au) = reader.next_access_unit().unwrap() {
            units.push(au);
        }

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].nalus.len(), 3);
        assert_eq!(units[1].nalus, vec![vec![0x41, 0x9A, 0x22, 0x11]]);
        assert!(reader.next_access_unit().unwrap().is_none());
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut data = vec![0xAB, 0xCD];
        data.extend(h264_sample_annexb());
        let mut assembler = StatefulBitstreamAssembler::new(Codec::H264);
        let mut units = assembler.push_chunk(&data);
        units.extend(assembler.flush());
        assert_eq!(units.len(), 3);
    }

    #[test]
    fn pack_restores_start_codes() {
        let au = AccessUnit {
            nalus: vec![vec![0x67, 0x42], vec![0x65, 0x88]],
        };
        let mut packed = Vec::new();
        au.pack_annexb_into(&mut packed);
        assert_eq!(packed, vec![0, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x65, 0x88]);
    }

    #[test]
    fn empty_reader_yields_nothing() {
        let mut reader = AccessUnitReader::new(Cursor::new(Vec::new()), Codec::Hevc, 16);
        assert!(reader.next_access_unit().unwrap().is_none());
        assert!(reader.next_access_unit().unwrap().is_none());
    }
}
