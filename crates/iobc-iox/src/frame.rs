/// Bit 7 of `seq`: set on outbound/response frames, clear on inbound ones.
pub const DIR_OUTBOUND: u8 = 0x80;

/// A single on-the-wire IOX frame: `seq:u8, cat:u8, id:u8, len:u8,
/// payload[len]` (spec.md §6). A frame is capped at 255 payload bytes by
/// the wire format itself; anything larger is the caller's job to split
/// into a multiframe sequence sharing one `seq` (see [`split_multiframe`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u8,
    pub cat: u8,
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_outbound(&self) -> bool {
        self.seq & DIR_OUTBOUND != 0
    }

    /// Encodes the 4-byte header plus payload. Panics if the payload
    /// exceeds the wire format's single-frame limit; callers that might
    /// exceed it must go through [`split_multiframe`] first.
    pub fn encode(&self) -> Vec<u8> {
        assert!(
            self.payload.len() <= u8::MAX as usize,
            "frame payload {} exceeds single-frame limit of 255 bytes",
            self.payload.len()
        );
        let mut out = Vec::with_capacity(4 + self.payload.len());
        out.push(self.seq);
        out.push(self.cat);
        out.push(self.id);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Splits `data` into as many frames as needed to stay within the 255-byte
/// per-frame payload limit, all sharing `seq` (spec.md §4.14: "out-bound
/// writes >255 bytes are automatically split into multiple frames sharing
/// a sequence ID"). Empty `data` still yields exactly one (empty-payload)
/// frame.
pub fn split_multiframe(seq: u8, cat: u8, id: u8, data: &[u8]) -> Vec<Frame> {
    if data.is_empty() {
        return vec![Frame { seq, cat, id, payload: Vec::new() }];
    }
    data.chunks(u8::MAX as usize)
        .map(|chunk| Frame { seq, cat, id, payload: chunk.to_vec() })
        .collect()
}

/// Auto-incrementing sequence number generator for spontaneous outbound
/// frames. Each call to [`next`](SeqCounter::next) corresponds to one
/// logical transmission (spec.md §4.14): a multiframe split reuses the
/// same value across all its fragments rather than calling this again per
/// fragment.
#[derive(Debug, Default)]
pub struct SeqCounter {
    next: u8,
}

impl SeqCounter {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next(&mut self) -> u8 {
        let seq = (self.next & 0x7f) | DIR_OUTBOUND;
        self.next = self.next.wrapping_add(1);
        seq
    }
}

/// Accumulates raw bytes arriving in arbitrary chunks and reassembles them
/// into complete frames, resuming exactly at the header/payload boundary a
/// previous call left off at (spec.md §8 invariant 7).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feeds newly-arrived bytes in and returns every frame that became
    /// complete as a result. Incomplete trailing bytes stay buffered.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < 4 {
                break;
            }
            let len = self.buf[3] as usize;
            if self.buf.len() < 4 + len {
                break;
            }
            let payload = self.buf[4..4 + len].to_vec();
            let frame = Frame { seq: self.buf[0], cat: self.buf[1], id: self.buf[2], payload };
            self.buf.drain(..4 + len);
            frames.push(frame);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_frame() {
        let frame = Frame { seq: 0x81, cat: 0x01, id: 0x02, payload: vec![1, 2, 3] };
        let bytes = frame.encode();
        let mut decoder = FrameDecoder::new();
        let decoded = decoder.push(&bytes);
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn reassembles_across_arbitrary_chunk_boundaries() {
        let frames = vec![
            Frame { seq: 0x01, cat: 0x01, id: 0x01, payload: vec![9, 9] },
            Frame { seq: 0x82, cat: 0x01, id: 0x02, payload: vec![] },
            Frame { seq: 0x03, cat: 0x02, id: 0x01, payload: vec![0xff; 10] },
        ];
        let mut wire = Vec::new();
        for f in &frames {
            wire.extend(f.encode());
        }

        for chunk_size in 1..=wire.len() {
            let mut decoder = FrameDecoder::new();
            let mut decoded = Vec::new();
            for chunk in wire.chunks(chunk_size) {
                decoded.extend(decoder.push(chunk));
            }
            assert_eq!(decoded, frames, "mismatch at chunk_size={chunk_size}");
        }
    }

    #[test]
    fn splits_large_payload_sharing_seq() {
        let data = vec![0xab; 600];
        let frames = split_multiframe(0x80, 0x01, 0x02, &data);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.seq == 0x80));
        let reassembled: Vec<u8> = frames.iter().flat_map(|f| f.payload.clone()).collect();
        assert_eq!(reassembled, data);
    }

    #[test]
    fn seq_counter_forces_direction_bit_and_wraps() {
        let mut counter = SeqCounter::new();
        assert_eq!(counter.next(), 0x80);
        assert_eq!(counter.next(), 0x81);
        counter.next = 0x7f;
        assert_eq!(counter.next(), 0xff);
        assert_eq!(counter.next(), 0x80);
    }

    proptest::proptest! {
        #[test]
        fn chunked_reads_match_single_shot(
            payloads in proptest::collection::vec(proptest::collection::vec(0u8..=255, 0..20), 1..8),
            split_points in proptest::collection::vec(1usize..7, 0..40),
        ) {
            let frames: Vec<Frame> = payloads
                .into_iter()
                .enumerate()
                .map(|(i, p)| Frame { seq: i as u8, cat: 0x01, id: 0x01, payload: p })
                .collect();
            let mut wire = Vec::new();
            for f in &frames {
                wire.extend(f.encode());
            }

            let mut decoder = FrameDecoder::new();
            let mut decoded = Vec::new();
            let mut pos = 0;
            for &sp in &split_points {
                if pos >= wire.len() {
                    break;
                }
                let end = (pos + sp).min(wire.len());
                decoded.extend(decoder.push(&wire[pos..end]));
                pos = end;
            }
            if pos < wire.len() {
                decoded.extend(decoder.push(&wire[pos..]));
            }
            proptest::prop_assert_eq!(decoded, frames);
        }
    }
}
