use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use openh264::decoder::Decoder;
use tracing::debug;

use crate::bitstream::AccessUnitReader;
use crate::{BenchError, Codec, DecoderVariant, FrameSource, FrameStep};

/// Software decode of an H.264 Annex-B stream, one access unit per step.
/// Once the stream runs dry the decoder's buffered pictures are drained as
/// a final step.
pub struct OpenH264Source {
    reader: AccessUnitReader<BufReader<File>>,
    decoder: Decoder,
    packed: Vec<u8>,
    finished: bool,
}

impl OpenH264Source {
    pub fn open(path: &Path, codec: Codec, chunk_bytes: usize) -> Result<Self, BenchError> {
        if codec != Codec::H264 {
            return Err(BenchError::Unsupported(format!(
                "openh264 decodes h264 only, got {codec}"
            )));
        }
        let file = File::open(path).map_err(|err| BenchError::io(path, err))?;
        let decoder = Decoder::new()
            .map_err(|err| BenchError::Unsupported(format!("openh264 init failed: {err}")))?;
        debug!(path = %path.display(), chunk_bytes, "opened openh264 source");

        Ok(Self {
            reader: AccessUnitReader::new(BufReader::new(file), codec, chunk_bytes),
            decoder,
            packed: Vec::new(),
            finished: false,
        })
    }
}

impl FrameSource for OpenH264Source {
    fn variant(&self) -> DecoderVariant {
        DecoderVariant::Software
    }

    fn advance(&mut self) -> Result<FrameStep, BenchError> {
        if self.finished {
            return Ok(FrameStep::EndOfStream);
        }

        let Some(au) = self.reader.next_access_unit()? else {
            self.finished = true;
            let remaining = self
                .decoder
                .flush_remaining()
                .map_err(|err| BenchError::Decode(format!("openh264 flush: {err}")))?;
            return Ok(FrameStep::Decoded {
                frames: remaining.len(),
            });
        };
        au.pack_annexb_into(&mut self.packed);

        let picture = self
            .decoder
            .decode(&self.packed)
            .map_err(|err| BenchError::Decode(format!("openh264: {err}")))?;
        Ok(FrameStep::Decoded {
            frames: usize::from(picture.is_some()),
        })
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
