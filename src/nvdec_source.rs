use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use cudarc::driver::CudaContext;
use nvidia_video_codec_sdk::{DecodeCodec, DecodeError, DecodeOptions};
use tracing::debug;

use crate::bitstream::AccessUnitReader;
use crate::{BenchError, Codec, DecoderVariant, FrameSource, FrameStep};

/// NVDEC hardware decode, one access unit per step. Once the stream runs
/// dry the decoder is drained as a final step.
pub struct NvdecSource {
    reader: AccessUnitReader<BufReader<File>>,
    decoder: nvidia_video_codec_sdk::Decoder,
    packed: Vec<u8>,
    next_pts_90k: i64,
    drained: bool,
}

// 30 fps in 90 kHz ticks; NVDEC only needs monotonically increasing stamps.
const PTS_STEP_90K: i64 = 3_000;

impl NvdecSource {
    pub fn open(
        path: &Path,
        codec: Codec,
        gpu_index: usize,
        chunk_bytes: usize,
    ) -> Result<Self, BenchError> {
        let file = File::open(path).map_err(|err| BenchError::io(path, err))?;
        let cuda_ctx = CudaContext::new(gpu_index).map_err(|err| {
            BenchError::Unsupported(format!("failed to initialize CUDA context: {err}"))
        })?;
        let decoder = nvidia_video_codec_sdk::Decoder::new(
            cuda_ctx,
            to_decode_codec(codec),
            DecodeOptions::default(),
        )
        .map_err(map_decode_error)?;
        debug!(path = %path.display(), %codec, gpu_index, "opened nvdec source");

        Ok(Self {
            reader: AccessUnitReader::new(BufReader::new(file), codec, chunk_bytes),
            decoder,
            packed: Vec::new(),
            next_pts_90k: 0,
            drained: false,
        })
    }

    fn bump_pts_90k(&mut self) -> i64 {
        let current = self.next_pts_90k;
        self.next_pts_90k = self.next_pts_90k.saturating_add(PTS_STEP_90K);
        current
    }
}

impl FrameSource for NvdecSource {
    fn variant(&self) -> DecoderVariant {
        DecoderVariant::Hardware
    }

    fn advance(&mut self) -> Result<FrameStep, BenchError> {
        if self.drained {
            return Ok(FrameStep::EndOfStream);
        }

        match self.reader.next_access_unit()? {
            Some(au) => {
                au.pack_annexb_into(&mut self.packed);
                let pts = self.bump_pts_90k();
                let frames = self
                    .decoder
                    .push_access_unit(&self.packed, pts)
                    .map_err(map_decode_error)?;
                Ok(FrameStep::Decoded {
                    frames: frames.len(),
                })
            }
            None => {
                self.drained = true;
                let frames = self.decoder.flush().map_err(map_decode_error)?;
                Ok(FrameStep::Decoded {
                    frames: frames.len(),
                })
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.drained
    }
}

fn to_decode_codec(codec: Codec) -> DecodeCodec {
    match codec {
        Codec::H264 => DecodeCodec::H264,
        Codec::Hevc => DecodeCodec::H265,
    }
}

fn map_decode_error(error: DecodeError) -> BenchError {
    match error {
        DecodeError::Unsupported(message) => BenchError::Unsupported(message),
        DecodeError::InvalidInput(message) => BenchError::Decode(format!("invalid input: {message}")),
        DecodeError::Cuda(err) => BenchError::Decode(format!("cuda decode error: {err}")),
        DecodeError::Nvdec { operation, code } => {
            BenchError::Decode(format!("nvdec({operation}) failed: {code:?}"))
        }
        DecodeError::Internal(message) => BenchError::Decode(message),
    }
}
