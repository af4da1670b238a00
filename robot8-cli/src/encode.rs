use std::{
    fs::File,
    io::BufWriter,
    path::Path,
};

use robot8::{
    FrameBuffer,
    Timing,
    ToneEncoder,
    VisCode,
};

use crate::{
    Error,
    ticks::write_tones,
};

pub fn encode_to_path<F>(
    path: impl AsRef<Path>,
    timing: Timing,
    frame_buffer: F,
    vis_code: VisCode,
    flip_parity: bool,
) -> Result<usize, Error>
where
    F: FrameBuffer,
{
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), %vis_code, flip_parity, "Encoding transmission");

    let encoder = ToneEncoder::builder(timing)
        .with_vis_code(vis_code)
        .with_flipped_parity(flip_parity)
        .build(frame_buffer);

    write_tones(BufWriter::new(File::create(path)?), encoder)
}
