/*!
    Rendering handoff between the decoder and the encoder.

    The decoder renders kept frames into a shared single-slot [`Surface`].
    The [`RenderBridge`] takes each image off that surface, draws it at the
    encoder's input size, stamps it with the corrected presentation time and
    commits it to the encoder's [`InputSurface`]:

    ```ignore
    let mut bridge = RenderBridge::new(encoder.create_input_surface()?, 1280, 720);
    decoder.configure(&format, CodecMode::Decode { surface: Some(bridge.surface()) })?;

    decoder.release_output_buffer(index, true)?;
    bridge.await_new_image()?;
    bridge.draw_image()?;
    bridge.set_presentation_time(pts)?;
    bridge.swap_buffers()?;
    ```
*/

mod bridge;
mod scale;

pub use transcode_types::{Error, InputSurface, Result, Surface, VideoFrame};

pub use bridge::RenderBridge;
pub use scale::Scaler;
