//! Frame inspection commands.

use anyhow::Result;

use flicker_core::config::FlickerConfig;
use flicker_core::frame::{chunk_with, parse_frame};

pub fn cmd_chunk(input: &str, config: &FlickerConfig) -> Result<()> {
    let payload = super::read_arg(input)?;
    let set = chunk_with(
        &payload,
        config.transport.threshold_chars,
        config.transport.frame_chars,
    )?;
    tracing::info!(session = %set.session_id, total = set.len(), chunked = set.is_chunked, "payload chunked");
    for text in set.texts() {
        println!("{}", text);
    }
    Ok(())
}

pub fn cmd_parse(text: &str) -> Result<()> {
    let Some(frame) = parse_frame(text) else {
        println!("not a frame");
        return Ok(());
    };

    println!("═══════════════════════════════════════");
    println!("  Frame");
    println!("═══════════════════════════════════════");
    println!("  Session : {}", frame.session_id);
    println!("  Index   : {} of {}", frame.index, frame.total);
    println!("  Slice   : {} chars", frame.slice.chars().count());
    Ok(())
}
