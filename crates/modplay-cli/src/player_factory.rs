//! Decoder selection by file extension.

use anyhow::{Result, bail};
use modplay::{ProTrackerDecoder, WavRenderDecoder};
use modplay_common::{ModuleDecoder, is_module_extension};
use std::path::Path;

/// Pick the decoder bridge for a file.
pub fn create_decoder(path: &Path) -> Result<Box<dyn ModuleDecoder>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "mod" => Ok(Box::new(ProTrackerDecoder::new())),
        "wav" => Ok(Box::new(WavRenderDecoder::new())),
        ext if is_module_extension(ext) => bail!(
            "{}: .{ext} modules are not supported by the bundled decoders \
             (ProTracker .mod is; render other formats to a 16-bit WAV to play them)",
            path.display()
        ),
        "" => bail!("{}: cannot tell the format without an extension", path.display()),
        ext => bail!("{}: unsupported file type .{ext}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_renders_are_playable() {
        assert!(create_decoder(Path::new("Song.WAV")).is_ok());
    }

    #[test]
    fn protracker_modules_are_playable() {
        let decoder = create_decoder(Path::new("intro.MOD")).unwrap();
        assert!(decoder.module_info().is_none());
    }

    #[test]
    fn other_module_formats_explain_why() {
        let err = create_decoder(Path::new("intro.xm")).err().unwrap();
        let message = err.to_string();
        assert!(message.contains(".xm"));
        assert!(message.contains("ProTracker .mod"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = create_decoder(Path::new("notes.txt")).err().unwrap();
        assert!(err.to_string().contains(".txt"));
        assert!(create_decoder(Path::new("README")).is_err());
    }
}
