use super::FrameSink;
use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes frames as numbered PNG files (`frame_000000.png`, ...)
pub struct ImageSequenceSink {
    directory: PathBuf,
    written: u64,
}

impl ImageSequenceSink {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)
            .with_context(|| format!("Failed to create {}", directory.display()))?;

        tracing::info!("Writing frames to {}", directory.display());

        Ok(Self {
            directory,
            written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageSequenceSink {
    /// Encodes into a hidden `.part` file and renames it into place, so an
    /// interrupted run never leaves a truncated `frame_*.png` behind.
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let name = format!("frame_{:06}.png", self.written);
        let path = self.directory.join(&name);
        let partial = self.directory.join(format!(".{}.part", name));

        frame
            .save_with_format(&partial, ImageFormat::Png)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        if let Err(e) = fs::rename(&partial, &path) {
            let _ = fs::remove_file(&partial);
            return Err(e).with_context(|| format!("Failed to move frame to {}", path.display()));
        }

        self.written += 1;
        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frames_are_numbered_in_write_order() {
        let dir = std::env::temp_dir().join(format!("lanify-sink-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut sink = ImageSequenceSink::new(&dir).unwrap();
        sink.write_frame(&RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]))).unwrap();
        sink.write_frame(&RgbImage::from_pixel(3, 2, Rgb([4, 5, 6]))).unwrap();
        assert_eq!(sink.frames_written(), 2);

        let second = image::open(dir.join("frame_000001.png")).unwrap().to_rgb8();
        assert_eq!(second.get_pixel(2, 1), &Rgb([4, 5, 6]));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_only_finished_frames_remain() {
        let dir = std::env::temp_dir().join(format!("lanify-sink-partial-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut sink = ImageSequenceSink::new(&dir).unwrap();
        for _ in 0..3 {
            sink.write_frame(&RgbImage::from_pixel(4, 4, Rgb([7, 7, 7]))).unwrap();
        }

        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["frame_000000.png", "frame_000001.png", "frame_000002.png"]
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_write_keeps_count() {
        let dir = std::env::temp_dir().join(format!("lanify-sink-gone-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let mut sink = ImageSequenceSink::new(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert!(sink.write_frame(&RgbImage::new(2, 2)).is_err());
        assert_eq!(sink.frames_written(), 0);
    }
}
