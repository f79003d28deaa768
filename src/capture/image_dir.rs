use super::FrameSource;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Frames decoded from the image files of one directory, in natural file-name order
/// (`frame_2.png` before `frame_10.png`).
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();
        let paths = frame_paths(directory)?;

        let Some(first) = paths.first() else {
            bail!("No frames found in {}", directory.display());
        };
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("Failed to read {}", first.display()))?;

        tracing::info!(
            "Reading {} frames ({}x{}) from {}",
            paths.len(),
            width,
            height,
            directory.display()
        );

        Ok(Self {
            paths,
            next: 0,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn frame_paths(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    let entries = fs::read_dir(directory)
        .with_context(|| format!("Failed to list {}", directory.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read an entry of {}", directory.display()))?;
        let path = entry.path();
        let is_frame = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if is_frame {
            paths.push(path);
        }
    }

    alphanumeric_sort::sort_path_slice(&mut paths);
    Ok(paths)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let frame = image::open(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgb8();

        // Streams have a fixed size; a change is a broken input, not something to adapt to
        if frame.dimensions() != (self.width, self.height) {
            bail!(
                "{} is {}x{}, stream is {}x{}",
                path.display(),
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
        }

        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lanify-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_frames_come_out_in_natural_order() {
        let dir = scratch_dir("source-order");
        for i in [10u8, 2, 1] {
            RgbImage::from_pixel(8, 4, Rgb([i, 0, 0]))
                .save(dir.join(format!("frame_{}.png", i)))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::new(&dir).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.resolution(), (8, 4));

        let mut reds = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            reds.push(frame.get_pixel(0, 0)[0]);
        }
        assert_eq!(reds, vec![1, 2, 10]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_size_change_is_an_error() {
        let dir = scratch_dir("source-size");
        RgbImage::new(8, 4).save(dir.join("a.png")).unwrap();
        RgbImage::new(4, 4).save(dir.join("b.png")).unwrap();

        let mut source = ImageSequenceSource::new(&dir).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let dir = scratch_dir("source-empty");
        assert!(ImageSequenceSource::new(&dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_listing_errors_are_reported() {
        let missing = std::env::temp_dir().join(format!("lanify-source-missing-{}", std::process::id()));
        let _ = fs::remove_dir_all(&missing);

        let err = frame_paths(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to list"));
    }

    #[test]
    fn test_unfinished_sink_files_are_not_frames() {
        let dir = scratch_dir("source-partial");
        RgbImage::new(2, 2).save(dir.join("frame_000000.png")).unwrap();
        fs::write(dir.join(".frame_000001.png.part"), b"truncated").unwrap();

        let paths = frame_paths(&dir).unwrap();
        assert_eq!(paths, vec![dir.join("frame_000000.png")]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
