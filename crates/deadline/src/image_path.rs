//! Output-image path construction for task previews.
//!
//! Deadline stores a job's output directory and a templated file name
//! (`shot_####.exr` or `shot_%04d.exr`); the frame number comes from the
//! task's frame range. Frame numbers under 1000 are zero-padded to four
//! digits to match the renderer's on-disk naming.

use std::path::PathBuf;

/// Build the on-disk path of the first frame rendered by a task.
///
/// Returns `None` when the frame range doesn't start with a number or the
/// file name uses a padding convention we don't know about.
pub fn construct_image_path(
    frame_range: &str,
    output_path: &str,
    file_name: &str,
) -> Option<PathBuf> {
    let first_frame = frame_range.split('-').next()?;
    let frame_number: i64 = first_frame.trim().parse().ok()?;

    let padded = if frame_number < 1000 {
        format!("{frame_number:04}")
    } else {
        first_frame.trim().to_string()
    };

    let constructed = if file_name.contains("####") {
        file_name.replace("####", &padded)
    } else if file_name.contains("%04d") {
        file_name.replace("%04d", &padded)
    } else {
        tracing::warn!(file_name, "Unhandled output file name pattern");
        return None;
    };

    Some(PathBuf::from(output_path).join(constructed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_small_frame_numbers_to_four_digits() {
        let path = construct_image_path("1-10", "/out", "shot_####.exr").unwrap();
        assert_eq!(path, PathBuf::from("/out/shot_0001.exr"));
    }

    #[test]
    fn keeps_large_frame_numbers_unpadded() {
        let path = construct_image_path("1050-1060", "/out", "shot_####.exr").unwrap();
        assert_eq!(path, PathBuf::from("/out/shot_1050.exr"));
    }

    #[test]
    fn supports_printf_style_padding() {
        let path = construct_image_path("42-50", "/out", "shot_%04d.exr").unwrap();
        assert_eq!(path, PathBuf::from("/out/shot_0042.exr"));
    }

    #[test]
    fn single_frame_ranges_work() {
        let path = construct_image_path("7", "/out", "shot_####.exr").unwrap();
        assert_eq!(path, PathBuf::from("/out/shot_0007.exr"));
    }

    #[test]
    fn unknown_patterns_are_rejected() {
        assert!(construct_image_path("1-10", "/out", "shot_no_padding.exr").is_none());
    }

    #[test]
    fn non_numeric_frame_ranges_are_rejected() {
        assert!(construct_image_path("all", "/out", "shot_####.exr").is_none());
    }
}
