//! Automatic crop detection.
//!
//! ffmpeg's `cropdetect` filter runs over a fixed window of the video and
//! reports a `crop=W:H:X:Y` candidate for every analysed frame. The
//! dimensions reported most often win.

use std::path::Path;
use std::sync::OnceLock;
use log::debug;
use regex::Regex;
use crate::config::DetectConfig;
use crate::error::CropError;
use crate::geometry::Rectangle;
use crate::tools::MediaTools;

/// One distinct candidate and how many frames reported it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionSample {
    pub rectangle: Rectangle,
    pub count: usize,
}

fn crop_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"crop=(\d+):(\d+):(\d+):(\d+)").expect("crop pattern is a valid regex")
    })
}

/// Arguments for sampling `file_path` with the configured cropdetect filter.
/// Output is discarded through the null muxer; only stderr is of interest.
pub fn build_detect_args(file_path: &Path, detect: &DetectConfig) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-ss".to_string(),
        detect.start_secs.to_string(),
        "-i".to_string(),
        file_path.to_string_lossy().to_string(),
        "-t".to_string(),
        detect.duration_secs.to_string(),
        "-an".to_string(),
        "-sn".to_string(),
        "-vf".to_string(),
        detect.filter.clone(),
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}

/// Extract every crop candidate from ffmpeg's log output, in report order.
/// Lines without a well-formed `crop=W:H:X:Y` are ignored.
pub fn parse_candidates(output: &str) -> Vec<Rectangle> {
    crop_pattern()
        .captures_iter(output)
        .filter_map(|caps| {
            let value = format!("{}:{}:{}:{}", &caps[1], &caps[2], &caps[3], &caps[4]);
            Rectangle::from_crop_value(&value)
        })
        .collect()
}

/// Count occurrences of each distinct candidate, ordered by last report
pub fn tally(candidates: &[Rectangle]) -> Vec<DetectionSample> {
    let mut samples: Vec<DetectionSample> = Vec::new();
    for rect in candidates {
        let count = match samples.iter().position(|s| s.rectangle == *rect) {
            Some(idx) => samples.remove(idx).count + 1,
            None => 1,
        };
        samples.push(DetectionSample { rectangle: *rect, count });
    }
    samples
}

/// Pick the most frequently reported candidate.
///
/// Samples are stable-sorted by count and the last one is taken, so on a tie
/// the candidate reported last in the stream wins. Returns `None` only for an
/// empty candidate list.
pub fn select_most_frequent(candidates: &[Rectangle]) -> Option<DetectionSample> {
    let mut samples = tally(candidates);
    samples.sort_by_key(|s| s.count);
    samples.pop()
}

/// Detect the crop target for `file_path` by sampling it with `tools`.
pub async fn detect<T: MediaTools>(tools: &T, file_path: &Path) -> Result<Rectangle, CropError> {
    let candidates = tools.crop_candidates(file_path).await?;

    let best = select_most_frequent(&candidates).ok_or_else(|| CropError::Detection {
        path: file_path.to_path_buf(),
        reason: "cropdetect reported no crop values in the sample window".to_string(),
    })?;

    debug!(
        "Crop parameters found: {} ({} of {} frames, {} distinct candidates)",
        best.rectangle,
        best.count,
        candidates.len(),
        tally(&candidates).len()
    );

    Ok(best.rectangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect(width: u32, height: u32) -> Rectangle {
        Rectangle::new(width, height).unwrap()
    }

    const FFMPEG_LOG: &str = "\
[Parsed_cropdetect_0 @ 0x55d5c8] x1:0 x2:1919 y1:140 y2:939 w:1920 h:800 x:0 y:140 pts:1001 t:0.041708 crop=1920:800:0:140
[Parsed_cropdetect_0 @ 0x55d5c8] x1:0 x2:1919 y1:140 y2:939 w:1920 h:800 x:0 y:140 pts:2002 t:0.083417 crop=1920:800:0:140
frame=   48 fps=0.0 q=-0.0 size=N/A time=00:00:02.00 bitrate=N/A speed=3.9x
[Parsed_cropdetect_0 @ 0x55d5c8] x1:0 x2:1919 y1:132 y2:947 w:1920 h:816 x:0 y:132 pts:3003 t:0.125125 crop=1920:816:0:132
";

    #[test]
    fn test_parse_candidates_from_ffmpeg_log() {
        let candidates = parse_candidates(FFMPEG_LOG);
        assert_eq!(candidates, vec![rect(1920, 800), rect(1920, 800), rect(1920, 816)]);
    }

    #[test]
    fn test_parse_ignores_malformed_values() {
        assert!(parse_candidates("crop=1920:800\ncrop=0:800:0:0\nno crop here").is_empty());
    }

    #[test]
    fn test_majority_wins() {
        let candidates = ["1920:800:0:140", "1920:800:0:140", "1920:816:0:132"]
            .iter()
            .filter_map(|v| Rectangle::from_crop_value(v))
            .collect::<Vec<_>>();
        let best = select_most_frequent(&candidates).unwrap();
        assert_eq!(best.rectangle, rect(1920, 800));
        assert_eq!(best.count, 2);
    }

    #[test]
    fn test_offsets_do_not_split_votes() {
        // Same dimensions at different offsets count as one candidate
        let candidates = parse_candidates("crop=1920:800:0:140 crop=1920:800:0:138 crop=1920:816:0:132");
        assert_eq!(select_most_frequent(&candidates).unwrap().rectangle, rect(1920, 800));
    }

    #[test]
    fn test_tie_prefers_candidate_reported_last() {
        let candidates = vec![rect(1920, 816), rect(1920, 800), rect(1920, 800), rect(1920, 816)];
        assert_eq!(select_most_frequent(&candidates).unwrap().rectangle, rect(1920, 816));

        let candidates = vec![rect(1920, 800), rect(1920, 816), rect(1920, 816), rect(1920, 800)];
        assert_eq!(select_most_frequent(&candidates).unwrap().rectangle, rect(1920, 800));

        let candidates = vec![rect(1920, 800), rect(1920, 816)];
        assert_eq!(select_most_frequent(&candidates).unwrap().rectangle, rect(1920, 816));
    }

    #[test]
    fn test_no_candidates() {
        assert!(select_most_frequent(&[]).is_none());
    }

    #[test]
    fn test_detect_args_use_configured_window() {
        let detect = DetectConfig {
            start_secs: 60,
            duration_secs: 90,
            filter: "cropdetect=limit=24:round=16:reset=0".to_string(),
        };
        let args = build_detect_args(Path::new("/downloads/movie.mkv"), &detect);

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "seek must precede the input for fast seeking");
        assert_eq!(args[ss + 1], "60");
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "90"));
        assert!(args.windows(2).any(|w| w[0] == "-vf" && w[1] == detect.filter));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "null"));
    }

    fn candidate() -> impl Strategy<Value = Rectangle> {
        prop_oneof![
            Just(rect(1920, 800)),
            Just(rect(1920, 816)),
            Just(rect(1920, 1080)),
            Just(rect(1440, 1080)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_winner_has_maximal_count(candidates in prop::collection::vec(candidate(), 1..200)) {
            let best = select_most_frequent(&candidates).unwrap();
            let max = tally(&candidates).iter().map(|s| s.count).max().unwrap();
            prop_assert_eq!(best.count, max);
            prop_assert_eq!(
                candidates.iter().filter(|r| **r == best.rectangle).count(),
                best.count
            );
        }

        #[test]
        fn test_tie_goes_to_latest_report(candidates in prop::collection::vec(candidate(), 1..200)) {
            let best = select_most_frequent(&candidates).unwrap();
            let last_seen = |r: &Rectangle| candidates.iter().rposition(|c| c == r).unwrap();
            for sample in tally(&candidates).iter().filter(|s| s.count == best.count) {
                prop_assert!(last_seen(&sample.rectangle) <= last_seen(&best.rectangle));
            }
        }

        #[test]
        fn test_tally_accounts_for_every_frame(candidates in prop::collection::vec(candidate(), 0..200)) {
            let total: usize = tally(&candidates).iter().map(|s| s.count).sum();
            prop_assert_eq!(total, candidates.len());
        }
    }
}
