//! Subtitle serializers for caption segments.
//!
//! Two formats are emitted:
//! - ASS with named styles, used for the primary styled burn
//! - SRT with a force_style string, used as the fallback burn
//!
//! Both serializers round-trip text, ordering, and time bounds to one
//! decimal through the matching parser.

use clipforge_models::{CaptionSegment, CaptionStyle};

/// force_style passed to the subtitles filter when burning SRT.
pub const SRT_FORCE_STYLE: &str =
    "FontName=Arial Black,FontSize=28,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,\
     Outline=2,Alignment=2,MarginV=40";

/// ASS script header with the style table.
///
/// 1080x1920 canvas, Arial Black, bottom-center alignment (2), 60 px
/// vertical margin. Colours are &HAABBGGRR.
const ASS_HEADER: &str = "\
[Script Info]
Title: clipforge captions
ScriptType: v4.00+
PlayResX: 1080
PlayResY: 1920
WrapStyle: 0
ScaledBorderAndShadow: yes

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Normal,Arial Black,70,&H00FFFFFF,&H00FFFFFF,&H00000000,&H80000000,-1,0,0,0,100,100,0,0,1,4,2,2,40,40,60,1
Style: Emphasis,Arial Black,80,&H0000FFFF,&H0000FFFF,&H00000000,&H80000000,-1,0,0,0,100,100,0,0,1,4,2,2,40,40,60,1
Style: Hook,Arial Black,85,&H0000FF00,&H0000FF00,&H00000000,&H80000000,-1,0,0,0,100,100,0,0,1,4,2,2,40,40,60,1
Style: Punchline,Arial Black,75,&H0000A5FF,&H0000A5FF,&H00000000,&H80000000,-1,0,0,0,100,100,0,0,1,4,2,2,40,40,60,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

/// Serialize caption segments to an ASS script.
pub fn to_ass(segments: &[CaptionSegment]) -> String {
    let mut out = String::from(ASS_HEADER);

    for seg in segments {
        out.push_str(&format!(
            "Dialogue: 0,{},{},{},,0,0,60,,{}\n",
            format_ass_time(seg.start),
            format_ass_time(seg.end),
            seg.style.ass_style_name(),
            seg.display_text().replace('\n', " "),
        ));
    }

    out
}

/// Parse an ASS script back into caption segments.
///
/// Only Dialogue lines are read; the parsed text is the rendered text
/// (including any emoji suffix).
pub fn parse_ass(content: &str) -> Vec<CaptionSegment> {
    let mut segments = Vec::new();

    for line in content.lines() {
        let Some(rest) = line.strip_prefix("Dialogue: ") else {
            continue;
        };
        // Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
        let fields: Vec<&str> = rest.splitn(10, ',').collect();
        if fields.len() != 10 {
            continue;
        }

        let (Some(start), Some(end)) =
            (parse_ass_time(fields[1]), parse_ass_time(fields[2]))
        else {
            continue;
        };

        let style = match fields[3] {
            "Emphasis" => CaptionStyle::Emphasis,
            "Hook" => CaptionStyle::Hook,
            "Punchline" => CaptionStyle::Punchline,
            _ => CaptionStyle::Normal,
        };

        segments.push(CaptionSegment {
            text: fields[9].to_string(),
            start,
            end,
            words: Vec::new(),
            style,
            emoji: None,
        });
    }

    segments
}

/// Serialize caption segments to SRT.
pub fn to_srt(segments: &[CaptionSegment]) -> String {
    let mut out = String::new();

    for (i, seg) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_time(seg.start),
            format_srt_time(seg.end),
            seg.display_text(),
        ));
    }

    out
}

/// Parse an SRT file back into caption segments.
pub fn parse_srt(content: &str) -> Vec<CaptionSegment> {
    let mut segments = Vec::new();

    for block in content.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());
        // Index line
        if lines.next().is_none() {
            continue;
        }
        let Some(time_line) = lines.next() else {
            continue;
        };
        let Some((start_str, end_str)) = time_line.split_once("-->") else {
            continue;
        };
        let (Some(start), Some(end)) = (
            parse_srt_time(start_str.trim()),
            parse_srt_time(end_str.trim()),
        ) else {
            continue;
        };

        let text = lines.collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }

        segments.push(CaptionSegment {
            text,
            start,
            end,
            words: Vec::new(),
            style: CaptionStyle::Normal,
            emoji: None,
        });
    }

    segments
}

/// Format seconds as ASS time: `H:MM:SS.cc`.
fn format_ass_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_cs = (seconds * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

/// Parse an ASS time back to seconds.
fn parse_ass_time(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let h: f64 = parts[0].parse().ok()?;
    let m: f64 = parts[1].parse().ok()?;
    let sec: f64 = parts[2].parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + sec)
}

/// Format seconds as SRT time: `HH:MM:SS,mmm`.
fn format_srt_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Parse an SRT time back to seconds.
fn parse_srt_time(s: &str) -> Option<f64> {
    let (hms, ms) = s.split_once(',')?;
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let h: f64 = parts[0].parse().ok()?;
    let m: f64 = parts[1].parse().ok()?;
    let sec: f64 = parts[2].parse().ok()?;
    let ms: f64 = ms.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + sec + ms / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::CaptionWord;

    fn sample_segments() -> Vec<CaptionSegment> {
        let mut hook = CaptionSegment::from_words(vec![
            CaptionWord::new("what", 0.5, 0.8),
            CaptionWord::new("if", 0.8, 1.0),
            CaptionWord::new("I", 1.0, 1.2),
        ]);
        hook.style = CaptionStyle::Hook;
        hook.emoji = Some("👀".to_string());

        let normal = CaptionSegment::from_words(vec![
            CaptionWord::new("told", 1.3, 1.6),
            CaptionWord::new("you", 1.6, 1.9),
        ]);

        let mut punch = CaptionSegment::from_words(vec![
            CaptionWord::new("but", 2.1, 2.4),
            CaptionWord::new("wait!", 2.4, 2.9),
        ]);
        punch.style = CaptionStyle::Punchline;
        punch.emoji = Some("💥".to_string());

        vec![hook, normal, punch]
    }

    #[test]
    fn test_ass_time_format() {
        assert_eq!(format_ass_time(0.0), "0:00:00.00");
        assert_eq!(format_ass_time(1.5), "0:00:01.50");
        assert_eq!(format_ass_time(3661.25), "1:01:01.25");
    }

    #[test]
    fn test_srt_time_format() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(1.5), "00:00:01,500");
        assert_eq!(format_srt_time(3661.25), "01:01:01,250");
    }

    #[test]
    fn test_ass_round_trip() {
        let segments = sample_segments();
        let script = to_ass(&segments);
        let parsed = parse_ass(&script);

        assert_eq!(parsed.len(), segments.len());
        for (original, round) in segments.iter().zip(&parsed) {
            assert_eq!(round.text, original.display_text());
            assert_eq!(round.style, original.style);
            assert!((round.start - original.start).abs() < 0.05);
            assert!((round.end - original.end).abs() < 0.05);
        }
    }

    #[test]
    fn test_srt_round_trip() {
        let segments = sample_segments();
        let srt = to_srt(&segments);
        let parsed = parse_srt(&srt);

        assert_eq!(parsed.len(), segments.len());
        for (original, round) in segments.iter().zip(&parsed) {
            assert_eq!(round.text, original.display_text());
            assert!((round.start - original.start).abs() < 0.05);
            assert!((round.end - original.end).abs() < 0.05);
        }
    }

    #[test]
    fn test_ass_header_styles() {
        let script = to_ass(&[]);
        assert!(script.contains("Style: Normal,Arial Black,70"));
        assert!(script.contains("Style: Emphasis,Arial Black,80"));
        assert!(script.contains("Style: Hook,Arial Black,85"));
        assert!(script.contains("Style: Punchline,Arial Black,75"));
        assert!(script.contains("PlayResX: 1080"));
        assert!(script.contains("PlayResY: 1920"));
    }

    #[test]
    fn test_srt_force_style_fields() {
        assert!(SRT_FORCE_STYLE.contains("Arial Black"));
        assert!(SRT_FORCE_STYLE.contains("FontSize=28"));
        assert!(SRT_FORCE_STYLE.contains("Alignment=2"));
        assert!(SRT_FORCE_STYLE.contains("MarginV=40"));
    }

    #[test]
    fn test_parse_srt_skips_malformed_blocks() {
        let srt = "1\nnot a time line\ntext\n\n2\n00:00:01,000 --> 00:00:02,000\nok\n\n";
        let parsed = parse_srt(srt);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "ok");
    }
}
