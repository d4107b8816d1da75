//! Five-day volume extraction from the embedded chart SVG.
//!
//! The key-statistics-charts endpoint embeds an HTML-escaped SVG. Its
//! `<text>` elements carry pixel coordinates: labels with y in [240, 260]
//! are the date axis (y < 250 the day number, y >= 250 the month name,
//! grouped by shared x), while compact strings like "12.3M" anywhere are
//! volume labels. A date group joins to the volume label nearest by x.
//! Anything malformed degrades to an empty list, never an error.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

/// One correlated date/volume pair off the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumePoint {
    /// Display date, "{day} {month}" (e.g. "12 Jan").
    pub date: String,
    /// Raw compact volume label (e.g. "12.3M").
    pub volume: String,
}

/// Positioned text element pulled from the SVG.
struct TextLabel {
    x: String,
    y: f64,
    text: String,
}

#[derive(Default)]
struct DateParts {
    day: Option<String>,
    month: Option<String>,
}

/// Extract volume points from the (still escaped) SVG payload.
pub fn extract_volume_points(escaped_svg: &str) -> Vec<VolumePoint> {
    let svg = match quick_xml::escape::unescape(escaped_svg) {
        Ok(s) => s.into_owned(),
        Err(_) => escaped_svg.to_string(),
    };

    let labels = match collect_text_labels(&svg) {
        Some(labels) => labels,
        None => {
            debug!("chart SVG failed to parse, no volume points");
            return Vec::new();
        }
    };

    correlate(&labels)
}

/// Walk the SVG and collect every `<text>` element that has both x and y.
fn collect_text_labels(svg: &str) -> Option<Vec<TextLabel>> {
    let mut reader = Reader::from_str(svg);
    let mut labels = Vec::new();
    // (x, y) of the <text> element currently open, if any.
    let mut open: Option<(String, f64)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"text" => {
                let x = attr_string(&e, "x");
                let y = attr_string(&e, "y").and_then(|v| v.parse::<f64>().ok());
                open = match (x, y) {
                    (Some(x), Some(y)) => Some((x, y)),
                    _ => None,
                };
            }
            Ok(Event::Text(t)) => {
                if let Some((x, y)) = open.as_ref() {
                    let content = t.unescape().ok()?.trim().to_string();
                    if !content.is_empty() {
                        labels.push(TextLabel {
                            x: x.clone(),
                            y: *y,
                            text: content,
                        });
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"text" => {
                open = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    Some(labels)
}

fn attr_string(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Group date fragments by x, then join each complete group to the volume
/// label with the numerically closest x. First minimal distance wins; date
/// groups without any volume label are dropped.
fn correlate(labels: &[TextLabel]) -> Vec<VolumePoint> {
    static VOLUME_RE: OnceLock<Regex> = OnceLock::new();
    let volume_re = VOLUME_RE.get_or_init(|| Regex::new(r"^[\d,.]+[MK]$").expect("volume label regex"));

    // Insertion-ordered on first sight of each x, mirroring document order.
    let mut dates: Vec<(String, DateParts)> = Vec::new();
    let mut volumes: Vec<(f64, &str)> = Vec::new();

    for label in labels {
        let y = label.y as i64;
        if (240..=260).contains(&y) {
            let parts = match dates.iter_mut().find(|(x, _)| *x == label.x) {
                Some((_, parts)) => parts,
                None => {
                    dates.push((label.x.clone(), DateParts::default()));
                    &mut dates.last_mut().expect("just pushed").1
                }
            };
            if y < 250 {
                parts.day = Some(label.text.clone());
            } else {
                parts.month = Some(label.text.clone());
            }
        }
        if volume_re.is_match(&label.text) {
            if let Ok(x) = label.x.parse::<f64>() {
                volumes.push((x, label.text.as_str()));
            }
        }
    }

    let mut points = Vec::new();
    for (x, parts) in &dates {
        let (Some(day), Some(month)) = (&parts.day, &parts.month) else {
            continue;
        };
        let Ok(dx) = x.parse::<f64>() else { continue };

        let mut best: Option<(f64, &str)> = None;
        for (vx, text) in &volumes {
            let dist = (vx - dx).abs();
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, text));
            }
        }
        if let Some((_, volume)) = best {
            points.push(VolumePoint {
                date: format!("{day} {month}"),
                volume: volume.to_string(),
            });
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svg(body: &str) -> String {
        format!(r#"<svg xmlns="http://www.w3.org/2000/svg">{body}</svg>"#)
    }

    #[test]
    fn test_day_and_month_join_to_nearest_volume() {
        let payload = svg(
            r#"<text x="10" y="245">12</text>
               <text x="10" y="255">Jan</text>
               <text x="11" y="200">5.2M</text>"#,
        );
        let points = extract_volume_points(&payload);
        assert_eq!(
            points,
            vec![VolumePoint {
                date: "12 Jan".to_string(),
                volume: "5.2M".to_string(),
            }]
        );
    }

    #[test]
    fn test_escaped_payload_and_multiple_dates() {
        let raw = svg(
            r#"<text x="10" y="245">12</text>
               <text x="10" y="255">Jan</text>
               <text x="60" y="245">13</text>
               <text x="60" y="255">Jan</text>
               <text x="12" y="200">5.2M</text>
               <text x="58" y="200">700K</text>"#,
        );
        let escaped = raw
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");

        let points = extract_volume_points(&escaped);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "12 Jan");
        assert_eq!(points[0].volume, "5.2M");
        assert_eq!(points[1].date, "13 Jan");
        assert_eq!(points[1].volume, "700K");
    }

    #[test]
    fn test_incomplete_date_group_is_dropped() {
        // Day without month: no point emitted.
        let payload = svg(
            r#"<text x="10" y="245">12</text>
               <text x="11" y="200">5.2M</text>"#,
        );
        assert!(extract_volume_points(&payload).is_empty());
    }

    #[test]
    fn test_date_without_any_volume_is_dropped() {
        let payload = svg(
            r#"<text x="10" y="245">12</text>
               <text x="10" y="255">Jan</text>"#,
        );
        assert!(extract_volume_points(&payload).is_empty());
    }

    #[test]
    fn test_malformed_svg_yields_empty_list() {
        assert!(extract_volume_points("<svg><text x=").is_empty());
        assert!(extract_volume_points("").is_empty());
    }

    #[test]
    fn test_axis_labels_outside_band_are_ignored() {
        let payload = svg(
            r#"<text x="10" y="100">12</text>
               <text x="10" y="300">Jan</text>
               <text x="11" y="200">5.2M</text>"#,
        );
        assert!(extract_volume_points(&payload).is_empty());
    }
}
