//! Standalone HTML snapshots of analysis results
//!
//! A snapshot is a single self-contained page with the analyzed image, the
//! verdict and the score breakdown, meant to be saved or printed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::errors::{TruthError, TruthResult};
use crate::models::{DeepfakeResult, HistoryItem, StegoResult};

/// Scores above this read as abnormal in the per-technique explanations
const ABNORMAL_SCORE: u8 = 60;

/// A result that can be rendered into a snapshot.
pub trait Snapshot {
    /// Page heading
    fn heading(&self) -> &'static str;

    /// Short verdict badge text and its CSS class
    fn badge(&self) -> (&'static str, &'static str);

    /// One paragraph explaining the verdict
    fn explanation(&self) -> &'static str;

    /// Titled paragraphs explaining the individual measurements
    fn details(&self) -> Vec<(&'static str, String)>;

    /// Labelled percentages to draw as bars
    fn bars(&self) -> Vec<(String, f64)>;
}

impl Snapshot for StegoResult {
    fn heading(&self) -> &'static str {
        "Steganalysis Results"
    }

    fn badge(&self) -> (&'static str, &'static str) {
        if self.has_hidden_data() {
            ("Suspicious", "badge-alert")
        } else {
            ("Clean", "badge-ok")
        }
    }

    fn explanation(&self) -> &'static str {
        if self.has_hidden_data() {
            "This image appears to contain hidden data or has been manipulated. The steganalysis has detected patterns consistent with steganography techniques."
        } else {
            "This image appears to be clean. No significant patterns of hidden data were detected during the steganalysis process."
        }
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        let lsb = if self.lsb_score() > ABNORMAL_SCORE {
            "Our analysis found abnormal patterns in these bits, suggesting potential hidden data."
        } else {
            "Our analysis found normal patterns in these bits, suggesting no hidden data."
        };
        let dct = if self.dct_score() > ABNORMAL_SCORE {
            "Abnormal frequency patterns were detected in this image."
        } else {
            "No abnormal frequency patterns were detected in this image."
        };

        vec![
            (
                "LSB Analysis",
                format!(
                    "Least Significant Bit (LSB) analysis examines the least important bits in an image's pixels, which are often used to hide data. {}",
                    lsb
                ),
            ),
            (
                "DCT Analysis",
                format!(
                    "Discrete Cosine Transform (DCT) analysis examines frequency components of the image, which can reveal modifications made to hide information. {}",
                    dct
                ),
            ),
        ]
    }

    fn bars(&self) -> Vec<(String, f64)> {
        vec![
            ("Detection Score".to_string(), f64::from(self.overall_score())),
            ("LSB Analysis".to_string(), f64::from(self.lsb_score())),
            ("DCT Analysis".to_string(), f64::from(self.dct_score())),
            ("Confidence".to_string(), f64::from(self.confidence())),
        ]
    }
}

impl Snapshot for DeepfakeResult {
    fn heading(&self) -> &'static str {
        "Deepfake Detection Results"
    }

    fn badge(&self) -> (&'static str, &'static str) {
        if self.is_ai_generated {
            ("AI-Generated", "badge-alert")
        } else {
            ("Authentic", "badge-ok")
        }
    }

    fn explanation(&self) -> &'static str {
        if self.is_ai_generated {
            "This image appears to have characteristics commonly found in AI-generated or manipulated content. The analysis detected patterns consistent with artificial creation methods."
        } else {
            "This image appears to be authentic. Our analysis did not detect significant patterns that would indicate it was generated or manipulated by AI."
        }
    }

    fn details(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "What To Look For",
                "AI-generated images often have subtle inconsistencies in facial features, unnatural backgrounds, irregular lighting, or unusual artifacts. Our model is trained to detect these patterns.".to_string(),
            ),
            (
                "Limitations",
                "No detection system is perfect. AI technology is constantly evolving, making detection challenging. Always use critical thinking when evaluating digital content.".to_string(),
            ),
            ("Model", self.model_name.clone()),
        ]
    }

    fn bars(&self) -> Vec<(String, f64)> {
        let mut bars = vec![("Confidence".to_string(), f64::from(self.confidence))];
        bars.extend(
            self.classes
                .iter()
                .map(|class| (class.label.clone(), (class.score * 100.0).clamp(0.0, 100.0))),
        );
        bars
    }
}

/// Writes snapshots as `<base>.html`.
#[derive(Debug, Default)]
pub struct SnapshotExporter;

impl SnapshotExporter {
    pub fn new() -> Self {
        Self
    }

    /// Render `item` and write it next to `output_base`, returning the path written.
    pub fn export<R: Snapshot>(&self, item: &HistoryItem<R>, output_base: &Path) -> TruthResult<PathBuf> {
        let path = html_path(output_base);
        std::fs::write(&path, self.render(item)).map_err(|e| TruthError::io(e, path.clone()))?;
        log::info!("Snapshot of {} written to {}", item.filename, path.display());
        Ok(path)
    }

    pub fn render<R: Snapshot>(&self, item: &HistoryItem<R>) -> String {
        let result = &item.result;
        let (badge_text, badge_class) = result.badge();

        let bars: String = result
            .bars()
            .iter()
            .map(|(label, percent)| {
                format!(
                    r#"
            <div class="bar">
                <div class="bar-label"><span>{}</span><span>{:.0}%</span></div>
                <div class="bar-track"><div class="bar-fill" style="width: {:.1}%"></div></div>
            </div>"#,
                    escape_html(label),
                    percent,
                    percent
                )
            })
            .collect();

        let details: String = result
            .details()
            .iter()
            .map(|(title, text)| {
                format!(
                    r#"
            <div class="detail">
                <h4>{}</h4>
                <p>{}</p>
            </div>"#,
                    title,
                    escape_html(text)
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{heading} - {filename}</title>
    <style>
        body {{
            background: #ffffff;
            color: #111827;
            font-family: 'Inter', sans-serif;
            line-height: 1.6;
            max-width: 860px;
            margin: 2rem auto;
            padding: 0 1rem;
        }}
        .preview {{ width: 100%; max-height: 420px; object-fit: contain; background: #f3f4f6; border-radius: 8px; }}
        .meta {{ color: #6b7280; font-size: 0.9rem; }}
        .badge {{ display: inline-block; border-radius: 999px; padding: 0.2rem 0.8rem; font-weight: 600; font-size: 0.85rem; }}
        .badge-alert {{ background: rgba(239, 68, 68, 0.15); color: #dc2626; }}
        .badge-ok {{ background: rgba(34, 197, 94, 0.15); color: #16a34a; }}
        .bar {{ margin: 0.75rem 0; }}
        .bar-label {{ display: flex; justify-content: space-between; font-size: 0.9rem; }}
        .bar-track {{ height: 6px; background: #f3f4f6; border-radius: 999px; overflow: hidden; }}
        .bar-fill {{ height: 100%; background: #6366f1; }}
        .details {{ display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; }}
        .detail h4 {{ margin-bottom: 0.25rem; }}
        .detail p {{ color: #4b5563; font-size: 0.9rem; }}
    </style>
</head>
<body>
    <h1>{heading}</h1>
    <p class="meta" title="{filename}">{short_name} &middot; {date}</p>
    <img class="preview" src="{image_url}" alt="Analyzed image">
    <h2><span class="badge {badge_class}">{badge_text}</span></h2>
    <section class="bars">{bars}
    </section>
    <section>
        <h3>Detection Explanation</h3>
        <p>{explanation}</p>
        <div class="details">{details}
        </div>
    </section>
</body>
</html>
"#,
            heading = result.heading(),
            filename = escape_html(&item.filename),
            short_name = escape_html(&truncate_middle(&item.filename, 48)),
            date = format_date(&item.date),
            image_url = escape_html(&item.image_url),
            badge_class = badge_class,
            badge_text = badge_text,
            bars = bars,
            explanation = result.explanation(),
            details = details,
        )
    }
}

/// `<base>.html`, keeping any extension already on the base name
fn html_path(output_base: &Path) -> PathBuf {
    let mut name = output_base.as_os_str().to_owned();
    name.push(".html");
    PathBuf::from(name)
}

/// Date as shown next to history entries, e.g. "Mar 4, 2025 at 3:07 PM"
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%b %-d, %Y at %-I:%M %p").to_string()
}

fn truncate_middle(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    let half = max_len / 2;
    let start: String = s.chars().take(half).collect();
    let end: String = s.chars().skip(len - half).collect();
    format!("{}…{}", start, end)
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
