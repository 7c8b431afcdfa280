use crate::check::findings::Finding;
use scraper::{Html, Selector};

const ELLIPSES: [&str; 2] = ["...", "\u{2026}"];

/// The checker reported a `<title>` that disagrees with the fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMismatch {
    /// Title the crawler parsed from the fetched document
    pub crawler_title: String,
    /// Title text as the checker reported it (possibly elided)
    pub checker_title: String,
}

/// Compares `<title>` findings against the title the crawler observed
///
/// An elided checker title (ending in an ellipsis) must be a prefix of the
/// observed title once the ellipsis is removed. A full checker title only
/// has to occur somewhere in the observed title, since the checker may
/// report a trimmed or partial `<title>`. Each disagreement is logged as a
/// warning and returned.
pub fn check_title_consistency(
    expected_title: Option<&str>,
    findings: &[Finding],
) -> Vec<TitleMismatch> {
    let expected = expected_title.map(str::trim).unwrap_or("");

    findings
        .iter()
        .filter(|finding| finding.context.trim_start().starts_with("<title"))
        .filter_map(|finding| {
            let reported = title_text(&finding.context);
            if titles_agree(expected, &reported) {
                return None;
            }

            tracing::warn!(
                "Parser mismatch! Crawler saw full title \"{}\", checker saw elided title \"{}\".",
                expected,
                reported
            );
            Some(TitleMismatch {
                crawler_title: expected.to_string(),
                checker_title: reported,
            })
        })
        .collect()
}

fn titles_agree(expected: &str, reported: &str) -> bool {
    match ELLIPSES
        .iter()
        .find_map(|marker| reported.strip_suffix(marker))
    {
        Some(elided) => expected.starts_with(elided.trim_end()),
        None => expected.contains(reported),
    }
}

/// Text content of a `<title>` snippet
fn title_text(context: &str) -> String {
    let fragment = Html::parse_fragment(context);
    let from_dom = Selector::parse("title").ok().and_then(|selector| {
        fragment
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>())
    });

    let text = match from_dom {
        Some(text) => text,
        None => context
            .split_once('>')
            .map(|(_, rest)| rest.split("</").next().unwrap_or(rest).to_string())
            .unwrap_or_default(),
    };
    text.trim().to_string()
}
