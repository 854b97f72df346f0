use serde_json::Value;

use crate::config::RetrievalConfig;
use crate::event_bus::Citation;
use crate::vector::ScoredHit;

/// Result of relevance filtering for one run.
#[derive(Clone, Debug)]
pub struct CitationOutcome {
    /// Selected citations, descending score, markers assigned 1-based.
    pub citations: Vec<Citation>,
    /// True when the score floor discarded every candidate and the selection
    /// fell back to the best-scoring hits anyway.
    pub low_confidence: bool,
}

/// Select citations from raw retrieval hits.
///
/// Hits at or above the score floor win outright; when the floor discards
/// every candidate but candidates existed, the top `max_citations` by score
/// are kept instead and the outcome is flagged low-confidence. The user never
/// sees zero results purely because of the threshold. Hits whose payload
/// lacks text are dropped as malformed.
pub fn select_citations(hits: &[ScoredHit], config: &RetrievalConfig) -> CitationOutcome {
    let mut ranked: Vec<&ScoredHit> = hits
        .iter()
        .filter(|hit| {
            hit.payload
                .get("text")
                .and_then(Value::as_str)
                .is_some_and(|text| !text.is_empty())
        })
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let above_floor: Vec<&ScoredHit> = ranked
        .iter()
        .copied()
        .filter(|hit| hit.score >= config.score_floor)
        .collect();

    let (selected, low_confidence) = if above_floor.is_empty() && !ranked.is_empty() {
        (ranked, true)
    } else {
        (above_floor, false)
    };

    let citations = selected
        .into_iter()
        .take(config.max_citations)
        .enumerate()
        .map(|(index, hit)| citation_from_hit(index + 1, hit, config.excerpt_max_chars))
        .collect();

    CitationOutcome {
        citations,
        low_confidence,
    }
}

fn citation_from_hit(marker: usize, hit: &ScoredHit, excerpt_max_chars: usize) -> Citation {
    let payload = &hit.payload;
    Citation {
        marker,
        doc_id: payload
            .get("doc_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        page_number: payload.get("page_number").and_then(Value::as_u64),
        start_offset: payload.get("start_offset").and_then(Value::as_u64),
        end_offset: payload.get("end_offset").and_then(Value::as_u64),
        text: truncate_chars(
            payload.get("text").and_then(Value::as_str).unwrap_or(""),
            excerpt_max_chars,
        ),
        score: hit.score,
    }
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
