//! Round scoring.
//!
//! Pure functions over one round's frozen answer sheets: no room state is
//! touched here, so running them twice on the same input yields the same
//! result.

use crate::types::*;
use std::collections::HashMap;

/// Trim and case-fold a submission for comparison
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A normalized answer counts if it has at least two characters and starts
/// with the round's letter (compared case-insensitively, digraphs included)
pub fn is_valid_answer(normalized: &str, letter: &str) -> bool {
    normalized.chars().count() >= 2 && normalized.starts_with(&letter.to_lowercase())
}

/// Score every player's sheet for one round.
///
/// Per category, each valid normalized value is counted across players: a
/// value given by one player is worth `UNIQUE_POINTS`, a value given by
/// several is worth `SHARED_POINTS` to each of them, anything else is worth
/// nothing and is displayed as `INVALID_ANSWER`. Players without a sheet are
/// scored as if they submitted nothing.
pub fn score_round(
    categories: &[Category],
    letter: &str,
    players: &[PlayerId],
    answers: &HashMap<PlayerId, AnswerSheet>,
) -> HashMap<PlayerId, ScoredSheet> {
    let mut scored: HashMap<PlayerId, ScoredSheet> = players
        .iter()
        .map(|id| (id.clone(), ScoredSheet::new()))
        .collect();

    for category in categories {
        let normalized: Vec<(&PlayerId, Option<String>, String)> = players
            .iter()
            .map(|id| {
                let raw = answers
                    .get(id)
                    .and_then(|sheet| sheet.get(category))
                    .map(String::as_str)
                    .unwrap_or("");
                let value = normalize_answer(raw);
                let valid = is_valid_answer(&value, letter).then_some(value);
                (id, valid, raw.trim().to_string())
            })
            .collect();

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for (_, valid, _) in &normalized {
            if let Some(value) = valid {
                *counts.entry(value.as_str()).or_insert(0) += 1;
            }
        }

        for (id, valid, display) in &normalized {
            let answer = match valid {
                Some(value) => ScoredAnswer {
                    value: display.clone(),
                    points: if counts.get(value.as_str()).copied().unwrap_or(0) == 1 {
                        UNIQUE_POINTS
                    } else {
                        SHARED_POINTS
                    },
                    disputed: false,
                },
                None => ScoredAnswer {
                    value: INVALID_ANSWER.to_string(),
                    points: 0,
                    disputed: false,
                },
            };
            if let Some(sheet) = scored.get_mut(*id) {
                sheet.insert(category.clone(), answer);
            }
        }
    }

    scored
}

/// Total points of one scored sheet
pub fn sheet_total(sheet: &ScoredSheet) -> u32 {
    sheet.values().map(|answer| answer.points).sum()
}

/// Players who placed at game end.
///
/// The three highest distinct scores are podium values; every player holding
/// one of them wins, except players who scored nothing.
pub fn winners(players: &[Player]) -> Vec<PlayerId> {
    let mut distinct: Vec<i64> = players.iter().map(|p| p.score).collect();
    distinct.sort_unstable_by(|a, b| b.cmp(a));
    distinct.dedup();
    distinct.truncate(3);

    players
        .iter()
        .filter(|p| p.score > 0 && distinct.contains(&p.score))
        .map(|p| p.id.clone())
        .collect()
}
