use serde::{Deserialize, Serialize};

/// One row of the live price list. Fetched fresh per resolution attempt;
/// prices may change between messages, so nothing here is cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCardEntry {
    pub alias: String,
    pub name: String,
    pub points: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredEntry {
    pub entry: RateCardEntry,
    pub score: i64,
}

/// Outcome of fuzzy-matching a free-text reason against the rate card.
/// Advisory only: `Confident` still requires the caller to ask the admin
/// to confirm before any points move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateInference {
    Confident(ScoredEntry),
    Ambiguous(Vec<ScoredEntry>),
    NoMatch,
}

const INCLUDE_THRESHOLD: i64 = 40;
const CONFIDENT_THRESHOLD: i64 = 80;
const SIMILARITY_FLOOR: i64 = 60;
const NAME_SUBSTRING_BONUS: i64 = 50;
const DESCRIPTION_SUBSTRING_BONUS: i64 = 30;
const AMBIGUOUS_LIMIT: usize = 3;

/// Score a reason against every entry and decide. First match policy does
/// not apply here: all entries are scored, ranked descending, and the
/// shape of the top of the ranking picks the outcome.
pub fn infer_points(reason: &str, entries: &[RateCardEntry]) -> RateInference {
    let reason = reason.trim().to_ascii_lowercase();
    if reason.is_empty() || entries.is_empty() {
        return RateInference::NoMatch;
    }

    let mut candidates: Vec<ScoredEntry> = entries
        .iter()
        .map(|entry| ScoredEntry { entry: entry.clone(), score: score_entry(&reason, entry) })
        .filter(|scored| scored.score > INCLUDE_THRESHOLD)
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    match candidates.len() {
        0 => RateInference::NoMatch,
        1 => RateInference::Confident(candidates.remove(0)),
        _ if candidates[0].score > CONFIDENT_THRESHOLD => {
            RateInference::Confident(candidates.remove(0))
        }
        _ => {
            candidates.truncate(AMBIGUOUS_LIMIT);
            RateInference::Ambiguous(candidates)
        }
    }
}

fn score_entry(reason: &str, entry: &RateCardEntry) -> i64 {
    let name = entry.name.to_ascii_lowercase();
    let description = entry.description.to_ascii_lowercase();
    let alias = entry.alias.to_ascii_lowercase();

    let mut score = 0;
    if name.contains(reason) || alias.contains(reason) {
        score += NAME_SUBSTRING_BONUS;
    }
    if !description.is_empty() && description.contains(reason) {
        score += DESCRIPTION_SUBSTRING_BONUS;
    }

    let similarity = similarity(reason, &name).max(similarity(reason, &alias));
    if similarity > SIMILARITY_FLOOR {
        score += similarity;
    }

    score
}

/// Normalized string similarity on a 0..=100 scale, from edit distance.
pub fn similarity(a: &str, b: &str) -> i64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100;
    }
    let distance = levenshtein(a, b);
    (100 * (longest - distance.min(longest)) / longest) as i64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
