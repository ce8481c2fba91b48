//! Transaction description classification.
//!
//! Keyword matching first (zero tokens spent on the obvious cases), then
//! one LLM completion constrained to the known category names. Any
//! failure falls back to "Other" so the primary write always succeeds.

use crate::AppState;
use crate::constants::{CHAT_MODEL, CLASSIFY_MAX_TOKENS, FALLBACK_CATEGORY};
use crate::llm::CompletionMessage;

const KEYWORD_MAP: [(&str, &[&str]); 9] = [
    (
        "Food",
        &[
            "zomato", "swiggy", "mcdonald", "domino", "pizza", "burger", "restaurant", "cafe",
            "starbucks", "kfc", "subway", "food", "biryani", "dunkin", "bakery", "grocery",
            "grofers", "blinkit", "bigbasket", "zepto", "instamart", "mess", "canteen", "dhaba",
        ],
    ),
    (
        "Transport",
        &[
            "uber", "ola", "rapido", "auto", "taxi", "metro", "bus", "petrol", "diesel", "fuel",
            "parking", "toll", "irctc", "train", "flight", "indigo", "spicejet", "redbus",
        ],
    ),
    (
        "Shopping",
        &[
            "amazon", "flipkart", "myntra", "ajio", "meesho", "nykaa", "mall", "shopping",
            "store", "market", "reliance",
        ],
    ),
    (
        "Entertainment",
        &[
            "netflix", "spotify", "hotstar", "prime video", "youtube", "movie", "cinema", "pvr",
            "inox", "game", "steam", "playstation",
        ],
    ),
    (
        "Utilities",
        &[
            "electricity", "water bill", "gas bill", "internet", "wifi", "broadband", "airtel",
            "jio", "postpaid", "prepaid", "dth", "recharge", "emi", "loan",
        ],
    ),
    (
        "Health",
        &[
            "pharmacy", "hospital", "doctor", "medical", "medicine", "apollo", "1mg",
            "pharmeasy", "netmeds", "gym", "fitness",
        ],
    ),
    (
        "Education",
        &[
            "udemy", "coursera", "book", "stationery", "tuition", "college", "school", "exam",
            "coaching",
        ],
    ),
    ("Rent", &["rent", "landlord", "housing", "pg ", "hostel"]),
    (
        "Subscriptions",
        &["subscription", "membership", "renewal", "annual plan"],
    ),
];

/// Match a description against the local keyword table.
pub fn local_match(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    for (category, keywords) in KEYWORD_MAP {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return Some(category);
        }
    }
    None
}

/// Classify a description into one of the known category names.
///
/// Never fails: an unreachable LLM, an unrecognized reply, or a missing
/// API key all resolve to the fallback category.
pub async fn classify(state: &AppState, description: &str) -> String {
    let categories = match state.category_cache.get(&state.main_db).await {
        Ok(categories) => categories,
        Err((_, message)) => {
            tracing::warn!("category lookup failed during classification: {}", message);
            return FALLBACK_CATEGORY.to_string();
        }
    };

    if let Some(local) = local_match(description) {
        if categories.iter().any(|c| c == local) {
            return local.to_string();
        }
    }

    let Some(llm) = &state.llm else {
        return FALLBACK_CATEGORY.to_string();
    };

    let messages = vec![
        CompletionMessage::system(format!(
            "Classify transactions into one of: {}. Reply with ONLY the category name.",
            categories.join(",")
        )),
        CompletionMessage::user(description.to_string()),
    ];

    match llm.chat(CHAT_MODEL, messages, CLASSIFY_MAX_TOKENS, 0.0).await {
        Ok(reply) => {
            let reply = reply.trim();
            match categories
                .iter()
                .find(|c| c.eq_ignore_ascii_case(reply))
            {
                Some(matched) => matched.clone(),
                None => {
                    tracing::warn!(
                        "classifier returned \"{}\" for \"{}\", falling back to {}",
                        reply,
                        description,
                        FALLBACK_CATEGORY
                    );
                    FALLBACK_CATEGORY.to_string()
                }
            }
        }
        Err(err) => {
            tracing::warn!("classification failed: {}", err);
            FALLBACK_CATEGORY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match_hits_obvious_descriptions() {
        assert_eq!(local_match("Zomato order"), Some("Food"));
        assert_eq!(local_match("UBER ride to airport"), Some("Transport"));
        assert_eq!(local_match("Netflix monthly"), Some("Entertainment"));
        assert_eq!(local_match("paid rent for June"), Some("Rent"));
    }

    #[test]
    fn keyword_match_misses_vague_descriptions() {
        assert_eq!(local_match("misc purchase"), None);
        assert_eq!(local_match(""), None);
    }
}
