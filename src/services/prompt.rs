use crate::models::settings::GenerationSettings;

/// Spread below the requested keyword count that the model may still return.
const KEYWORD_SLACK: u32 = 5;

/// Build the instruction text sent alongside every payload.
pub fn build_prompt(settings: &GenerationSettings) -> String {
    let min_keywords = settings.keyword_count.saturating_sub(KEYWORD_SLACK);
    format!(
        "Generate metadata for the provided {content}. Rules:\n\
         1. Title: Create a concise, relevant title around {title} characters long.\n\
         2. Keywords: Generate between {min} and {max} keywords, ordered by relevance.\n\
         3. Category: Assign ONE category from this list: {categories}.\n\
         4. Respond ONLY with a single JSON object. Do not add explanations or markdown.",
        content = settings.content_type,
        title = settings.title_length,
        min = min_keywords,
        max = settings.keyword_count,
        categories = settings.categories.join(", "),
    )
}
