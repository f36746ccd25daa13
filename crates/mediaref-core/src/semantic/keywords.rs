//! Keyword extraction
//!
//! The same tokenizer feeds both caption indexing and query parsing; if the two
//! ever diverge, exact lookups in the inverted index silently stop matching.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Function words and generic request words (English and Russian) that never
/// discriminate between media items
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English function words
        "the", "and", "for", "with", "without", "this", "that", "these", "those", "from",
        "into", "onto", "over", "under", "about", "above", "below", "its", "his", "her",
        "hers", "their", "them", "they", "our", "ours", "your", "yours", "you", "she",
        "him", "was", "were", "are", "is", "have", "has", "had", "been", "being", "can",
        "could", "would", "should", "will", "shall", "may", "might", "must", "not", "but",
        "out", "off", "all", "any", "some", "one", "ones", "just", "also", "very", "more",
        "less", "much", "then", "than", "there", "here", "what", "which", "who", "whom",
        "how", "why", "when", "where", "like", "please", "thanks", "now", "again", "same",
        "other", "another", "such", "only", "own", "too", "most", "did", "does", "doing",
        "let", "lets", "get", "got", "give", "show", "want", "need", "use", "using", "make",
        "via", "per", "each", "both", "few", "until", "while", "after", "before", "upon",
        // Generic media nouns
        "image", "images", "picture", "pictures", "photo", "photos", "pic", "pics", "img",
        "video", "videos", "clip", "clips", "audio", "file", "files", "document", "media",
        // Russian function words
        "это", "этот", "эта", "эти", "этой", "этом", "этого", "этому", "эту", "тот", "той",
        "тем", "том", "того", "тех", "как", "так", "что", "чтобы", "для", "над", "под",
        "при", "про", "без", "или", "если", "его", "ее", "их", "мне", "меня", "мой", "моя",
        "мое", "мои", "моей", "моего", "твой", "твоя", "ваш", "наш", "она", "они", "оно",
        "был", "была", "было", "были", "будет", "есть", "тут", "там", "где", "когда",
        "уже", "еще", "все", "весь", "вся", "всех", "только", "очень", "пожалуйста",
        "можно", "нужно", "надо", "давай", "который", "которая", "которое", "которые",
        "чем", "через", "после", "перед", "свой", "свое", "свою", "себя", "тоже", "также",
        "вот", "даже", "нет", "да", "ну", "же", "бы", "ли",
        // Generic media nouns (Russian)
        "фото", "фотка", "фотку", "фотки", "фотография", "фотографию", "фотографии",
        "картинка", "картинку", "картинки", "картинке", "изображение", "изображения",
        "изображении", "снимок", "снимка", "снимке", "видео", "ролик", "ролика", "аудио",
        "файл", "файла", "документ", "документа",
    ]
    .into_iter()
    .collect()
});

/// Whether `word` (already lowercased) is a stop word
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Extract ordered, deduplicated keywords from free text.
///
/// Lowercases, folds `ё` to `е`, replaces every non-alphabetic character with
/// a space, drops tokens of two characters or fewer and stop words.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'ё' => 'е',
            c if c.is_alphabetic() => c,
            _ => ' ',
        })
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut keywords = Vec::new();
    for token in normalized.split_whitespace() {
        if token.chars().count() <= 2 || is_stop_word(token) {
            continue;
        }
        if seen.insert(token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Normalize a whole message for signature and cache-key purposes:
/// lowercase, fold `ё`, collapse whitespace
pub fn normalize_message(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
