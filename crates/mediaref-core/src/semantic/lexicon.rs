//! Curated root and synonym tables
//!
//! Entries ending in `*` are stems: any keyword starting with the stem belongs
//! to the group. Everything else must match a keyword exactly. Tables are
//! static; nothing here is learned.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Root families: `(stem, irregular forms)`.
///
/// A keyword belongs to a family when it starts with the stem or is one of the
/// listed irregular forms.
pub static ROOT_FAMILIES: &[(&str, &[&str])] = &[
    // English
    ("portrait", &[]),
    ("beach", &[]),
    ("mountain", &[]),
    ("forest", &[]),
    ("flower", &[]),
    ("garden", &[]),
    ("ocean", &[]),
    ("river", &[]),
    ("city", &["cities"]),
    ("build", &["built"]),
    ("paint", &[]),
    ("draw", &["drew", "drawn"]),
    ("light", &["lit"]),
    ("dark", &[]),
    ("bright", &[]),
    ("color", &["colour", "colours"]),
    ("child", &["children"]),
    ("person", &["people"]),
    ("woman", &["women"]),
    ("mouse", &["mice"]),
    ("leaf", &["leaves"]),
    ("wolf", &["wolves"]),
    ("knife", &["knives"]),
    ("tree", &[]),
    ("cloud", &[]),
    ("snow", &[]),
    ("rain", &[]),
    ("star", &[]),
    ("sing", &["sang", "sung", "song", "songs"]),
    ("danc", &[]),
    ("smil", &[]),
    // Russian
    ("солнц", &["солнышко"]),
    ("солнеч", &[]),
    ("портрет", &[]),
    ("пляж", &[]),
    ("гор", &[]),
    ("лес", &["лесной", "лесная"]),
    ("сад", &[]),
    ("мор", &["морской", "морская"]),
    ("океан", &[]),
    ("рек", &["речной", "речная"]),
    ("город", &["городской"]),
    ("дом", &[]),
    ("дерев", &["деревья"]),
    ("облак", &["облако"]),
    ("снег", &["снежный", "снежная"]),
    ("дожд", &["дождь"]),
    ("звезд", &[]),
    ("кошк", &["кошка", "кошек"]),
    ("собак", &[]),
    ("машин", &[]),
    ("человек", &["люди", "людей"]),
    ("женщин", &[]),
    ("мужчин", &[]),
    ("ребен", &["дети", "детей"]),
    ("девушк", &["девушка"]),
    ("пейзаж", &[]),
    ("закат", &[]),
    ("рассвет", &[]),
    ("песн", &["песня", "песню"]),
    ("музык", &[]),
];

/// Synonym groups, English and Russian side by side
pub static SYNONYM_GROUPS: &[&[&str]] = &[
    // Sky and weather
    &["sun", "sunny", "sunshine", "sunlight", "солнц*", "солнеч*", "солнышк*"],
    &["sunset", "sundown", "dusk", "закат*", "сумерк*"],
    &["sunrise", "dawn", "рассвет*", "утренн*"],
    &["moon", "moonlight", "лун*"],
    &["sky", "skies", "неб*"],
    &["cloud", "clouds", "cloudy", "облак*", "туч*"],
    &["rain", "rainy", "дожд*", "ливен*"],
    &["snow", "snowy", "снег*", "снеж*"],
    &["star", "stars", "starry", "звезд*"],
    &["night", "ноч*"],
    // Landscape
    &["beach", "shore", "coast", "seaside", "пляж*", "берег*", "побереж*"],
    &["sea", "ocean", "море", "моря", "морем", "морск*", "океан*"],
    &[
        "mountain",
        "mountains",
        "hill",
        "hills",
        "peak",
        "гора",
        "горы",
        "гору",
        "горах",
        "горн*",
        "холм*",
        "вершин*",
    ],
    &["forest", "woods", "jungle", "лес", "леса", "лесу", "лесн*", "джунгл*"],
    &["river", "stream", "рек*", "речн*", "ручей"],
    &["lake", "pond", "озер*", "пруд*"],
    &["field", "meadow", "поле", "поля", "полем", "луг*"],
    &["landscape", "scenery", "view", "пейзаж*", "вид"],
    &["city", "town", "urban", "street", "город*", "улиц*"],
    &["house", "home", "building", "дом*", "здани*"],
    &["garden", "park", "сад*", "парк*"],
    &["tree", "trees", "дерев*"],
    &["flower", "flowers", "blossom", "bloom", "цветок", "цветы", "цветк*", "цветоч*", "роз*"],
    // Animals
    &[
        "cat",
        "cats",
        "kitten",
        "kitty",
        "kittens",
        "кот",
        "кота",
        "коту",
        "котом",
        "коты",
        "котик*",
        "котен*",
        "кошк*",
    ],
    &["dog", "dogs", "puppy", "pup", "hound", "собак*", "пес", "пса", "щен*"],
    &["bird", "birds", "птиц*"],
    &["horse", "horses", "pony", "лошад*", "конь", "коня", "кони"],
    &["fish", "рыб*"],
    // People
    &["person", "people", "human", "человек*", "люд*"],
    &["woman", "women", "lady", "girl", "женщин*", "девушк*", "девочк*"],
    &["man", "men", "guy", "boy", "мужчин*", "парен*", "мальчик*"],
    &["child", "children", "kid", "kids", "baby", "ребен*", "дети", "детей", "детск*", "малыш*"],
    &["portrait", "face", "headshot", "closeup", "портрет*", "лицо", "лица"],
    &["smile", "smiling", "happy", "улыб*", "счастлив*"],
    // Objects
    &["car", "cars", "auto", "vehicle", "машин*", "автомобил*"],
    &["food", "meal", "dish", "еда", "еду", "блюд*"],
    &["cake", "dessert", "торт*", "десерт*"],
    &["coffee", "кофе"],
    &["book", "books", "книг*"],
    &["robot", "robots", "робот*"],
    &["dragon", "dragons", "дракон*"],
    &["castle", "palace", "замок", "замк*", "дворц*", "дворец"],
    // Colours
    &["red", "crimson", "scarlet", "красн*", "алый", "алая"],
    &["blue", "azure", "синий", "синяя", "синее", "синего", "голуб*"],
    &["green", "зелен*"],
    &["yellow", "golden", "gold", "желт*", "золот*"],
    &["black", "dark", "черн*", "темн*"],
    &["white", "белый", "белая", "белое", "белого", "белоснеж*"],
    // Styles
    &["bright", "vivid", "brighter", "ярк*", "ярче"],
    &["cartoon", "animated", "anime", "мульт*", "аниме"],
    &["realistic", "photorealistic", "realism", "реалист*"],
    &["painting", "painted", "watercolor", "oil", "картин*", "живопис*", "акварел*"],
    &["sketch", "drawing", "pencil", "эскиз*", "набросок", "рисун*", "карандаш*"],
    &["vintage", "retro", "old", "винтаж*", "ретро", "стар*"],
    // Audio
    &["music", "melody", "tune", "музык*", "мелоди*"],
    &["song", "songs", "track", "песн*", "трек*"],
    &["voice", "speech", "голос*", "речь"],
    &["guitar", "гитар*"],
    &["piano", "пианино", "рояль"],
];

/// Irregular form -> stem
static IRREGULAR_FORMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (stem, forms) in ROOT_FAMILIES {
        for form in *forms {
            map.insert(*form, *stem);
        }
    }
    map
});

/// Exact synonym entry -> group indices
static SYNONYM_EXACT: Lazy<HashMap<&'static str, Vec<usize>>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Vec<usize>> = HashMap::new();
    for (idx, group) in SYNONYM_GROUPS.iter().enumerate() {
        for entry in group.iter().filter(|e| !e.ends_with('*')) {
            map.entry(*entry).or_default().push(idx);
        }
    }
    map
});

/// Stem synonym entries as `(stem, group index)`
static SYNONYM_STEMS: Lazy<Vec<(&'static str, usize)>> = Lazy::new(|| {
    SYNONYM_GROUPS
        .iter()
        .enumerate()
        .flat_map(|(idx, group)| {
            group
                .iter()
                .filter_map(move |entry| entry.strip_suffix('*').map(|stem| (stem, idx)))
        })
        .collect()
});

/// Root stem of a keyword, if it belongs to a curated family.
///
/// The longest matching stem wins so that `солнеч` is not swallowed by a
/// shorter stem.
pub fn root_of(word: &str) -> Option<&'static str> {
    if let Some(stem) = IRREGULAR_FORMS.get(word) {
        return Some(*stem);
    }
    ROOT_FAMILIES
        .iter()
        .map(|(stem, _)| *stem)
        .filter(|stem| word.starts_with(stem))
        .max_by_key(|stem| stem.chars().count())
}

/// Synonym groups a keyword belongs to
pub fn synonym_groups(word: &str) -> Vec<usize> {
    let mut groups: Vec<usize> = SYNONYM_EXACT.get(word).cloned().unwrap_or_default();
    for (stem, idx) in SYNONYM_STEMS.iter() {
        if word.starts_with(stem) && !groups.contains(idx) {
            groups.push(*idx);
        }
    }
    groups
}

/// Whether two keywords share a curated root
pub fn share_root(a: &str, b: &str) -> bool {
    match (root_of(a), root_of(b)) {
        (Some(ra), Some(rb)) => ra == rb,
        _ => false,
    }
}

/// Whether two keywords belong to a common synonym group
pub fn are_synonyms(a: &str, b: &str) -> bool {
    let groups_a = synonym_groups(a);
    if groups_a.is_empty() {
        return false;
    }
    synonym_groups(b).iter().any(|g| groups_a.contains(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_of_prefers_longest_stem() {
        assert_eq!(root_of("солнцем"), Some("солнц"));
        assert_eq!(root_of("солнечный"), Some("солнеч"));
        assert_eq!(root_of("children"), Some("child"));
        assert_eq!(root_of("qwerty"), None);
    }

    #[test]
    fn test_share_root() {
        assert!(share_root("portraits", "portrait"));
        assert!(share_root("пляже", "пляжный"));
        assert!(!share_root("beach", "forest"));
    }

    #[test]
    fn test_cross_language_synonyms() {
        assert!(are_synonyms("солнцем", "sun"));
        assert!(are_synonyms("sun", "солнечный"));
        assert!(are_synonyms("котика", "kitten"));
        assert!(are_synonyms("closeup", "портрет"));
        assert!(!are_synonyms("sun", "dog"));
        assert!(!are_synonyms("asdf", "asdf"));
    }
}
